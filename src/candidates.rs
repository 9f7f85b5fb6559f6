use std::collections::HashSet;

/// Channels worth probing on every run
pub const SEED_CHANNELS: [&str; 24] = [
    "KMBCABC",
    "KCTV5",
    "KSHBD",
    "KSHB41",
    "WDAF",
    "KCPT",
    "ESPN",
    "ESPN2",
    "ESPNU",
    "ESPNEWS",
    "ESPNDEPORTES",
    "FOXSPORTS1",
    "FOXSPORTS2",
    "NFLNETWORK",
    "NBATV",
    "MLBNETWORK",
    "NHLNETWORK",
    "TNT",
    "TBS",
    "USA",
    "CNN",
    "MSNBC",
    "CNBC",
    "FOXNEWS",
];

/// `prefix` followed by every integer in `start..end`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuffixRange {
    pub prefix: String,
    pub start: u32,
    pub end: u32,
}

impl SuffixRange {
    #[must_use]
    pub fn new(prefix: &str, start: u32, end: u32) -> Self {
        Self {
            prefix: prefix.to_string(),
            start,
            end,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CandidateConfig {
    pub seeds: Vec<String>,
    pub suffix_ranges: Vec<SuffixRange>,
    /// Every character is tried as a single-letter channel
    pub alphabet: String,
}

impl Default for CandidateConfig {
    fn default() -> Self {
        Self {
            seeds: SEED_CHANNELS.iter().map(ToString::to_string).collect(),
            suffix_ranges: vec![
                SuffixRange::new("ESPN", 3, 6),
                SuffixRange::new("FOX", 1, 5),
                SuffixRange::new("CBS", 1, 5),
                SuffixRange::new("ABC", 1, 5),
            ],
            alphabet: ('A'..='Z').collect(),
        }
    }
}

/// Builds the ordered candidate list: seeds, then suffix ranges, then the alphabet.
///
/// Later duplicates are dropped so a channel is never probed twice in one pass.
#[must_use]
pub fn generate(config: &CandidateConfig) -> Vec<String> {
    let ranged = config
        .suffix_ranges
        .iter()
        .flat_map(|r| (r.start..r.end).map(move |i| format!("{}{i}", r.prefix)));
    let letters = config.alphabet.chars().map(String::from);

    let mut seen = HashSet::new();
    config
        .seeds
        .iter()
        .cloned()
        .chain(ranged)
        .chain(letters)
        .filter(|c| !c.is_empty() && seen.insert(c.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_scan_order() {
        let candidates = generate(&CandidateConfig::default());

        assert_eq!(candidates.first().map(String::as_str), Some("KMBCABC"));
        assert_eq!(&candidates[24..27], ["ESPN3", "ESPN4", "ESPN5"]);
        assert_eq!(&candidates[27..31], ["FOX1", "FOX2", "FOX3", "FOX4"]);
        assert_eq!(candidates.last().map(String::as_str), Some("Z"));
        // 24 seeds + 3 + 4 * 3 ranged + 26 letters
        assert_eq!(candidates.len(), 24 + 15 + 26);
    }

    #[test]
    fn is_deterministic() {
        let config = CandidateConfig::default();
        assert_eq!(generate(&config), generate(&config));
    }

    #[test]
    fn drops_duplicates_keeping_first() {
        let config = CandidateConfig {
            seeds: vec!["B".into(), "FOX1".into()],
            suffix_ranges: vec![SuffixRange::new("FOX", 1, 3)],
            alphabet: "AB".into(),
        };
        assert_eq!(generate(&config), ["B", "FOX1", "FOX2", "A"]);
    }

    #[test]
    fn empty_range_yields_nothing() {
        let config = CandidateConfig {
            seeds: vec![],
            suffix_ranges: vec![SuffixRange::new("CBS", 5, 5)],
            alphabet: String::new(),
        };
        assert!(generate(&config).is_empty());
    }
}
