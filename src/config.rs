use std::{path::PathBuf, time::Duration};

use crate::{candidates::CandidateConfig, discovery::Mode, store::NewLogMode};

pub const DEFAULT_HOST: &str = "cvtv.cvalley.net";

/// Env var holding a `Cookie` header value sent with every request
pub const COOKIE_ENV: &str = "CVTV_COOKIE";
/// Env var overriding the `User-Agent` header
pub const USER_AGENT_ENV: &str = "CVTV_UA";

/// Everything a single run needs, built once in `main` and handed down
#[derive(Debug, Clone)]
pub struct Config {
    pub mode: Mode,
    pub host: String,
    /// Page scraped for `/hls/<id>/<id>.m3u8` links in [`Mode::Scrape`]
    pub scrape_url: String,
    pub candidates: CandidateConfig,
    pub http: HttpConfig,
    pub probe: ProbeConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Default)]
pub struct HttpConfig {
    pub cookie: Option<String>,
    pub user_agent: Option<String>,
    pub timeout: Duration,
}

impl HttpConfig {
    /// Picks up the optional `Cookie` / `User-Agent` overrides from the environment
    #[must_use]
    pub fn from_env(timeout: Duration) -> Self {
        Self {
            cookie: non_empty_env(COOKIE_ENV),
            user_agent: non_empty_env(USER_AGENT_ENV),
            timeout,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Retries after the first attempt; `2` means up to three requests per channel
    pub retries: u32,
    pub backoff_base: Duration,
    pub backoff_step: Duration,
    /// Slept after every probe, whatever its outcome
    pub polite_delay: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            retries: 2,
            backoff_base: Duration::from_millis(500),
            backoff_step: Duration::from_millis(500),
            polite_delay: Duration::from_millis(300),
        }
    }
}

impl ProbeConfig {
    /// Linear backoff slept after failed attempt number `attempt` (zero based)
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_base + self.backoff_step * attempt
    }
}

#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub playlist_path: PathBuf,
    pub known_path: PathBuf,
    pub new_log_path: PathBuf,
    pub new_log_mode: NewLogMode,
    pub group_title: String,
    /// Save the known set after every new discovery instead of once at the end
    pub persist_each: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            playlist_path: PathBuf::from("playlist.m3u8"),
            known_path: PathBuf::from("known_channels.json"),
            new_log_path: PathBuf::from("new_channels.txt"),
            new_log_mode: NewLogMode::Overwrite,
            group_title: "CVTV".to_string(),
            persist_each: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: Mode::Probe,
            host: DEFAULT_HOST.to_string(),
            scrape_url: format!("https://{DEFAULT_HOST}/"),
            candidates: CandidateConfig::default(),
            http: HttpConfig {
                timeout: Duration::from_secs(10),
                ..HttpConfig::default()
            },
            probe: ProbeConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
