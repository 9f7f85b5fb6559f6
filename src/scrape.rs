use std::{collections::BTreeSet, sync::LazyLock};

use regex::Regex;
use reqwest::Url;
use tracing::{instrument, warn};

use crate::{
    config::ProbeConfig,
    http::Transport,
    probe::{fetch_body, with_retries},
};

/// `/hls/<dir>/<file>.m3u8`. `regex` has no backreferences, so equality of the
/// two segments is checked after matching.
static HLS_PATH_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/hls/([A-Za-z0-9_-]+)/([A-Za-z0-9_-]+)\.m3u8").unwrap()
});

/// Extracts every channel id linked as `/hls/<id>/<id>.m3u8` in `page`
#[must_use]
pub fn extract_channel_ids(page: &str) -> BTreeSet<String> {
    HLS_PATH_REGEX
        .captures_iter(page)
        .filter(|c| c[1] == c[2])
        .map(|c| c[1].to_string())
        .collect()
}

/// Fetches `page_url` and extracts the channel ids it links to.
///
/// A page that cannot be fetched yields no ids.
#[instrument(skip(transport, config))]
pub async fn scrape_channel_ids(
    transport: &dyn Transport,
    config: &ProbeConfig,
    page_url: &str,
) -> BTreeSet<String> {
    let url = match Url::parse(page_url) {
        Ok(u) => u,
        Err(e) => {
            warn!("Invalid scrape url {page_url}: {e}");
            return BTreeSet::new();
        }
    };

    match with_retries(config, page_url, || fetch_body(transport, &url)).await {
        Ok(page) => extract_channel_ids(&page),
        Err(e) => {
            warn!("Unable to fetch {page_url}: {e}");
            BTreeSet::new()
        }
    }
}
