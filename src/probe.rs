use std::fmt;

use m3u8_rs::Playlist;
use reqwest::{StatusCode, Url};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::{
    config::ProbeConfig,
    http::{HttpResponse, Transport},
};

/// `https://<host>/hls/<id>/<id>.m3u8`
#[must_use]
pub fn channel_url(host: &str, id: &str) -> String {
    format!("https://{host}/hls/{id}/{id}.m3u8")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The playlist (or its first variant) answered. `url` is what was confirmed.
    Live { url: Url },
    /// 403 / 404, not a channel
    Absent,
    /// Retries exhausted on transient failures
    Unreachable,
}

impl ProbeOutcome {
    #[must_use]
    pub const fn is_live(&self) -> bool {
        matches!(self, Self::Live { .. })
    }
}

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("not found (HTTP {0})")]
    NotFound(StatusCode),
    #[error("request failed: {0:#}")]
    Request(anyhow::Error),
    #[error("unexpected HTTP {0}")]
    Status(StatusCode),
    #[error("unparseable playlist from {0}")]
    Parse(Url),
    #[error("master playlist {0} lists no variants")]
    NoVariants(Url),
    #[error("invalid url {0}")]
    InvalidUrl(String),
}

impl ProbeError {
    /// Definitive errors are not worth retrying
    #[must_use]
    pub const fn is_definitive(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Runs `attempt` until it succeeds, fails definitively, or the retry budget is spent.
///
/// Sleeps `config.backoff(n)` between attempts, never after the last one.
pub async fn with_retries<T, F, Fut>(
    config: &ProbeConfig,
    what: impl fmt::Display,
    mut attempt: F,
) -> Result<T, ProbeError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProbeError>>,
{
    let mut n = 0;
    loop {
        match attempt().await {
            Ok(v) => return Ok(v),
            Err(e) if e.is_definitive() || n >= config.retries => return Err(e),
            Err(e) => {
                let delay = config.backoff(n);
                debug!("{what}: attempt {} failed ({e}), retrying in {delay:?}", n + 1);
                tokio::time::sleep(delay).await;
                n += 1;
            }
        }
    }
}

/// Maps a response to its body, classifying 403 / 404 as definitive
///
/// # Errors
/// Any non-success status
pub fn expect_success(res: HttpResponse) -> Result<String, ProbeError> {
    match res.status {
        StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => Err(ProbeError::NotFound(res.status)),
        s if s.is_success() => Ok(res.body),
        s => Err(ProbeError::Status(s)),
    }
}

/// GETs `url` through `transport` and returns the body of a successful response
///
/// # Errors
/// See [`ProbeError`]
pub async fn fetch_body(transport: &dyn Transport, url: &Url) -> Result<String, ProbeError> {
    let res = transport.get(url).await.map_err(ProbeError::Request)?;
    expect_success(res)
}

pub struct Prober<'a> {
    transport: &'a dyn Transport,
    host: &'a str,
    config: &'a ProbeConfig,
}

impl<'a> Prober<'a> {
    #[must_use]
    pub const fn new(transport: &'a dyn Transport, host: &'a str, config: &'a ProbeConfig) -> Self {
        Self {
            transport,
            host,
            config,
        }
    }

    /// Checks whether `id` currently serves a live HLS playlist.
    ///
    /// Never errors: every failure is folded into [`ProbeOutcome`].
    #[instrument(skip(self))]
    pub async fn probe(&self, id: &str) -> ProbeOutcome {
        let url = channel_url(self.host, id);
        let result = with_retries(self.config, id, || self.check_once(&url)).await;

        match result {
            Ok(url) => ProbeOutcome::Live { url },
            Err(e) if e.is_definitive() => {
                debug!("{id}: {e}");
                ProbeOutcome::Absent
            }
            Err(e) => {
                debug!("{id}: giving up, {e}");
                ProbeOutcome::Unreachable
            }
        }
    }

    #[must_use]
    pub const fn transport(&self) -> &'a dyn Transport {
        self.transport
    }

    #[must_use]
    pub const fn config(&self) -> &'a ProbeConfig {
        self.config
    }

    /// Sleeps the polite delay between two probes
    pub async fn pause(&self) {
        tokio::time::sleep(self.config.polite_delay).await;
    }

    async fn check_once(&self, url: &str) -> Result<Url, ProbeError> {
        let url = Url::parse(url).map_err(|e| ProbeError::InvalidUrl(format!("{url}: {e}")))?;
        let body = fetch_body(self.transport, &url).await?;

        match m3u8_rs::parse_playlist_res(body.as_bytes()) {
            Ok(Playlist::MediaPlaylist(_)) => Ok(url),
            Ok(Playlist::MasterPlaylist(master)) => {
                let variant = master
                    .variants
                    .first()
                    .ok_or_else(|| ProbeError::NoVariants(url.clone()))?;
                let variant_url = url
                    .join(&variant.uri)
                    .map_err(|e| ProbeError::InvalidUrl(format!("{}: {e}", variant.uri)))?;

                fetch_body(self.transport, &variant_url).await?;
                Ok(variant_url)
            }
            Err(_) => Err(ProbeError::Parse(url)),
        }
    }
}
