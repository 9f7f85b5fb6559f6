use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{
    StatusCode, Url,
    header::{COOKIE, HeaderMap, HeaderValue, USER_AGENT},
};
use tracing::debug;

use crate::config::HttpConfig;

/// Status and body of a completed GET, whatever the status was
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub body: String,
}

/// The only network operation the scout needs.
///
/// An `Err` means no response was received at all (timeout, DNS, TLS, reset...).
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &Url) -> Result<HttpResponse>;
}

pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// # Errors
    /// Errors when a configured header value is not a valid HTTP header or the client cannot be built
    pub fn new(config: &HttpConfig) -> Result<Self> {
        Ok(Self {
            client: init_http_client(config)?,
        })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, url: &Url) -> Result<HttpResponse> {
        debug!("GET {url}");
        let res = self
            .client
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("Requesting {url}"))?;

        let status = res.status();
        let body = res
            .text()
            .await
            .with_context(|| format!("Reading body of {url}"))?;

        Ok(HttpResponse { status, body })
    }
}

/// # Errors
/// Errors when `CVTV_COOKIE` / `CVTV_UA` hold bytes that are not allowed in a header
pub fn init_http_client(config: &HttpConfig) -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();

    let user_agent = config.user_agent.clone().unwrap_or_else(|| {
        format!(
            "{}/{} (+{})",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION"),
            env!("CARGO_PKG_REPOSITORY")
        )
    });
    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(&user_agent).context("Invalid User-Agent header value")?,
    );

    if let Some(cookie) = &config.cookie {
        let mut value = HeaderValue::from_str(cookie).context("Invalid Cookie header value")?;
        value.set_sensitive(true);
        headers.insert(COOKIE, value);
    }

    reqwest::Client::builder()
        .default_headers(headers)
        .timeout(config.timeout)
        .connect_timeout(config.timeout)
        .build()
        .context("Unable to build HTTP client")
}
