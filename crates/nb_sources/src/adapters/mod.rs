use nb_core::{Error, Result};
use serde::de::DeserializeOwned;
use std::time::Duration;

pub mod guardian;
pub mod newsapi;
pub mod rss;

pub use self::guardian::GuardianAdapter;
pub use self::newsapi::NewsApiAdapter;
pub use self::rss::{RssAdapter, RssFeed};

/// HTTP timeout for a single upstream request.
const FETCH_TIMEOUT_SECS: u64 = 30;
/// Upstream error bodies are cut to this many characters in error messages.
const ERROR_BODY_CHARS: usize = 200;
/// Page size asked of upstreams when the caller gave no limit.
pub(crate) const DEFAULT_PAGE_SIZE: usize = 50;

/// Shared client with the upstream timeout applied.
pub fn create_http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
        .user_agent(concat!("nb/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(Error::from)
}

/// Fails on a non-success status with the (truncated) upstream body.
pub(crate) async fn ensure_success(tag: &str, response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let body: String = body.chars().take(ERROR_BODY_CHARS).collect();
    Err(Error::source_error(tag, format!("HTTP {status}: {}", body.trim())))
}

pub(crate) async fn read_json<T: DeserializeOwned>(tag: &str, response: reqwest::Response) -> Result<T> {
    let response = ensure_success(tag, response).await?;
    response
        .json::<T>()
        .await
        .map_err(|e| Error::source_error(tag, format!("malformed payload: {e}")))
}

pub(crate) fn transport_error(tag: &str, error: reqwest::Error) -> Error {
    if error.is_timeout() {
        Error::source_error(tag, "request timed out")
    } else {
        Error::source_error(tag, format!("request failed: {error}"))
    }
}
