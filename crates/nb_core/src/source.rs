use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::SourcePolicy;
use crate::types::RawArticle;
use crate::Result;

/// Query parameters handed to adapters and to the fetch orchestrator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FetchParams {
    pub keywords: Option<String>,
    pub category: Option<String>,
    pub country: Option<String>,
    pub language: Option<String>,
    pub limit: Option<usize>,
    /// Source tags to consult; empty means every registered adapter.
    #[serde(default)]
    pub sources: Vec<String>,
    /// Refetch even when every requested source is fresh.
    #[serde(default)]
    pub force_refresh: bool,
}

/// One upstream news feed integration.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Stable tag stored on every article this adapter produces.
    fn tag(&self) -> &str;

    /// Whether the adapter has the configuration it needs (API keys, feed URLs).
    fn is_available(&self) -> bool;

    /// Minimum gap the orchestrator must leave between two requests.
    fn min_interval(&self) -> Duration;

    /// How long a successful fetch stays fresh unless configured otherwise.
    fn default_max_age(&self) -> chrono::Duration;

    /// Fetches raw records. A non-success upstream response is an error, never
    /// an empty list.
    async fn fetch_articles(&self, params: &FetchParams) -> Result<Vec<RawArticle>>;

    fn policy(&self) -> SourcePolicy {
        SourcePolicy::new(self.default_max_age(), self.min_interval())
    }
}
