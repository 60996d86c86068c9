use async_trait::async_trait;
use nb_core::{Error, FetchParams, RawArticle, Result, SourceAdapter};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{create_http_client, read_json, transport_error, DEFAULT_PAGE_SIZE};

pub const TAG: &str = "guardian";
const BASE_URL: &str = "https://content.guardianapis.com";
const SOURCE_NAME: &str = "The Guardian";
const MAX_PAGE_SIZE: usize = 50;

#[derive(Debug, Deserialize)]
struct GuardianEnvelope {
    response: GuardianResponse,
}

#[derive(Debug, Deserialize)]
struct GuardianResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    results: Vec<GuardianResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GuardianResult {
    web_title: Option<String>,
    web_url: Option<String>,
    web_publication_date: Option<String>,
    section_id: Option<String>,
    #[serde(default)]
    fields: GuardianFields,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GuardianFields {
    trail_text: Option<String>,
    body_text: Option<String>,
    byline: Option<String>,
    thumbnail: Option<String>,
}

/// The Guardian open platform: a syndicated feed, fresh for two hours.
#[derive(Debug, Clone)]
pub struct GuardianAdapter {
    api_key: Option<String>,
    base_url: String,
    client: reqwest::Client,
}

impl GuardianAdapter {
    pub fn new(api_key: Option<String>) -> Result<Self> {
        Ok(Self {
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            base_url: BASE_URL.to_string(),
            client: create_http_client()?,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl SourceAdapter for GuardianAdapter {
    fn tag(&self) -> &str {
        TAG
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    fn min_interval(&self) -> Duration {
        Duration::from_millis(1000)
    }

    fn default_max_age(&self) -> chrono::Duration {
        chrono::Duration::hours(2)
    }

    async fn fetch_articles(&self, params: &FetchParams) -> Result<Vec<RawArticle>> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| Error::source_error(TAG, "missing API key"))?;
        let page_size = params.limit.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE);

        let mut query = vec![
            ("api-key", api_key.to_string()),
            ("page-size", page_size.to_string()),
            ("order-by", "newest".to_string()),
            ("show-fields", "trailText,bodyText,byline,thumbnail".to_string()),
        ];
        if let Some(keywords) = params.keywords.as_ref().filter(|k| !k.trim().is_empty()) {
            query.push(("q", keywords.clone()));
        }
        if let Some(category) = &params.category {
            query.push(("section", category.clone()));
        }

        let response = self
            .client
            .get(format!("{}/search", self.base_url))
            .query(&query)
            .send()
            .await
            .map_err(|e| transport_error(TAG, e))?;
        let envelope: GuardianEnvelope = read_json(TAG, response).await?;
        let body = envelope.response;
        if body.status != "ok" {
            return Err(Error::source_error(
                TAG,
                body.message.unwrap_or_else(|| format!("status {}", body.status)),
            ));
        }

        debug!(source = TAG, count = body.results.len(), "fetched articles");
        Ok(body
            .results
            .into_iter()
            .map(|r| RawArticle {
                title: r.web_title,
                description: r.fields.trail_text,
                content: r.fields.body_text,
                url: r.web_url,
                source_name: Some(SOURCE_NAME.to_string()),
                source_url: Some("https://www.theguardian.com".to_string()),
                author: r.fields.byline,
                published_at: r.web_publication_date,
                image_url: r.fields.thumbnail,
                category: r.section_id,
                engagement: None,
            })
            .collect())
    }
}
