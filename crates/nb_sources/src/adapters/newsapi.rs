use async_trait::async_trait;
use nb_core::{Error, FetchParams, RawArticle, Result, SourceAdapter};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{create_http_client, read_json, transport_error, DEFAULT_PAGE_SIZE};

pub const TAG: &str = "newsapi";
const BASE_URL: &str = "https://newsapi.org";
const MAX_PAGE_SIZE: usize = 100;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewsApiResponse {
    status: String,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    articles: Vec<NewsApiArticle>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewsApiArticle {
    source: NewsApiSource,
    author: Option<String>,
    title: Option<String>,
    description: Option<String>,
    url: Option<String>,
    url_to_image: Option<String>,
    published_at: Option<String>,
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NewsApiSource {
    name: Option<String>,
}

/// newsapi.org: fast-moving headlines, refreshed every half hour.
#[derive(Debug, Clone)]
pub struct NewsApiAdapter {
    api_key: Option<String>,
    base_url: String,
    client: reqwest::Client,
}

impl NewsApiAdapter {
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

    fn build_query(&self, params: &FetchParams) -> (String, Vec<(&'static str, String)>) {
        let page_size = params.limit.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE);
        let mut query = vec![("pageSize", page_size.to_string())];

        // /everything takes free text but no category or country
        if let Some(keywords) = params.keywords.as_ref().filter(|k| !k.trim().is_empty()) {
            query.push(("q", keywords.clone()));
            query.push(("sortBy", "publishedAt".to_string()));
            if let Some(language) = &params.language {
                query.push(("language", language.clone()));
            }
            return (format!("{}/v2/everything", self.base_url), query);
        }

        if let Some(category) = &params.category {
            query.push(("category", category.clone()));
        }
        query.push(("country", params.country.clone().unwrap_or_else(|| "us".to_string())));
        (format!("{}/v2/top-headlines", self.base_url), query)
    }
}

#[async_trait]
impl SourceAdapter for NewsApiAdapter {
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
        chrono::Duration::minutes(30)
    }

    async fn fetch_articles(&self, params: &FetchParams) -> Result<Vec<RawArticle>> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| Error::source_error(TAG, "missing API key"))?;
        let (endpoint, query) = self.build_query(params);

        let response = self
            .client
            .get(&endpoint)
            .header("X-Api-Key", api_key)
            .query(&query)
            .send()
            .await
            .map_err(|e| transport_error(TAG, e))?;
        let body: NewsApiResponse = read_json(TAG, response).await?;

        if body.status != "ok" {
            return Err(Error::source_error(
                TAG,
                format!(
                    "{}: {}",
                    body.code.unwrap_or_else(|| "error".to_string()),
                    body.message.unwrap_or_default()
                ),
            ));
        }

        debug!(source = TAG, count = body.articles.len(), "fetched articles");
        let category = params.category.clone();
        Ok(body
            .articles
            .into_iter()
            // placeholder entries newsapi returns for pulled articles
            .filter(|a| a.title.as_deref() != Some("[Removed]"))
            .map(|a| RawArticle {
                title: a.title,
                description: a.description,
                content: a.content,
                url: a.url,
                source_name: a.source.name,
                source_url: None,
                author: a.author,
                published_at: a.published_at,
                image_url: a.url_to_image,
                category: category.clone(),
                engagement: None,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_switch_to_everything_endpoint() {
        let adapter = NewsApiAdapter::new(Some("key".into())).unwrap();
        let params = FetchParams {
            keywords: Some("budget".into()),
            category: Some("business".into()),
            limit: Some(500),
            ..Default::default()
        };
        let (endpoint, query) = adapter.build_query(&params);
        assert!(endpoint.ends_with("/v2/everything"));
        assert!(query.contains(&("q", "budget".to_string())));
        assert!(query.contains(&("pageSize", "100".to_string())));
        assert!(!query.iter().any(|(k, _)| *k == "category"));
    }

    #[test]
    fn headlines_default_to_us() {
        let adapter = NewsApiAdapter::new(Some("key".into())).unwrap();
        let (endpoint, query) = adapter.build_query(&FetchParams::default());
        assert!(endpoint.ends_with("/v2/top-headlines"));
        assert!(query.contains(&("country", "us".to_string())));
    }

    #[test]
    fn blank_key_is_unavailable() {
        assert!(!NewsApiAdapter::new(Some("  ".into())).unwrap().is_available());
        assert!(!NewsApiAdapter::new(None).unwrap().is_available());
    }
}
