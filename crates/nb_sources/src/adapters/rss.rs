use async_trait::async_trait;
use futures::future::join_all;
use nb_core::{Error, FetchParams, RawArticle, Result, SourceAdapter};
use std::time::Duration;
use tracing::{debug, warn};

use super::{create_http_client, ensure_success, transport_error, DEFAULT_PAGE_SIZE};

pub const TAG: &str = "rss";

/// One syndicated feed: the outlet name stamped on its items and the feed URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RssFeed {
    pub name: String,
    pub url: String,
}

impl std::str::FromStr for RssFeed {
    type Err = String;

    /// Parses `Outlet Name=https://example.com/feed.xml`.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (name, url) = s
            .split_once('=')
            .ok_or_else(|| format!("expected Name=url, got '{s}'"))?;
        let (name, url) = (name.trim(), url.trim());
        if name.is_empty() || url.is_empty() {
            return Err(format!("expected Name=url, got '{s}'"));
        }
        Ok(Self {
            name: name.to_string(),
            url: url.to_string(),
        })
    }
}

/// Aggregates a list of RSS feeds under one source tag. Slow syndicated
/// content, so it stays fresh for four hours.
#[derive(Debug, Clone)]
pub struct RssAdapter {
    feeds: Vec<RssFeed>,
    client: reqwest::Client,
}

impl RssAdapter {
    pub fn new(feeds: Vec<RssFeed>) -> Result<Self> {
        Ok(Self {
            feeds,
            client: create_http_client()?,
        })
    }

    pub fn feeds(&self) -> &[RssFeed] {
        &self.feeds
    }

    async fn fetch_feed(&self, feed: &RssFeed) -> Result<Vec<RawArticle>> {
        let response = self
            .client
            .get(&feed.url)
            .send()
            .await
            .map_err(|e| transport_error(TAG, e))?;
        let bytes = ensure_success(TAG, response)
            .await?
            .bytes()
            .await
            .map_err(|e| transport_error(TAG, e))?;
        let channel = ::rss::Channel::read_from(&bytes[..])
            .map_err(|e| Error::source_error(TAG, format!("{}: malformed feed: {e}", feed.name)))?;

        let source_url = channel.link().to_string();
        Ok(channel
            .items()
            .iter()
            .map(|item| RawArticle {
                title: item.title().map(str::to_string),
                description: item.description().map(str::to_string),
                content: item.content().map(str::to_string),
                url: item.link().map(str::to_string),
                source_name: Some(feed.name.clone()),
                source_url: Some(source_url.clone()).filter(|u| !u.is_empty()),
                author: item
                    .author()
                    .map(str::to_string)
                    .or_else(|| item.dublin_core_ext().and_then(|dc| dc.creators().first().cloned())),
                published_at: item.pub_date().map(str::to_string),
                image_url: item.enclosure().map(|e| e.url().to_string()),
                category: item.categories().first().map(|c| c.name().to_string()),
                engagement: None,
            })
            .collect())
    }
}

fn matches_params(record: &RawArticle, params: &FetchParams) -> bool {
    if let Some(keywords) = params.keywords.as_deref().map(str::to_lowercase) {
        let haystack = format!(
            "{} {}",
            record.title.as_deref().unwrap_or_default(),
            record.description.as_deref().unwrap_or_default()
        )
        .to_lowercase();
        if !keywords.split_whitespace().any(|word| haystack.contains(word)) {
            return false;
        }
    }
    match (&params.category, &record.category) {
        (Some(wanted), Some(actual)) => wanted.eq_ignore_ascii_case(actual),
        (Some(_), None) => false,
        _ => true,
    }
}

#[async_trait]
impl SourceAdapter for RssAdapter {
    fn tag(&self) -> &str {
        TAG
    }

    fn is_available(&self) -> bool {
        !self.feeds.is_empty()
    }

    fn min_interval(&self) -> Duration {
        Duration::from_millis(2000)
    }

    fn default_max_age(&self) -> chrono::Duration {
        chrono::Duration::hours(4)
    }

    /// Feeds are fetched concurrently; a broken feed is logged and skipped.
    /// Only when every feed fails does the adapter report an error.
    async fn fetch_articles(&self, params: &FetchParams) -> Result<Vec<RawArticle>> {
        let results = join_all(self.feeds.iter().map(|feed| self.fetch_feed(feed))).await;

        let mut records = Vec::new();
        let mut failures = Vec::new();
        for (feed, result) in self.feeds.iter().zip(results) {
            match result {
                Ok(items) => {
                    debug!(feed = %feed.name, count = items.len(), "fetched feed");
                    records.extend(items);
                }
                Err(e) => {
                    warn!(feed = %feed.name, error = %e, "feed failed");
                    failures.push(format!("{}: {e}", feed.name));
                }
            }
        }
        if !self.feeds.is_empty() && failures.len() == self.feeds.len() {
            return Err(Error::source_error(TAG, failures.join("; ")));
        }

        let limit = params.limit.unwrap_or(DEFAULT_PAGE_SIZE);
        Ok(records
            .into_iter()
            .filter(|record| matches_params(record, params))
            .take(limit)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_name_and_url() {
        let feed: RssFeed = "BBC News=https://feeds.bbci.co.uk/news/rss.xml".parse().unwrap();
        assert_eq!(feed.name, "BBC News");
        assert_eq!(feed.url, "https://feeds.bbci.co.uk/news/rss.xml");
        assert!("no-separator".parse::<RssFeed>().is_err());
        assert!("=https://x".parse::<RssFeed>().is_err());
    }

    #[test]
    fn keyword_and_category_filtering() {
        let record = RawArticle {
            title: Some("Council approves budget".into()),
            category: Some("Politics".into()),
            ..Default::default()
        };
        let params = FetchParams {
            keywords: Some("Budget".into()),
            category: Some("politics".into()),
            ..Default::default()
        };
        assert!(matches_params(&record, &params));

        let other = FetchParams {
            keywords: Some("weather".into()),
            ..Default::default()
        };
        assert!(!matches_params(&record, &other));
    }

    #[test]
    fn empty_feed_list_is_unavailable() {
        assert!(!RssAdapter::new(vec![]).unwrap().is_available());
    }
}
