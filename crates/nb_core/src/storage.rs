use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{Article, SourceFetchState};
use crate::Result;

/// Which identity key matched an existing record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    Url,
    Title,
    Content,
}

impl fmt::Display for MatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MatchKind::Url => "url",
            MatchKind::Title => "title",
            MatchKind::Content => "content",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateCheck {
    pub is_duplicate: bool,
    pub matched_by: Option<MatchKind>,
    pub existing_id: Option<String>,
}

impl DuplicateCheck {
    pub fn unique() -> Self {
        Self {
            is_duplicate: false,
            matched_by: None,
            existing_id: None,
        }
    }

    pub fn matched(kind: MatchKind, existing_id: impl Into<String>) -> Self {
        Self {
            is_duplicate: true,
            matched_by: Some(kind),
            existing_id: Some(existing_id.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveOutcome {
    pub saved: bool,
    /// Set when the article was rejected as a duplicate.
    pub reason: Option<MatchKind>,
}

impl SaveOutcome {
    pub fn saved() -> Self {
        Self { saved: true, reason: None }
    }

    pub fn rejected(reason: MatchKind) -> Self {
        Self { saved: false, reason: Some(reason) }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub saved_count: usize,
    pub duplicate_count: usize,
    pub error_count: usize,
}

impl BatchSummary {
    pub fn merge(&mut self, other: &BatchSummary) {
        self.saved_count += other.saved_count;
        self.duplicate_count += other.duplicate_count;
        self.error_count += other.error_count;
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub article_count: usize,
    pub sources: Vec<SourceFetchState>,
}

/// Filters for cache queries. Results are always newest first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArticleFilter {
    /// Case-insensitive substring of title, summary or content.
    pub keyword: Option<String>,
    pub category: Option<String>,
    pub source_name: Option<String>,
    pub upstream: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: usize,
}

impl ArticleFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keyword = Some(keyword.into());
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn source_name(mut self, source_name: impl Into<String>) -> Self {
        self.source_name = Some(source_name.into());
        self
    }

    pub fn upstream(mut self, upstream: impl Into<String>) -> Self {
        self.upstream = Some(upstream.into());
        self
    }

    pub fn between(mut self, from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Self {
        self.from = from;
        self.to = to;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// In-process evaluation of everything except limit and offset.
    pub fn matches(&self, article: &Article) -> bool {
        if let Some(keyword) = self.keyword.as_deref().map(str::to_lowercase) {
            let hit = article.title.to_lowercase().contains(&keyword)
                || article.summary.to_lowercase().contains(&keyword)
                || article
                    .content
                    .as_deref()
                    .map(|c| c.to_lowercase().contains(&keyword))
                    .unwrap_or(false);
            if !hit {
                return false;
            }
        }
        if let Some(category) = &self.category {
            if !article.category.eq_ignore_ascii_case(category) {
                return false;
            }
        }
        if let Some(source_name) = &self.source_name {
            if article.source_name != *source_name {
                return false;
            }
        }
        if let Some(upstream) = &self.upstream {
            if article.upstream != *upstream {
                return false;
            }
        }
        if self.from.map(|from| article.published_at < from).unwrap_or(false) {
            return false;
        }
        if self.to.map(|to| article.published_at > to).unwrap_or(false) {
            return false;
        }
        true
    }
}

/// True when no successful fetch happened within `max_age` of `now`.
/// A source with no recorded state is always stale.
pub fn is_stale_at(
    state: Option<&SourceFetchState>,
    max_age: chrono::Duration,
    now: DateTime<Utc>,
) -> bool {
    match state {
        Some(state) => now - state.last_fetched_at > max_age,
        None => true,
    }
}

/// The article cache: dedup-aware storage plus per-source freshness state.
#[async_trait]
pub trait ArticleCache: Send + Sync {
    /// Checks URL, then title hash, then content hash; first match wins.
    async fn check_duplicate(&self, article: &Article) -> Result<DuplicateCheck>;

    async fn save(&self, article: &Article) -> Result<SaveOutcome>;

    /// Dedups and inserts the batch as one unit; readers never observe a
    /// partially applied batch. Articles are also deduplicated against
    /// earlier members of the same batch.
    async fn save_batch(&self, articles: &[Article]) -> Result<BatchSummary>;

    async fn query(&self, filter: &ArticleFilter) -> Result<Vec<Article>>;

    async fn get(&self, id: &str) -> Result<Option<Article>>;

    async fn source_state(&self, source_tag: &str) -> Result<Option<SourceFetchState>>;

    /// Creates or replaces the fetch state of `state.source_tag`.
    async fn record_fetch(&self, state: SourceFetchState) -> Result<()>;

    /// Drops all articles and all source fetch states.
    async fn clear(&self) -> Result<()>;

    /// Deletes articles published before `cutoff`, returning how many went.
    async fn prune_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize>;

    async fn stats(&self) -> Result<CacheStats>;

    async fn is_stale(
        &self,
        source_tag: &str,
        max_age: chrono::Duration,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let state = self.source_state(source_tag).await?;
        Ok(is_stale_at(state.as_ref(), max_age, now))
    }

    async fn get_articles(&self, filter: &ArticleFilter) -> Result<Vec<Article>> {
        self.query(filter).await
    }

    async fn search_articles(&self, term: &str, filter: &ArticleFilter) -> Result<Vec<Article>> {
        let filter = filter.clone().keyword(term);
        self.query(&filter).await
    }

    async fn get_articles_by_category(&self, category: &str, limit: usize) -> Result<Vec<Article>> {
        self.query(&ArticleFilter::new().category(category).limit(limit)).await
    }

    async fn get_articles_by_source(&self, source_name: &str, limit: usize) -> Result<Vec<Article>> {
        self.query(&ArticleFilter::new().source_name(source_name).limit(limit)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn state(last: DateTime<Utc>) -> SourceFetchState {
        SourceFetchState {
            source_tag: "newsapi".into(),
            last_fetched_at: last,
            max_age_secs: 1800,
        }
    }

    #[test]
    fn staleness_window() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let max_age = Duration::minutes(30);
        assert!(!is_stale_at(Some(&state(now - Duration::minutes(10))), max_age, now));
        assert!(is_stale_at(Some(&state(now - Duration::minutes(31))), max_age, now));
        assert!(is_stale_at(None, max_age, now));
    }

    #[test]
    fn match_kind_reads_as_reason() {
        assert_eq!(MatchKind::Url.to_string(), "url");
        assert_eq!(serde_json::to_string(&MatchKind::Content).unwrap(), "\"content\"");
        assert_eq!(SaveOutcome::rejected(MatchKind::Title).reason, Some(MatchKind::Title));
    }
}
