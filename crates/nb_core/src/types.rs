use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::identity::Identity;

/// Canonical, adapter-independent article record.
///
/// Field order and nullability mirror the persisted record: a `None` in
/// `bias_score`, `credibility_score` or `sentiment_score` means "not analyzed
/// yet", never zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: String,
    pub title: String,
    pub summary: String,
    pub content: Option<String>,
    pub url: String,
    pub source_name: String,
    pub source_url: String,
    pub author: String,
    pub published_at: DateTime<Utc>,
    pub fetched_at: DateTime<Utc>,
    pub image_url: Option<String>,
    pub category: String,
    pub bias_score: Option<f64>,
    pub credibility_score: Option<f64>,
    pub social_engagement: u64,
    pub sentiment_score: Option<f64>,
    /// Tag of the upstream feed the record came from (`newsapi`, `guardian`, ...).
    pub upstream: String,
    /// Opaque payload owned by the claim-analysis service.
    pub ai_analysis: Option<serde_json::Value>,
}

impl Article {
    pub fn identity(&self) -> Identity {
        Identity::of(self)
    }

    /// Title and summary joined, the text the similarity signals read from.
    pub fn headline_text(&self) -> String {
        format!("{} {}", self.title, self.summary)
    }
}

/// A record as delivered by a source adapter, before canonicalization.
///
/// Everything is optional and stringly typed: upstream feeds disagree on
/// date formats and on which fields they bother to fill in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawArticle {
    pub title: Option<String>,
    pub description: Option<String>,
    pub content: Option<String>,
    pub url: Option<String>,
    pub source_name: Option<String>,
    pub source_url: Option<String>,
    pub author: Option<String>,
    pub published_at: Option<String>,
    pub image_url: Option<String>,
    pub category: Option<String>,
    pub engagement: Option<u64>,
}

/// Freshness bookkeeping for one upstream source tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceFetchState {
    pub source_tag: String,
    pub last_fetched_at: DateTime<Utc>,
    pub max_age_secs: i64,
}

impl SourceFetchState {
    pub fn max_age(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.max_age_secs)
    }
}

/// Percentages per political bucket, each independently rounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BiasDistribution {
    pub left: u32,
    pub center: u32,
    pub right: u32,
}

impl BiasDistribution {
    /// Number of buckets with any coverage at all.
    pub fn populated_buckets(&self) -> usize {
        [self.left, self.center, self.right]
            .iter()
            .filter(|pct| **pct > 0)
            .count()
    }

    pub fn is_single_perspective(&self) -> bool {
        self.populated_buckets() == 1
    }
}

/// A group of articles from at least two outlets covering the same event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoryCluster {
    pub id: String,
    pub representative: Article,
    pub members: Vec<Article>,
    pub sources: BTreeSet<String>,
    pub bias: BiasDistribution,
    pub is_blindspot: bool,
    pub earliest: DateTime<Utc>,
    pub latest: DateTime<Utc>,
    pub categories: BTreeSet<String>,
    pub relevance: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_perspective_needs_exactly_one_bucket() {
        let one = BiasDistribution { left: 100, center: 0, right: 0 };
        let two = BiasDistribution { left: 50, center: 0, right: 50 };
        let none = BiasDistribution::default();
        assert!(one.is_single_perspective());
        assert!(!two.is_single_perspective());
        assert!(!none.is_single_perspective());
        assert_eq!(two.populated_buckets(), 2);
    }
}
