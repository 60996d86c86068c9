use chrono::{DateTime, Duration, Utc};
use nb_core::Article;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::entities::{entity_overlap, extract_entities};
use crate::text::TextFeatures;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimilarityWeights {
    pub title: f64,    // 0.4
    pub summary: f64,  // 0.3
    pub time: f64,     // 0.2
    pub entities: f64, // 0.1
}

impl Default for SimilarityWeights {
    fn default() -> Self {
        Self {
            title: 0.4,
            summary: 0.3,
            time: 0.2,
            entities: 0.1,
        }
    }
}

/// Decay over the gap between two instants: a day, two days, three days, a week.
pub fn recency_bucket(gap: Duration) -> f64 {
    let hours = gap.num_minutes().abs() as f64 / 60.0;
    if hours <= 24.0 {
        1.0
    } else if hours <= 48.0 {
        0.8
    } else if hours <= 72.0 {
        0.6
    } else if hours <= 168.0 {
        0.4
    } else {
        0.1
    }
}

pub fn time_proximity(a: DateTime<Utc>, b: DateTime<Utc>) -> f64 {
    recency_bucket(a - b)
}

/// Everything the scorer reads from one article, extracted once.
#[derive(Debug, Clone)]
pub struct ArticleFeatures {
    title: TextFeatures,
    summary: TextFeatures,
    entities: BTreeSet<String>,
    published_at: DateTime<Utc>,
}

impl ArticleFeatures {
    pub fn of(article: &Article) -> Self {
        Self {
            title: TextFeatures::new(&article.title),
            summary: TextFeatures::new(&article.summary),
            entities: extract_entities(&article.headline_text()),
            published_at: article.published_at,
        }
    }

    pub fn entities(&self) -> &BTreeSet<String> {
        &self.entities
    }

    /// Weighted sum of the four sub-scores, clamped to `[0, 1]`.
    ///
    /// Entity overlap is measured against `self`'s entities, so swapping the
    /// arguments can shift the score by up to the entity weight.
    pub fn score(&self, other: &ArticleFeatures, weights: SimilarityWeights) -> f64 {
        let total = weights.title * self.title.similarity(&other.title)
            + weights.summary * self.summary.similarity(&other.summary)
            + weights.time * time_proximity(self.published_at, other.published_at)
            + weights.entities * entity_overlap(&self.entities, &other.entities);
        total.clamp(0.0, 1.0)
    }
}

pub fn similarity(a: &Article, b: &Article) -> f64 {
    similarity_with(a, b, SimilarityWeights::default())
}

pub fn similarity_with(a: &Article, b: &Article, weights: SimilarityWeights) -> f64 {
    ArticleFeatures::of(a).score(&ArticleFeatures::of(b), weights)
}
