use chrono::{DateTime, Utc};
use nb_core::config::DEFAULT_CLUSTER_THRESHOLD;
use nb_core::{Article, OutletClassifier, StoryCluster};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

use crate::bias::{bias_distribution, is_blindspot};
use crate::similarity::{recency_bucket, ArticleFeatures, SimilarityWeights};

/// Clusters with fewer distinct outlets are dropped.
pub const MIN_CLUSTER_SOURCES: usize = 2;
/// Source counts above this stop raising relevance.
const SOURCE_COUNT_CAP: usize = 10;

#[derive(Debug, Clone, Copy)]
pub struct ClusterParams {
    pub threshold: f64, // 0.6
    pub weights: SimilarityWeights,
}

impl Default for ClusterParams {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_CLUSTER_THRESHOLD,
            weights: SimilarityWeights::default(),
        }
    }
}

/// Groups same-event coverage from different outlets.
#[derive(Clone)]
pub struct ClusterBuilder {
    classifier: Arc<dyn OutletClassifier>,
    params: ClusterParams,
}

impl ClusterBuilder {
    pub fn new(classifier: Arc<dyn OutletClassifier>) -> Self {
        Self {
            classifier,
            params: ClusterParams::default(),
        }
    }

    pub fn with_params(mut self, params: ClusterParams) -> Self {
        self.params = params;
        self
    }

    pub fn params(&self) -> &ClusterParams {
        &self.params
    }

    /// Greedy single pass over `articles` in input order, then relevance-sorted.
    ///
    /// The result depends on input order, and a set where everything pairs
    /// above the threshold collapses into one cluster.
    pub fn build(&self, articles: &[Article], now: DateTime<Utc>) -> Vec<StoryCluster> {
        debug!(
            articles = articles.len(),
            threshold = self.params.threshold,
            "clustering started"
        );
        let features: Vec<ArticleFeatures> = articles.iter().map(ArticleFeatures::of).collect();
        let mut assigned = vec![false; articles.len()];
        let mut clusters = Vec::new();
        let mut single_source = 0usize;

        for seed in 0..articles.len() {
            if assigned[seed] {
                continue;
            }
            assigned[seed] = true;
            let mut members_idx = vec![seed];

            for candidate in seed + 1..articles.len() {
                if assigned[candidate] {
                    continue;
                }
                let score = features[candidate].score(&features[seed], self.params.weights);
                if score >= self.params.threshold {
                    assigned[candidate] = true;
                    members_idx.push(candidate);
                }
            }

            let members: Vec<Article> = members_idx.iter().map(|&i| articles[i].clone()).collect();
            match self.finish(members, now) {
                Some(cluster) => clusters.push(cluster),
                None => single_source += 1,
            }
        }

        clusters.sort_by(|a: &StoryCluster, b: &StoryCluster| {
            b.relevance
                .total_cmp(&a.relevance)
                .then_with(|| b.latest.cmp(&a.latest))
                .then_with(|| a.id.cmp(&b.id))
        });
        info!(
            articles = articles.len(),
            clusters = clusters.len(),
            discarded = single_source,
            "clustering finished"
        );
        clusters
    }

    /// Turns a member group into a cluster, or `None` for single-outlet groups.
    fn finish(&self, mut members: Vec<Article>, now: DateTime<Utc>) -> Option<StoryCluster> {
        let sources: BTreeSet<String> = members.iter().map(|a| a.source_name.clone()).collect();
        if sources.len() < MIN_CLUSTER_SOURCES {
            return None;
        }

        members.sort_by(|a, b| b.published_at.cmp(&a.published_at).then_with(|| a.id.cmp(&b.id)));
        let latest = members.first()?.published_at;
        let earliest = members.last()?.published_at;

        let bias = bias_distribution(&members, self.classifier.as_ref());
        let representative = members
            .iter()
            .max_by(|a, b| {
                a.published_at
                    .cmp(&b.published_at)
                    .then_with(|| self.credibility(a).total_cmp(&self.credibility(b)))
            })?
            .clone();

        Some(StoryCluster {
            id: cluster_id(&members),
            representative,
            categories: members.iter().map(|a| a.category.clone()).collect(),
            relevance: relevance(sources.len(), latest, bias.populated_buckets(), now),
            is_blindspot: is_blindspot(&bias),
            bias,
            sources,
            earliest,
            latest,
            members,
        })
    }

    fn credibility(&self, article: &Article) -> f64 {
        article
            .credibility_score
            .or_else(|| self.classifier.credibility(&article.source_name))
            .unwrap_or(0.0)
    }
}

/// Convenience wrapper using the default parameters.
pub fn cluster_articles(
    articles: &[Article],
    classifier: Arc<dyn OutletClassifier>,
    now: DateTime<Utc>,
) -> Vec<StoryCluster> {
    ClusterBuilder::new(classifier).build(articles, now)
}

/// Stable id: sha256 over the sorted member ids.
pub fn cluster_id(members: &[Article]) -> String {
    let mut ids: Vec<&str> = members.iter().map(|a| a.id.as_str()).collect();
    ids.sort_unstable();
    let digest = Sha256::digest(ids.join("|").as_bytes());
    digest.iter().take(12).map(|b| format!("{:02x}", b)).collect()
}

/// 0.4 source breadth, 0.4 recency of the newest member, 0.2 perspective spread.
pub fn relevance(source_count: usize, latest: DateTime<Utc>, populated_buckets: usize, now: DateTime<Utc>) -> f64 {
    let breadth = source_count.min(SOURCE_COUNT_CAP) as f64 / SOURCE_COUNT_CAP as f64;
    let diversity = populated_buckets as f64 / 3.0;
    0.4 * breadth + 0.4 * recency_bucket(now - latest) + 0.2 * diversity
}
