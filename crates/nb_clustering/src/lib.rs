//! Same-event clustering across outlets and the political spread of each cluster.

pub mod bias;
pub mod cluster;
pub mod entities;
pub mod similarity;
pub mod text;

pub use bias::{bias_distribution, is_blindspot};
pub use cluster::{cluster_articles, cluster_id, ClusterBuilder, ClusterParams, MIN_CLUSTER_SOURCES};
pub use entities::{entity_overlap, extract_entities};
pub use similarity::{similarity, similarity_with, time_proximity, ArticleFeatures, SimilarityWeights};
pub use text::{jaccard, text_similarity, word_set, TextFeatures};
