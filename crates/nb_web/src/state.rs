use nb_clustering::ClusterBuilder;
use nb_core::{ArticleCache, Clock};
use nb_sources::FetchOrchestrator;
use std::sync::Arc;

pub struct AppState {
    pub orchestrator: Arc<FetchOrchestrator>,
    pub clusters: ClusterBuilder,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    pub fn new(orchestrator: Arc<FetchOrchestrator>, clusters: ClusterBuilder, clock: Arc<dyn Clock>) -> Self {
        Self {
            orchestrator,
            clusters,
            clock,
        }
    }

    pub fn cache(&self) -> &Arc<dyn ArticleCache> {
        self.orchestrator.cache()
    }
}
