use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nb_core::{
    Article, ArticleCache, ArticleFilter, BatchSummary, CacheStats, DuplicateCheck, Result,
    SaveOutcome, SourceFetchState,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::dedup::DedupIndex;

#[derive(Debug, Default)]
struct MemoryStore {
    articles: HashMap<String, Article>,
    index: DedupIndex,
    sources: HashMap<String, SourceFetchState>,
}

impl MemoryStore {
    /// Duplicate check and insert in one step; callers hold the write lock.
    fn insert(&mut self, article: &Article) -> SaveOutcome {
        let identity = article.identity();
        let check = self.index.check(&identity);
        if let Some(kind) = check.matched_by {
            debug!(url = %article.url, matched_by = %kind, "duplicate article rejected");
            return SaveOutcome::rejected(kind);
        }
        self.index.insert(&article.id, &identity);
        self.articles.insert(article.id.clone(), article.clone());
        SaveOutcome::saved()
    }
}

/// Process-local cache. One lock guards articles, index and source state, so
/// a batch is applied entirely before any reader sees it.
#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
    store: Arc<RwLock<MemoryStore>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

fn is_storable(article: &Article) -> bool {
    !article.id.is_empty() && !article.url.is_empty() && !article.title.is_empty()
}

#[async_trait]
impl ArticleCache for MemoryCache {
    async fn check_duplicate(&self, article: &Article) -> Result<DuplicateCheck> {
        let store = self.store.read().await;
        Ok(store.index.check(&article.identity()))
    }

    async fn save(&self, article: &Article) -> Result<SaveOutcome> {
        let mut store = self.store.write().await;
        Ok(store.insert(article))
    }

    async fn save_batch(&self, articles: &[Article]) -> Result<BatchSummary> {
        let mut store = self.store.write().await;
        let mut summary = BatchSummary::default();
        for article in articles {
            if !is_storable(article) {
                warn!(id = %article.id, "skipping article without id, url or title");
                summary.error_count += 1;
                continue;
            }
            if store.insert(article).saved {
                summary.saved_count += 1;
            } else {
                summary.duplicate_count += 1;
            }
        }
        Ok(summary)
    }

    async fn query(&self, filter: &ArticleFilter) -> Result<Vec<Article>> {
        let store = self.store.read().await;
        let mut articles: Vec<Article> = store
            .articles
            .values()
            .filter(|article| filter.matches(article))
            .cloned()
            .collect();
        articles.sort_by(|a, b| {
            b.published_at
                .cmp(&a.published_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(articles
            .into_iter()
            .skip(filter.offset)
            .take(filter.limit.unwrap_or(usize::MAX))
            .collect())
    }

    async fn get(&self, id: &str) -> Result<Option<Article>> {
        let store = self.store.read().await;
        Ok(store.articles.get(id).cloned())
    }

    async fn source_state(&self, source_tag: &str) -> Result<Option<SourceFetchState>> {
        let store = self.store.read().await;
        Ok(store.sources.get(source_tag).cloned())
    }

    async fn record_fetch(&self, state: SourceFetchState) -> Result<()> {
        let mut store = self.store.write().await;
        store.sources.insert(state.source_tag.clone(), state);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let mut store = self.store.write().await;
        store.articles.clear();
        store.index.clear();
        store.sources.clear();
        Ok(())
    }

    async fn prune_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let mut store = self.store.write().await;
        let expired: Vec<Article> = store
            .articles
            .values()
            .filter(|article| article.published_at < cutoff)
            .cloned()
            .collect();
        for article in &expired {
            store.articles.remove(&article.id);
            store.index.remove(&article.id, &article.identity());
        }
        Ok(expired.len())
    }

    async fn stats(&self) -> Result<CacheStats> {
        let store = self.store.read().await;
        let mut sources: Vec<SourceFetchState> = store.sources.values().cloned().collect();
        sources.sort_by(|a, b| a.source_tag.cmp(&b.source_tag));
        Ok(CacheStats {
            article_count: store.articles.len(),
            sources,
        })
    }
}
