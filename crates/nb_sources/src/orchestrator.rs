use chrono::{DateTime, Utc};
use futures::future::join_all;
use nb_core::{
    canonicalize, Article, ArticleCache, ArticleFilter, BatchSummary, Clock, Error, FetchParams,
    PipelineConfig, Result, SourceAdapter, SourceFetchState, SourcePolicy,
};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::rate_limit::RateGate;
use crate::registry::SourceRegistry;

/// Key under which a failed cache write is reported in [`FetchReport::errors`].
pub const CACHE_ERROR_KEY: &str = "cache";

/// Outcome of one `get_articles` call.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FetchReport {
    pub articles: Vec<Article>,
    /// True when every requested source was fresh and nothing was fetched.
    pub from_cache: bool,
    /// Source tags that were fetched successfully.
    pub fetched: Vec<String>,
    /// Per-source failure messages, plus [`CACHE_ERROR_KEY`] when the write failed.
    pub errors: BTreeMap<String, String>,
    pub saved: BatchSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceStatus {
    pub tag: String,
    pub available: bool,
    pub max_age_secs: i64,
    pub min_interval_ms: u64,
    pub last_fetched_at: Option<DateTime<Utc>>,
    pub stale: bool,
}

/// Fans out to stale sources, merges what comes back and writes it to the cache.
pub struct FetchOrchestrator {
    cache: Arc<dyn ArticleCache>,
    registry: SourceRegistry,
    gate: RateGate,
    clock: Arc<dyn Clock>,
    config: PipelineConfig,
}

impl FetchOrchestrator {
    pub fn new(
        cache: Arc<dyn ArticleCache>,
        registry: SourceRegistry,
        clock: Arc<dyn Clock>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            cache,
            registry,
            gate: RateGate::new(clock.clone()),
            clock,
            config,
        }
    }

    pub fn cache(&self) -> &Arc<dyn ArticleCache> {
        &self.cache
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn policy(&self, adapter: &dyn SourceAdapter) -> SourcePolicy {
        self.config.policy_for(adapter.tag(), adapter.policy())
    }

    /// Returns cached articles, refreshing stale sources first.
    ///
    /// Fails only when every requested source failed; otherwise the report
    /// carries the merged result plus per-source errors.
    pub async fn get_articles(&self, params: &FetchParams) -> Result<FetchReport> {
        let started = Instant::now();
        let now = self.clock.now();
        let mut report = FetchReport::default();

        let mut requested: Vec<Arc<dyn SourceAdapter>> = Vec::new();
        if params.sources.is_empty() {
            requested.extend(self.registry.iter().cloned());
        } else {
            for tag in &params.sources {
                match self.registry.get(tag) {
                    Some(adapter) => requested.push(adapter),
                    None => {
                        report
                            .errors
                            .insert(tag.clone(), format!("unknown source '{tag}'"));
                    }
                }
            }
        }

        let mut stale = Vec::new();
        let mut fresh = 0usize;
        for adapter in requested {
            if !adapter.is_available() {
                debug!(source = %adapter.tag(), "source not configured, skipping");
                continue;
            }
            let policy = self.policy(adapter.as_ref());
            if params.force_refresh || self.cache.is_stale(adapter.tag(), policy.max_age, now).await? {
                stale.push((adapter, policy));
            } else {
                fresh += 1;
            }
        }

        if stale.is_empty() {
            if fresh == 0 && !report.errors.is_empty() {
                return Err(Error::AllSourcesFailed(report.errors));
            }
            info!(sources = fresh, "all requested sources fresh, serving from cache");
            report.from_cache = true;
            report.articles = self.cached(params).await?;
            return Ok(report);
        }

        info!(
            stale = stale.len(),
            fresh,
            force = params.force_refresh,
            "refreshing sources"
        );
        let results = join_all(
            stale
                .iter()
                .map(|(adapter, policy)| self.fetch_source(adapter.as_ref(), *policy, params)),
        )
        .await;

        let mut batch = Vec::new();
        let mut succeeded = Vec::new();
        for ((adapter, policy), result) in stale.iter().zip(results) {
            match result {
                Ok(articles) => {
                    info!(source = %adapter.tag(), count = articles.len(), "source fetched");
                    batch.extend(articles);
                    succeeded.push((adapter.tag().to_string(), *policy));
                }
                Err(e) => {
                    warn!(source = %adapter.tag(), error = %e, "source failed");
                    report.errors.insert(adapter.tag().to_string(), e.to_string());
                }
            }
        }

        if succeeded.is_empty() && fresh == 0 {
            return Err(Error::AllSourcesFailed(report.errors));
        }

        let mut stored = true;
        if !batch.is_empty() {
            match self.cache.save_batch(&batch).await {
                Ok(summary) => report.saved = summary,
                Err(e) => {
                    warn!(error = %e, articles = batch.len(), "cache write failed, serving the batch unsaved");
                    report.errors.insert(CACHE_ERROR_KEY.to_string(), e.to_string());
                    stored = false;
                }
            }
        }
        let completed_at = self.clock.now();
        for (tag, policy) in succeeded {
            // an unsaved batch leaves the source stale so the next call retries it
            if stored {
                self.cache
                    .record_fetch(SourceFetchState {
                        source_tag: tag.clone(),
                        last_fetched_at: completed_at,
                        max_age_secs: policy.max_age.num_seconds(),
                    })
                    .await?;
            }
            report.fetched.push(tag);
        }

        report.articles = self.merged(params, batch, stored).await?;
        info!(
            saved = report.saved.saved_count,
            duplicates = report.saved.duplicate_count,
            failed_sources = report.errors.len(),
            returned = report.articles.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "fetch completed"
        );
        Ok(report)
    }

    /// Rate-gates, fetches and canonicalizes one source. Malformed records are
    /// dropped; any adapter failure is returned as a source error.
    async fn fetch_source(
        &self,
        adapter: &dyn SourceAdapter,
        policy: SourcePolicy,
        params: &FetchParams,
    ) -> Result<Vec<Article>> {
        let tag = adapter.tag();
        self.gate.acquire(tag, policy.min_interval).await;

        let records = adapter.fetch_articles(params).await.map_err(|e| match e {
            Error::Source { .. } => e,
            other => Error::source_error(tag, other.to_string()),
        })?;

        let now = self.clock.now();
        let mut articles = Vec::with_capacity(records.len());
        let mut dropped = 0usize;
        for record in records {
            match canonicalize(record, tag, now) {
                Ok(article) => articles.push(article),
                Err(e) => {
                    dropped += 1;
                    warn!(source = %tag, error = %e, "dropping malformed record");
                }
            }
        }
        if dropped > 0 {
            debug!(source = %tag, dropped, kept = articles.len(), "canonicalized batch");
        }
        Ok(articles)
    }

    async fn cached(&self, params: &FetchParams) -> Result<Vec<Article>> {
        let limit = params.limit.unwrap_or(self.config.default_limit);
        let mut filter = ArticleFilter {
            keyword: params.keywords.clone().filter(|k| !k.trim().is_empty()),
            category: params.category.clone(),
            ..Default::default()
        };

        if params.sources.is_empty() {
            filter.limit = Some(limit);
            return self.cache.query(&filter).await;
        }
        if let [single] = params.sources.as_slice() {
            filter.upstream = Some(single.clone());
            filter.limit = Some(limit);
            return self.cache.query(&filter).await;
        }

        let wanted: HashSet<&str> = params.sources.iter().map(String::as_str).collect();
        let articles = self.cache.query(&filter).await?;
        Ok(articles
            .into_iter()
            .filter(|a| wanted.contains(a.upstream.as_str()))
            .take(limit)
            .collect())
    }

    /// Cached matches plus this call's surviving batch, newest first.
    ///
    /// The batch was already matched upstream, so it is not re-filtered by
    /// keyword. A batch article counts as surviving when its id made it into
    /// the cache; when the write failed, the batch itself stands in,
    /// deduplicated by URL.
    async fn merged(&self, params: &FetchParams, batch: Vec<Article>, stored: bool) -> Result<Vec<Article>> {
        let limit = params.limit.unwrap_or(self.config.default_limit);
        let mut articles = self.cached(params).await?;
        let mut seen_ids: HashSet<String> = articles.iter().map(|a| a.id.clone()).collect();
        let mut seen_urls: HashSet<String> = articles.iter().map(|a| a.url.clone()).collect();

        for article in batch {
            if seen_ids.contains(&article.id) || seen_urls.contains(&article.url) {
                continue;
            }
            let survivor = if stored {
                match self.cache.get(&article.id).await? {
                    Some(survivor) => survivor,
                    None => continue,
                }
            } else {
                article
            };
            seen_ids.insert(survivor.id.clone());
            seen_urls.insert(survivor.url.clone());
            articles.push(survivor);
        }

        articles.sort_by(|a, b| b.published_at.cmp(&a.published_at).then_with(|| a.id.cmp(&b.id)));
        articles.truncate(limit);
        Ok(articles)
    }

    /// Availability, policy and freshness of every registered source.
    pub async fn source_statuses(&self) -> Result<Vec<SourceStatus>> {
        let now = self.clock.now();
        let mut statuses = Vec::with_capacity(self.registry.len());
        for adapter in self.registry.iter() {
            let policy = self.policy(adapter.as_ref());
            let state = self.cache.source_state(adapter.tag()).await?;
            statuses.push(SourceStatus {
                tag: adapter.tag().to_string(),
                available: adapter.is_available(),
                max_age_secs: policy.max_age.num_seconds(),
                min_interval_ms: policy.min_interval.as_millis() as u64,
                last_fetched_at: state.as_ref().map(|s| s.last_fetched_at),
                stale: nb_core::storage::is_stale_at(state.as_ref(), policy.max_age, now),
            });
        }
        Ok(statuses)
    }
}
