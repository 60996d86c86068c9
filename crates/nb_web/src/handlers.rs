use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use nb_core::{Article, ArticleFilter, FetchParams, StoryCluster};
use nb_sources::FetchReport;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Articles handed to the cluster builder when the caller gives no limit.
const CLUSTER_WORKING_SET: usize = 200;

#[derive(Debug, Default, Deserialize)]
pub struct ArticleQuery {
    pub keyword: Option<String>,
    pub category: Option<String>,
    pub source: Option<String>,
    pub upstream: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: usize,
}

impl ArticleQuery {
    fn into_filter(self, default_limit: usize) -> ArticleFilter {
        ArticleFilter {
            keyword: self.keyword.filter(|k| !k.trim().is_empty()),
            category: self.category,
            source_name: self.source,
            upstream: self.upstream,
            from: self.from,
            to: self.to,
            limit: Some(self.limit.unwrap_or(default_limit)),
            offset: self.offset,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub category: Option<String>,
    pub source: Option<String>,
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: usize,
}

#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ClusterQuery {
    pub keyword: Option<String>,
    pub category: Option<String>,
    /// Size of the article working set, newest first.
    pub limit: Option<usize>,
    #[serde(default)]
    pub blindspot_only: bool,
}

pub async fn list_articles(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ArticleQuery>,
) -> ApiResult<Json<Vec<Article>>> {
    let filter = query.into_filter(state.orchestrator.config().default_limit);
    Ok(Json(state.cache().get_articles(&filter).await?))
}

pub async fn search_articles(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<Vec<Article>>> {
    let term = query
        .q
        .filter(|q| !q.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("missing search term `q`".to_string()))?;
    let filter = ArticleFilter {
        category: query.category,
        source_name: query.source,
        limit: Some(query.limit.unwrap_or(state.orchestrator.config().default_limit)),
        offset: query.offset,
        ..Default::default()
    };
    let articles = state.cache().search_articles(term.trim(), &filter).await?;
    debug!(term = %term, hits = articles.len(), "search");
    Ok(Json(articles))
}

pub async fn articles_by_category(
    State(state): State<Arc<AppState>>,
    Path(category): Path<String>,
    Query(query): Query<LimitQuery>,
) -> ApiResult<Json<Vec<Article>>> {
    let limit = query.limit.unwrap_or(state.orchestrator.config().default_limit);
    Ok(Json(state.cache().get_articles_by_category(&category, limit).await?))
}

pub async fn articles_by_source(
    State(state): State<Arc<AppState>>,
    Path(source): Path<String>,
    Query(query): Query<LimitQuery>,
) -> ApiResult<Json<Vec<Article>>> {
    let limit = query.limit.unwrap_or(state.orchestrator.config().default_limit);
    Ok(Json(state.cache().get_articles_by_source(&source, limit).await?))
}

pub async fn get_article(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Article>> {
    state
        .cache()
        .get(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("article {id}")))
}

pub async fn list_clusters(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ClusterQuery>,
) -> ApiResult<Json<Vec<StoryCluster>>> {
    let filter = ArticleFilter {
        keyword: query.keyword.filter(|k| !k.trim().is_empty()),
        category: query.category,
        limit: Some(query.limit.unwrap_or(CLUSTER_WORKING_SET)),
        ..Default::default()
    };
    let articles = state.cache().query(&filter).await?;
    let mut clusters = state.clusters.build(&articles, state.clock.now());
    if query.blindspot_only {
        clusters.retain(|c| c.is_blindspot);
    }
    Ok(Json(clusters))
}

/// Runs the fetch pipeline. An empty body refreshes stale sources with defaults.
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    params: Option<Json<FetchParams>>,
) -> ApiResult<Json<FetchReport>> {
    let params = params.map(|Json(p)| p).unwrap_or_default();
    let report = state.orchestrator.get_articles(&params).await?;
    info!(
        fetched = report.fetched.len(),
        failed = report.errors.len(),
        from_cache = report.from_cache,
        "refresh requested"
    );
    Ok(Json(report))
}
