use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

pub mod error;
pub mod handlers;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use state::AppState;

pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::permissive();

    Router::new()
        .route("/api/articles", get(handlers::list_articles))
        .route("/api/articles/search", get(handlers::search_articles))
        .route("/api/articles/category/:category", get(handlers::articles_by_category))
        .route("/api/articles/source/:source", get(handlers::articles_by_source))
        .route("/api/articles/:id", get(handlers::get_article))
        .route("/api/clusters", get(handlers::list_clusters))
        .route("/api/refresh", post(handlers::refresh))
        .layer(cors)
        .with_state(Arc::new(state))
}

/// Binds `addr` and serves the API until the process is stopped.
pub async fn serve(state: AppState, addr: SocketAddr) -> nb_core::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, "serving news API");
    axum::serve(listener, create_app(state)).await?;
    Ok(())
}

pub mod prelude {
    pub use crate::{create_app, serve, AppState};
    pub use nb_core::{Article, Error, Result, StoryCluster};
}
