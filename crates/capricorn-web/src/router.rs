//! Axum router: maps URL paths to handlers.

use std::sync::Arc;

use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::handlers::{
    abstracts::retrieve_abstracts,
    analysis::final_analysis,
    articles::stream_articles,
    extract::extract_case_info,
    health::health,
};
use crate::state::{AppState, SharedState};

/// Build and return the full Axum router.
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.server.allowed_origins);
    let shared: SharedState = Arc::new(state);

    Router::new()
        .route("/health", get(health))
        .route("/api/articles/stream", post(stream_articles))
        .route("/api/analysis", post(final_analysis))
        .route("/api/abstracts", post(retrieve_abstracts))
        .route("/api/extract", post(extract_case_info))
        // Middleware
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(shared)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    let allow_origin = if origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}
