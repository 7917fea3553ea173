pub mod health;

use anyhow::{Context, Result};
use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::artifacts::handlers as downloads;
use crate::pipeline::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/generate-pdf", post(handlers::handle_generate_pdf))
        .route("/api/export-json", post(handlers::handle_export_json))
        .route("/download-pdf/:id", get(downloads::handle_download_pdf))
        .route("/download-json/:id", get(downloads::handle_download_json))
        .with_state(state)
}

/// CORS restricted to the configured origins.
pub fn cors_layer(allowed_origins: &[String]) -> Result<CorsLayer> {
    let origins = allowed_origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin)
                .with_context(|| format!("ALLOWED_ORIGINS entry '{origin}' is not a valid origin"))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::ORIGIN, header::CONTENT_TYPE, header::ACCEPT]))
}
