//! Route configuration and setup

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::api_doc::ApiDoc;
use crate::handlers;
use crate::state::AppState;

/// Build the application router with all middleware applied.
pub fn build_router(state: Arc<AppState>) -> Result<Router, anyhow::Error> {
    let cors = setup_cors(&state)?;

    // The body limit sits above MAX_FILE_SIZE so oversize uploads reach the
    // size check and get the contract's 400 response instead of a generic
    // 413 from the extractor.
    let body_limit = state.config.max_file_size_bytes.saturating_mul(4);

    let router = Router::new()
        .route("/api/files/upload-sse", post(handlers::upload_sse::upload_file_sse))
        .route("/api/files/upload", post(handlers::upload::upload_file))
        .route("/api/files/", get(handlers::files::list_files))
        .route(
            "/api/files/:id",
            get(handlers::files::get_file_by_id).delete(handlers::files::delete_file),
        )
        .route("/api/files/:id/preview", get(handlers::preview::preview_file))
        .route(
            "/api/files/reference/:file_reference/report",
            get(handlers::report::get_file_report),
        )
        .route(
            "/api/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    Ok(router)
}

/// Setup CORS configuration
fn setup_cors(state: &AppState) -> Result<CorsLayer, anyhow::Error> {
    let origins = &state.config.allowed_origins;

    let cors = if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .map(|origin| {
                origin
                    .parse::<HeaderValue>()
                    .map_err(|_| anyhow::anyhow!("Invalid CORS origin: {}", origin))
            })
            .collect::<Result<_, _>>()?;
        CorsLayer::new()
            .allow_origin(parsed)
            .allow_methods(Any)
            .allow_headers(Any)
    };

    Ok(cors)
}
