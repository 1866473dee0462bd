//! Streaming upload endpoint.
//!
//! Validation happens before the stream opens, so a wrong extension or an
//! oversize payload is a plain 400. Once validation passes, the response is
//! an SSE stream fed by the upload pipeline; every later failure travels as
//! an `error` event inside the stream, never as a thrown error.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Multipart, Query, State},
    response::Response,
};
use serde::Deserialize;

use crate::error::{ErrorResponse, HttpAppError};
use crate::handlers::read_multipart_upload;
use crate::pipeline::UploadPipeline;
use crate::sse::event_stream_response;
use crate::state::AppState;
use crate::validation::{validate_extension, validate_size};

const DEFAULT_UPDATE_INTERVAL_SECS: f64 = 0.5;
const MIN_UPDATE_INTERVAL_SECS: f64 = 0.1;
const MAX_UPDATE_INTERVAL_SECS: f64 = 5.0;

#[derive(Debug, Deserialize)]
pub struct UploadSseQuery {
    /// Advisory coalescing window in seconds for analyzer progress events.
    pub update_interval: Option<f64>,
}

#[utoipa::path(
    post,
    path = "/api/files/upload-sse",
    tag = "files",
    params(
        ("update_interval" = Option<f64>, Query, description = "Update interval in seconds (0.1 to 5.0, default 0.5)")
    ),
    request_body(content = inline(Object), content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "SSE stream of upload and analysis progress events"),
        (status = 400, description = "Invalid file or parameters", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, multipart), fields(operation = "upload_file_sse"))]
pub async fn upload_file_sse(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UploadSseQuery>,
    mut multipart: Multipart,
) -> Result<Response, HttpAppError> {
    let upload = read_multipart_upload(&mut multipart).await?;

    tracing::info!(
        original_filename = %upload.original_filename,
        content_type = %upload.content_type,
        file_size = upload.data.len(),
        "Received streaming upload request"
    );

    validate_extension(&upload.original_filename)?;
    validate_size(upload.data.len(), state.config.max_file_size_bytes)?;

    let update_interval = Duration::from_secs_f64(
        query
            .update_interval
            .unwrap_or(DEFAULT_UPDATE_INTERVAL_SECS)
            .clamp(MIN_UPDATE_INTERVAL_SECS, MAX_UPDATE_INTERVAL_SECS),
    );

    let rx = UploadPipeline::spawn(&state, upload, update_interval);
    Ok(event_stream_response(rx))
}
