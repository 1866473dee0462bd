//! Analysis report lookup by file reference.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use rowlens_core::models::FileReportResponse;
use rowlens_core::AppError;

use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/api/files/reference/{file_reference}/report",
    tag = "files",
    params(("file_reference" = String, Path, description = "Opaque file reference")),
    responses(
        (status = 200, description = "Analysis report", body = FileReportResponse),
        (status = 400, description = "File has not been analyzed yet", body = ErrorResponse),
        (status = 404, description = "File not found", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state), fields(operation = "get_file_report"))]
pub async fn get_file_report(
    State(state): State<Arc<AppState>>,
    Path(file_reference): Path<String>,
) -> Result<Json<FileReportResponse>, HttpAppError> {
    let record = state
        .files
        .get_by_reference(&file_reference)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "File with reference '{}' not found",
                file_reference
            ))
        })?;

    if !record.is_analyzed() {
        return Err(AppError::InvalidInput(
            "File has not been analyzed yet. Please upload the file with analysis enabled."
                .to_string(),
        )
        .into());
    }

    Ok(Json(FileReportResponse {
        file_id: record.id,
        original_filename: record.original_filename,
        file_size: record.file_size,
        total_records: record.total_rows.unwrap_or(0),
        total_columns: record.total_columns.unwrap_or(0),
        null_records: record.null_count.unwrap_or(0),
        duplicate_records: record.duplicate_records.unwrap_or_default(),
        time_consumption: record.analysis_time.unwrap_or_default(),
        memory_usage_mb: record.memory_usage_mb,
        created_at: record.created_at,
    }))
}
