//! CSV preview: the first rows of a stored file as JSON records.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use axum::{
    extract::{Path as UrlPath, Query, State},
    Json,
};
use rowlens_analysis::is_null_like;
use rowlens_core::models::PreviewResponse;
use rowlens_core::AppError;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;

const DEFAULT_PREVIEW_LIMIT: i64 = 10;
const MAX_PREVIEW_LIMIT: i64 = 1000;

#[derive(Debug, Deserialize)]
pub struct PreviewQuery {
    pub limit: Option<i64>,
}

#[derive(Debug)]
struct CsvPreview {
    columns: Vec<String>,
    records: Vec<HashMap<String, Value>>,
    total_rows: i64,
}

fn map_preview_error(err: csv::Error) -> AppError {
    let message = err.to_string();
    match err.into_kind() {
        csv::ErrorKind::Io(io) => AppError::from(io),
        _ => AppError::Analyzer(format!("Failed to parse CSV: {}", message)),
    }
}

/// Read up to `limit` data rows, continuing to the end of the file to get the
/// exact row count. Null-like cells come back as JSON null.
fn read_preview(path: &Path, limit: i64) -> Result<CsvPreview, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .from_path(path)
        .map_err(map_preview_error)?;

    let columns: Vec<String> = reader
        .headers()
        .map_err(map_preview_error)?
        .iter()
        .map(str::to_string)
        .collect();

    let mut records = Vec::new();
    let mut total_rows: i64 = 0;
    for result in reader.records() {
        let record = result.map_err(map_preview_error)?;
        total_rows += 1;
        if (records.len() as i64) < limit {
            let mut row = HashMap::with_capacity(columns.len());
            for (name, cell) in columns.iter().zip(record.iter()) {
                let value = if is_null_like(cell) {
                    Value::Null
                } else {
                    Value::String(cell.to_string())
                };
                row.insert(name.clone(), value);
            }
            records.push(row);
        }
    }

    Ok(CsvPreview {
        columns,
        records,
        total_rows,
    })
}

#[utoipa::path(
    get,
    path = "/api/files/{id}/preview",
    tag = "files",
    params(
        ("id" = i64, Path, description = "File ID"),
        ("limit" = Option<i64>, Query, description = "Number of rows to preview (1 to 1000, default 10)")
    ),
    responses(
        (status = 200, description = "First rows of the file", body = PreviewResponse),
        (status = 400, description = "Invalid limit or malformed CSV", body = ErrorResponse),
        (status = 404, description = "File not found", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state), fields(operation = "preview_file"))]
pub async fn preview_file(
    State(state): State<Arc<AppState>>,
    UrlPath(id): UrlPath<i64>,
    Query(query): Query<PreviewQuery>,
) -> Result<Json<PreviewResponse>, HttpAppError> {
    let limit = query.limit.unwrap_or(DEFAULT_PREVIEW_LIMIT);
    if !(1..=MAX_PREVIEW_LIMIT).contains(&limit) {
        return Err(AppError::InvalidInput(format!(
            "limit must be between 1 and {}",
            MAX_PREVIEW_LIMIT
        ))
        .into());
    }

    let record = state
        .files
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("File with ID {} not found", id)))?;

    let path = record.file_path.clone();
    let preview = tokio::task::spawn_blocking(move || read_preview(Path::new(&path), limit))
        .await
        .map_err(|e| AppError::Internal(format!("preview worker failed: {}", e)))??;

    let preview_count = preview.records.len() as i64;
    Ok(Json(PreviewResponse {
        file_id: record.id,
        columns: preview.columns,
        records: preview.records,
        total_rows: preview.total_rows,
        preview_count,
    }))
}
