//! File listing, retrieval, and deletion.

use std::path::Path;
use std::sync::Arc;

use axum::{
    extract::{Path as UrlPath, Query, State},
    Json,
};
use rowlens_core::models::{DeleteResponse, FileListResponse, FileResponse};
use rowlens_core::AppError;
use serde::Deserialize;

use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;

const DEFAULT_PAGE_SIZE: i64 = 10;
const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Deserialize)]
pub struct FileListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/files/",
    tag = "files",
    params(
        ("page" = Option<i64>, Query, description = "Page number (1-based)"),
        ("limit" = Option<i64>, Query, description = "Items per page (1 to 100)"),
        ("search" = Option<String>, Query, description = "Case-insensitive substring match on the original filename")
    ),
    responses(
        (status = 200, description = "Paginated file list", body = FileListResponse),
        (status = 400, description = "Invalid pagination parameters", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state), fields(operation = "list_files"))]
pub async fn list_files(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FileListQuery>,
) -> Result<Json<FileListResponse>, HttpAppError> {
    let page = query.page.unwrap_or(1);
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE);
    let search = query.search.unwrap_or_default();

    if page < 1 {
        return Err(AppError::InvalidInput("page must be >= 1".to_string()).into());
    }
    if !(1..=MAX_PAGE_SIZE).contains(&limit) {
        return Err(AppError::InvalidInput(format!(
            "limit must be between 1 and {}",
            MAX_PAGE_SIZE
        ))
        .into());
    }

    let (files, total) = state.files.list(page, limit, &search).await?;
    let total_pages = if total > 0 {
        (total + limit - 1) / limit
    } else {
        0
    };

    Ok(Json(FileListResponse {
        files: files.into_iter().map(FileResponse::from).collect(),
        total,
        page,
        limit,
        total_pages,
    }))
}

#[utoipa::path(
    get,
    path = "/api/files/{id}",
    tag = "files",
    params(("id" = i64, Path, description = "File ID")),
    responses(
        (status = 200, description = "Full file record", body = FileResponse),
        (status = 404, description = "File not found", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state), fields(operation = "get_file"))]
pub async fn get_file_by_id(
    State(state): State<Arc<AppState>>,
    UrlPath(id): UrlPath<i64>,
) -> Result<Json<FileResponse>, HttpAppError> {
    let record = state
        .files
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("File with ID {} not found", id)))?;

    Ok(Json(FileResponse::from(record)))
}

#[utoipa::path(
    delete,
    path = "/api/files/{id}",
    tag = "files",
    params(("id" = i64, Path, description = "File ID")),
    responses(
        (status = 200, description = "File deleted", body = DeleteResponse),
        (status = 404, description = "File not found", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state), fields(operation = "delete_file"))]
pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    UrlPath(id): UrlPath<i64>,
) -> Result<Json<DeleteResponse>, HttpAppError> {
    let record = state
        .files
        .delete(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("File with ID {} not found", id)))?;

    // Row deletion is committed; unlinking is best-effort. A crash or failure
    // here leaves an orphan file for an operator sweep, not a dangling record.
    if let Err(e) = state.storage.delete(Path::new(&record.file_path)).await {
        tracing::warn!(
            file_id = record.id,
            path = %record.file_path,
            error = %e,
            "Failed to unlink file after row deletion"
        );
    }

    Ok(Json(DeleteResponse {
        message: "File deleted successfully".to_string(),
        file_id: record.id,
        original_filename: record.original_filename,
        stored_filename: record.stored_filename,
    }))
}
