//! Non-streaming upload endpoint: validate, persist, record. No analysis.

use std::sync::Arc;

use axum::{
    extract::{Multipart, State},
    Json,
};
use rowlens_core::models::UploadResponse;
use rowlens_db::NewFile;

use crate::error::{ErrorResponse, HttpAppError};
use crate::handlers::read_multipart_upload;
use crate::state::AppState;
use crate::validation::{validate_extension, validate_size};

#[utoipa::path(
    post,
    path = "/api/files/upload",
    tag = "files",
    request_body(content = inline(Object), content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "File uploaded successfully", body = UploadResponse),
        (status = 400, description = "Invalid file", body = ErrorResponse),
        (status = 500, description = "Storage or database failure", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, multipart), fields(operation = "upload_file"))]
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, HttpAppError> {
    let upload = read_multipart_upload(&mut multipart).await?;

    validate_extension(&upload.original_filename)?;
    validate_size(upload.data.len(), state.config.max_file_size_bytes)?;

    let stored = state.storage.write(upload.data.to_vec(), ".csv").await?;

    let draft = NewFile {
        original_filename: upload.original_filename.clone(),
        stored_filename: stored.stored_filename.clone(),
        file_path: stored.path.to_string_lossy().into_owned(),
        file_size: upload.data.len() as i64,
        content_type: upload.content_type.clone(),
    };

    let record = match state.files.insert(draft).await {
        Ok(record) => record,
        Err(e) => {
            // The insert failed, so nothing references the stored file.
            if let Err(cleanup_err) = state.storage.delete(&stored.path).await {
                tracing::warn!(
                    path = %stored.path.display(),
                    error = %cleanup_err,
                    "Failed to clean up stored file after database error"
                );
            }
            return Err(e.into());
        }
    };

    Ok(Json(UploadResponse {
        message: "File uploaded successfully".to_string(),
        file_id: record.id,
        original_filename: record.original_filename,
        stored_filename: record.stored_filename,
        file_size: record.file_size,
        file_path: record.file_path,
    }))
}
