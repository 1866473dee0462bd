//! HTTP handlers.

pub mod files;
pub mod preview;
pub mod report;
pub mod upload;
pub mod upload_sse;

use axum::extract::Multipart;
use bytes::Bytes;
use rowlens_core::AppError;

use crate::pipeline::ReceivedUpload;

/// Pull the `file` field out of a multipart form. The whole field is
/// buffered; uploads are size-capped well below anything that would make
/// that a problem.
pub(crate) async fn read_multipart_upload(
    multipart: &mut Multipart,
) -> Result<ReceivedUpload, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidInput(format!("Invalid multipart form data: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let original_filename = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| AppError::InvalidInput("Filename is required".to_string()))?;
        let content_type = field
            .content_type()
            .map(str::to_string)
            .unwrap_or_else(|| "text/csv".to_string());
        let data: Bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::InvalidInput(format!("Failed to read file content: {}", e)))?;

        return Ok(ReceivedUpload {
            original_filename,
            content_type,
            data,
        });
    }

    Err(AppError::InvalidInput(
        "Multipart field 'file' is required".to_string(),
    ))
}
