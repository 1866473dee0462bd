//! Upload validation.
//!
//! Both rejections happen before any filesystem or database mutation, so
//! they can be returned as plain HTTP 400 responses; the SSE stream only
//! begins once these checks pass.

use std::path::Path;

use rowlens_core::AppError;

/// Accept filenames with a case-insensitive `.csv` suffix.
pub fn validate_extension(filename: &str) -> Result<(), AppError> {
    if filename.is_empty() {
        return Err(AppError::InvalidInput("Filename is required".to_string()));
    }

    let extension = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());

    match extension.as_deref() {
        Some("csv") => Ok(()),
        Some(other) => Err(AppError::InvalidInput(format!(
            "Only CSV files are allowed. Received: .{}",
            other
        ))),
        None => Err(AppError::InvalidInput(
            "Only CSV files are allowed. Received: no extension".to_string(),
        )),
    }
}

/// Check the buffered byte length against the configured maximum.
pub fn validate_size(file_size: usize, max_file_size: usize) -> Result<(), AppError> {
    if file_size > max_file_size {
        return Err(AppError::PayloadTooLarge("File too large".to_string()));
    }
    Ok(())
}
