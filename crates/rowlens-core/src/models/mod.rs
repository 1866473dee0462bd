//! Domain models and HTTP response schemas.

mod file;

pub use file::{
    DeleteResponse, FileListResponse, FileRecord, FileReportResponse, FileResponse,
    PreviewResponse, UploadResponse,
};
