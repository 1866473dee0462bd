//! OpenAPI document.

use rowlens_core::models::{
    DeleteResponse, FileListResponse, FileReportResponse, FileResponse, PreviewResponse,
    UploadResponse,
};
use utoipa::OpenApi;

use crate::error::ErrorResponse;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::upload_sse::upload_file_sse,
        crate::handlers::upload::upload_file,
        crate::handlers::files::list_files,
        crate::handlers::files::get_file_by_id,
        crate::handlers::files::delete_file,
        crate::handlers::report::get_file_report,
        crate::handlers::preview::preview_file,
    ),
    components(schemas(
        FileResponse,
        FileListResponse,
        FileReportResponse,
        PreviewResponse,
        UploadResponse,
        DeleteResponse,
        ErrorResponse,
    )),
    tags(
        (name = "files", description = "CSV upload, analysis, and retrieval")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_document_lists_all_file_routes() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();
        assert!(paths.iter().any(|p| p.as_str() == "/api/files/upload-sse"));
        assert!(paths.iter().any(|p| p.as_str() == "/api/files/upload"));
        assert!(paths.iter().any(|p| p.as_str() == "/api/files/{id}/preview"));
        assert!(paths
            .iter()
            .any(|p| p.as_str() == "/api/files/reference/{file_reference}/report"));
    }
}
