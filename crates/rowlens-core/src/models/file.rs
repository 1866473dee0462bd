use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A stored upload and its analysis metadata.
///
/// `id` is the dense numeric key; `file_reference` is the opaque identifier
/// exposed to clients for report URLs and never changes after insert. The
/// four analysis fields (`null_count`, `total_rows`, `total_columns`,
/// `analysis_time`) are either all null (not yet analyzed) or all set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: i64,
    pub original_filename: String,
    pub stored_filename: String,
    pub file_path: String,
    pub file_size: i64,
    pub content_type: String,
    pub file_reference: String,
    pub null_count: Option<i64>,
    pub total_rows: Option<i64>,
    pub total_columns: Option<i64>,
    pub duplicate_records: Option<HashMap<String, i64>>,
    pub analysis_time: Option<String>,
    pub memory_usage_mb: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FileRecord {
    /// Whether the analysis pass has completed and been persisted.
    pub fn is_analyzed(&self) -> bool {
        self.null_count.is_some()
            && self.total_rows.is_some()
            && self.total_columns.is_some()
            && self.analysis_time.is_some()
    }
}

/// Full record as returned by `GET /api/files/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FileResponse {
    pub id: i64,
    pub original_filename: String,
    pub stored_filename: String,
    pub file_path: String,
    pub file_size: i64,
    pub content_type: String,
    pub file_reference: String,
    pub null_count: Option<i64>,
    pub total_rows: Option<i64>,
    pub total_columns: Option<i64>,
    pub duplicate_records: Option<HashMap<String, i64>>,
    pub analysis_time: Option<String>,
    pub memory_usage_mb: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<FileRecord> for FileResponse {
    fn from(record: FileRecord) -> Self {
        FileResponse {
            id: record.id,
            original_filename: record.original_filename,
            stored_filename: record.stored_filename,
            file_path: record.file_path,
            file_size: record.file_size,
            content_type: record.content_type,
            file_reference: record.file_reference,
            null_count: record.null_count,
            total_rows: record.total_rows,
            total_columns: record.total_columns,
            duplicate_records: record.duplicate_records,
            analysis_time: record.analysis_time,
            memory_usage_mb: record.memory_usage_mb,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

/// Paginated file listing.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FileListResponse {
    pub files: Vec<FileResponse>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
}

/// Analysis report keyed by `file_reference`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FileReportResponse {
    pub file_id: i64,
    pub original_filename: String,
    pub file_size: i64,
    pub total_records: i64,
    pub total_columns: i64,
    pub null_records: i64,
    pub duplicate_records: HashMap<String, i64>,
    pub time_consumption: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_usage_mb: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// First rows of a stored CSV, with null-like cells rendered as JSON null.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PreviewResponse {
    pub file_id: i64,
    pub columns: Vec<String>,
    #[schema(value_type = Vec<Object>)]
    pub records: Vec<HashMap<String, serde_json::Value>>,
    pub total_rows: i64,
    pub preview_count: i64,
}

/// Response of the non-streaming upload endpoint.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UploadResponse {
    pub message: String,
    pub file_id: i64,
    pub original_filename: String,
    pub stored_filename: String,
    pub file_size: i64,
    pub file_path: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeleteResponse {
    pub message: String,
    pub file_id: i64,
    pub original_filename: String,
    pub stored_filename: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> FileRecord {
        let now = Utc::now();
        FileRecord {
            id: 1,
            original_filename: "data.csv".to_string(),
            stored_filename: "0123456789abcdef0123456789abcdef.csv".to_string(),
            file_path: "/tmp/uploads/0123456789abcdef0123456789abcdef.csv".to_string(),
            file_size: 42,
            content_type: "text/csv".to_string(),
            file_reference: "00000000-0000-4000-8000-000000000001".to_string(),
            null_count: None,
            total_rows: None,
            total_columns: None,
            duplicate_records: None,
            analysis_time: None,
            memory_usage_mb: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn fresh_record_is_not_analyzed() {
        assert!(!record().is_analyzed());
    }

    #[test]
    fn record_with_all_analysis_fields_is_analyzed() {
        let mut rec = record();
        rec.null_count = Some(2);
        rec.total_rows = Some(3);
        rec.total_columns = Some(2);
        rec.analysis_time = Some("0.12".to_string());
        assert!(rec.is_analyzed());
    }
}
