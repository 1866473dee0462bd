//! File metadata persistence.
//!
//! [`FileRepository`] is the only write path to the `files` table. Every
//! operation runs in its own transaction; `insert` and `update_analysis`
//! are durable before they return.

mod file;

pub use file::{AnalysisUpdate, FileRepository, NewFile};

use rowlens_core::AppError;
use sqlx::SqlitePool;

/// Create the `files` table and its indexes if they do not exist yet.
/// Applied at startup; the schema is additive-only.
pub async fn init_schema(pool: &SqlitePool) -> Result<(), AppError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS files (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            original_filename TEXT NOT NULL,
            stored_filename TEXT NOT NULL UNIQUE,
            file_path TEXT NOT NULL,
            file_size INTEGER NOT NULL,
            content_type TEXT NOT NULL,
            file_reference TEXT NOT NULL UNIQUE,
            null_count INTEGER,
            total_rows INTEGER,
            total_columns INTEGER,
            duplicate_records TEXT,
            analysis_time TEXT,
            memory_usage_mb TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_files_original_filename ON files (original_filename)")
        .execute(pool)
        .await?;

    Ok(())
}
