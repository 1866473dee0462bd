use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rowlens_core::models::FileRecord;
use rowlens_core::AppError;
use sqlx::SqlitePool;
use uuid::Uuid;

const SELECT_COLUMNS: &str = "id, original_filename, stored_filename, file_path, file_size, \
     content_type, file_reference, null_count, total_rows, total_columns, duplicate_records, \
     analysis_time, memory_usage_mb, created_at, updated_at";

/// Raw database row; `duplicate_records` stays JSON text until conversion.
#[derive(Debug, sqlx::FromRow)]
struct FileRow {
    id: i64,
    original_filename: String,
    stored_filename: String,
    file_path: String,
    file_size: i64,
    content_type: String,
    file_reference: String,
    null_count: Option<i64>,
    total_rows: Option<i64>,
    total_columns: Option<i64>,
    duplicate_records: Option<String>,
    analysis_time: Option<String>,
    memory_usage_mb: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl FileRow {
    fn duplicate_records_parsed(&self) -> Option<HashMap<String, i64>> {
        let raw = self.duplicate_records.as_deref()?;
        match serde_json::from_str(raw) {
            Ok(map) => Some(map),
            Err(e) => {
                tracing::warn!(file_id = self.id, error = %e, "Malformed duplicate_records JSON");
                None
            }
        }
    }

    fn into_record(self) -> FileRecord {
        let duplicate_records = self.duplicate_records_parsed();
        FileRecord {
            id: self.id,
            original_filename: self.original_filename,
            stored_filename: self.stored_filename,
            file_path: self.file_path,
            file_size: self.file_size,
            content_type: self.content_type,
            file_reference: self.file_reference,
            null_count: self.null_count,
            total_rows: self.total_rows,
            total_columns: self.total_columns,
            duplicate_records,
            analysis_time: self.analysis_time,
            memory_usage_mb: self.memory_usage_mb,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Draft of a new file record; the repository assigns `id`,
/// `file_reference`, and timestamps.
#[derive(Debug, Clone)]
pub struct NewFile {
    pub original_filename: String,
    pub stored_filename: String,
    pub file_path: String,
    pub file_size: i64,
    pub content_type: String,
}

/// Analysis results to persist after a successful scan.
#[derive(Debug, Clone)]
pub struct AnalysisUpdate {
    pub null_count: i64,
    pub total_rows: i64,
    pub total_columns: i64,
    pub duplicate_records: HashMap<String, i64>,
    pub analysis_time: String,
    pub memory_usage_mb: Option<String>,
}

/// Repository for file metadata rows.
#[derive(Clone)]
pub struct FileRepository {
    pool: SqlitePool,
}

impl FileRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    #[tracing::instrument(skip(self, draft), fields(db.table = "files", db.operation = "insert"))]
    pub async fn insert(&self, draft: NewFile) -> Result<FileRecord, AppError> {
        let file_reference = Uuid::new_v4().to_string();
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;
        let row = sqlx::query_as::<_, FileRow>(&format!(
            r#"
            INSERT INTO files
                (original_filename, stored_filename, file_path, file_size, content_type,
                 file_reference, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            RETURNING {}
            "#,
            SELECT_COLUMNS
        ))
        .bind(&draft.original_filename)
        .bind(&draft.stored_filename)
        .bind(&draft.file_path)
        .bind(draft.file_size)
        .bind(&draft.content_type)
        .bind(&file_reference)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        tracing::info!(
            file_id = row.id,
            file_reference = %row.file_reference,
            "File metadata stored"
        );
        Ok(row.into_record())
    }

    #[tracing::instrument(skip(self, update), fields(db.table = "files", db.operation = "update", db.record_id = id))]
    pub async fn update_analysis(&self, id: i64, update: AnalysisUpdate) -> Result<(), AppError> {
        let duplicate_records = serde_json::to_string(&update.duplicate_records)?;
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            r#"
            UPDATE files
            SET null_count = ?1,
                total_rows = ?2,
                total_columns = ?3,
                duplicate_records = ?4,
                analysis_time = ?5,
                memory_usage_mb = ?6,
                updated_at = ?7
            WHERE id = ?8
            "#,
        )
        .bind(update.null_count)
        .bind(update.total_rows)
        .bind(update.total_columns)
        .bind(&duplicate_records)
        .bind(&update.analysis_time)
        .bind(&update.memory_usage_mb)
        .bind(now)
        .bind(id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("File with ID {} not found", id)));
        }
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "files", db.operation = "select", db.record_id = id))]
    pub async fn get_by_id(&self, id: i64) -> Result<Option<FileRecord>, AppError> {
        let row = sqlx::query_as::<_, FileRow>(&format!(
            "SELECT {} FROM files WHERE id = ?1",
            SELECT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(FileRow::into_record))
    }

    #[tracing::instrument(skip(self), fields(db.table = "files", db.operation = "select"))]
    pub async fn get_by_reference(&self, reference: &str) -> Result<Option<FileRecord>, AppError> {
        let row = sqlx::query_as::<_, FileRow>(&format!(
            "SELECT {} FROM files WHERE file_reference = ?1",
            SELECT_COLUMNS
        ))
        .bind(reference)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(FileRow::into_record))
    }

    /// Page through files, optionally filtering on a case-insensitive
    /// substring of the original filename. Returns the page and the total
    /// match count.
    #[tracing::instrument(skip(self), fields(db.table = "files", db.operation = "select"))]
    pub async fn list(
        &self,
        page: i64,
        limit: i64,
        search: &str,
    ) -> Result<(Vec<FileRecord>, i64), AppError> {
        let offset = (page - 1) * limit;
        let pattern = format!("%{}%", search);

        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM files WHERE original_filename LIKE ?1")
                .bind(&pattern)
                .fetch_one(&self.pool)
                .await?;

        let rows = sqlx::query_as::<_, FileRow>(&format!(
            "SELECT {} FROM files WHERE original_filename LIKE ?1 ORDER BY id LIMIT ?2 OFFSET ?3",
            SELECT_COLUMNS
        ))
        .bind(&pattern)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok((rows.into_iter().map(FileRow::into_record).collect(), total))
    }

    /// Delete the row and return it so the caller can unlink the backing
    /// file. Row deletion commits before any filesystem work happens.
    #[tracing::instrument(skip(self), fields(db.table = "files", db.operation = "delete", db.record_id = id))]
    pub async fn delete(&self, id: i64) -> Result<Option<FileRecord>, AppError> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query_as::<_, FileRow>(&format!(
            "SELECT {} FROM files WHERE id = ?1",
            SELECT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        sqlx::query("DELETE FROM files WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(Some(row.into_record()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_repo() -> FileRepository {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::init_schema(&pool).await.unwrap();
        FileRepository::new(pool)
    }

    fn draft(name: &str, stored: &str) -> NewFile {
        NewFile {
            original_filename: name.to_string(),
            stored_filename: stored.to_string(),
            file_path: format!("/tmp/uploads/{}", stored),
            file_size: 128,
            content_type: "text/csv".to_string(),
        }
    }

    fn analysis() -> AnalysisUpdate {
        let mut duplicate_records = HashMap::new();
        duplicate_records.insert("email".to_string(), 3);
        AnalysisUpdate {
            null_count: 2,
            total_rows: 10,
            total_columns: 4,
            duplicate_records,
            analysis_time: "0.42".to_string(),
            memory_usage_mb: Some("51.20".to_string()),
        }
    }

    #[tokio::test]
    async fn insert_assigns_id_reference_and_timestamps() {
        let repo = test_repo().await;
        let record = repo.insert(draft("data.csv", "aa.csv")).await.unwrap();

        assert!(record.id >= 1);
        assert_eq!(record.original_filename, "data.csv");
        assert!(Uuid::parse_str(&record.file_reference).is_ok());
        assert!(record.updated_at >= record.created_at);
        assert!(!record.is_analyzed());
        assert!(record.duplicate_records.is_none());
    }

    #[tokio::test]
    async fn stored_filename_must_be_unique() {
        let repo = test_repo().await;
        repo.insert(draft("a.csv", "same.csv")).await.unwrap();
        let err = repo.insert(draft("b.csv", "same.csv")).await.unwrap_err();
        assert!(matches!(err, AppError::Database(_)));
    }

    #[tokio::test]
    async fn references_are_distinct_across_inserts() {
        let repo = test_repo().await;
        let a = repo.insert(draft("a.csv", "a.csv")).await.unwrap();
        let b = repo.insert(draft("b.csv", "b.csv")).await.unwrap();
        assert_ne!(a.file_reference, b.file_reference);
        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    async fn update_analysis_sets_all_fields_consistently() {
        let repo = test_repo().await;
        let record = repo.insert(draft("data.csv", "aa.csv")).await.unwrap();

        repo.update_analysis(record.id, analysis()).await.unwrap();

        let updated = repo.get_by_id(record.id).await.unwrap().unwrap();
        assert!(updated.is_analyzed());
        assert_eq!(updated.null_count, Some(2));
        assert_eq!(updated.total_rows, Some(10));
        assert_eq!(updated.total_columns, Some(4));
        assert!(updated.null_count.unwrap() <= updated.total_rows.unwrap());
        assert_eq!(
            updated.duplicate_records.as_ref().unwrap().get("email"),
            Some(&3)
        );
        assert!(updated.analysis_time.unwrap().parse::<f64>().unwrap() >= 0.0);
        assert!(updated.updated_at >= updated.created_at);
    }

    #[tokio::test]
    async fn update_analysis_on_missing_row_is_not_found() {
        let repo = test_repo().await;
        let err = repo.update_analysis(999, analysis()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn get_by_reference_roundtrip() {
        let repo = test_repo().await;
        let record = repo.insert(draft("data.csv", "aa.csv")).await.unwrap();

        let fetched = repo
            .get_by_reference(&record.file_reference)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.id, record.id);

        assert!(repo.get_by_reference("no-such-ref").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_paginates_and_searches_case_insensitively() {
        let repo = test_repo().await;
        for i in 0..5 {
            repo.insert(draft(&format!("Sales-{}.csv", i), &format!("s{}.csv", i)))
                .await
                .unwrap();
        }
        repo.insert(draft("inventory.csv", "inv.csv")).await.unwrap();

        let (page1, total) = repo.list(1, 2, "").await.unwrap();
        assert_eq!(total, 6);
        assert_eq!(page1.len(), 2);

        let (page3, _) = repo.list(3, 2, "").await.unwrap();
        assert_eq!(page3.len(), 2);
        assert!(page1[0].id < page3[0].id);

        let (matches, total) = repo.list(1, 10, "sales").await.unwrap();
        assert_eq!(total, 5);
        assert!(matches
            .iter()
            .all(|f| f.original_filename.starts_with("Sales-")));
    }

    #[tokio::test]
    async fn delete_returns_row_and_removes_it() {
        let repo = test_repo().await;
        let record = repo.insert(draft("data.csv", "aa.csv")).await.unwrap();

        let deleted = repo.delete(record.id).await.unwrap().unwrap();
        assert_eq!(deleted.id, record.id);
        assert!(repo.get_by_id(record.id).await.unwrap().is_none());

        assert!(repo.delete(record.id).await.unwrap().is_none());
    }
}
