//! Upload pipeline orchestration.
//!
//! One pipeline task per streaming upload. The task walks the upload phases
//! (persist, record, analyze, finalize), publishing a progress event at each
//! checkpoint onto the upload's event bus. CPU-bound CSV scanning runs on a
//! blocking worker thread; its progress callback publishes into the same bus,
//! so a slow SSE client throttles the analyzer through the bounded channel.
//! A dedicated sampler thread tracks peak process RSS for the duration of
//! the analysis.
//!
//! Failure handling follows the write-ahead order of the phases: a failed
//! metadata insert rolls back the stored file, a failed analysis leaves the
//! record with null analysis fields, and a failed analysis-result update is
//! logged while completion is still reported from in-memory values. A client
//! disconnect surfaces as a failed publish and cancels the analyzer at the
//! next chunk boundary.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use rowlens_analysis::{
    analyze_csv, AnalyzeProgress, AnalyzerError, CsvReport, MemorySampler, DEFAULT_CHUNK_SIZE,
};
use rowlens_core::models::FileRecord;
use rowlens_db::{AnalysisUpdate, FileRepository, NewFile};
use rowlens_storage::{Storage, StoredFile};
use tokio::sync::mpsc;

use crate::events::{EventBus, EventStatus, UploadEvent};
use crate::state::AppState;

/// Multipart payload extracted before the stream begins.
#[derive(Debug, Clone)]
pub struct ReceivedUpload {
    pub original_filename: String,
    pub content_type: String,
    pub data: Bytes,
}

/// Progress carried by an error event raised during the analyze phase.
const ANALYSIS_ERROR_PROGRESS: f64 = 0.7;

/// Map chunk counts onto the analyzing progress band. The denominator is the
/// newline-count estimate, so the result is clamped to the band in case the
/// estimate was low.
fn chunk_progress(rows_processed: u64, estimated_rows: u64) -> f64 {
    let fraction = rows_processed as f64 / estimated_rows.max(1) as f64;
    (0.1 + 0.8 * fraction).clamp(0.1, 0.9)
}

fn to_duplicate_map(counts: &HashMap<String, u64>) -> HashMap<String, i64> {
    counts.iter().map(|(k, &v)| (k.clone(), v as i64)).collect()
}

pub struct UploadPipeline {
    files: FileRepository,
    storage: Arc<dyn Storage>,
    bus: EventBus,
    update_interval: Duration,
}

impl UploadPipeline {
    /// Spawn the pipeline task for one upload. The returned receiver is the
    /// consumer end of the event bus and feeds the SSE serializer; dropping
    /// it cancels the upload.
    pub fn spawn(
        state: &AppState,
        upload: ReceivedUpload,
        update_interval: Duration,
    ) -> mpsc::Receiver<UploadEvent> {
        let (bus, rx) = EventBus::channel();
        let pipeline = UploadPipeline {
            files: state.files.clone(),
            storage: Arc::clone(&state.storage),
            bus,
            update_interval,
        };
        tokio::spawn(async move {
            pipeline.run(upload).await;
        });
        rx
    }

    async fn run(self, upload: ReceivedUpload) {
        let started = Instant::now();

        tracing::info!(
            original_filename = %upload.original_filename,
            file_size = upload.data.len(),
            "Starting upload pipeline"
        );

        let upload_phases = [
            (0.0, "Validating file format and ensuring compatibility..."),
            (0.1, "File format verified. Reading uploaded content into memory..."),
            (0.2, "File content received. Validating size against configured limits..."),
            (0.3, "Generating secure unique identifier for file storage..."),
            (0.5, "Writing file to secure storage location on server..."),
        ];
        for (progress, message) in upload_phases {
            if !self.publish_uploading(progress, message).await {
                return;
            }
        }

        let stored = match self.storage.write(upload.data.to_vec(), ".csv").await {
            Ok(stored) => stored,
            Err(e) => {
                tracing::error!(error = %e, "Failed to persist uploaded file");
                self.emit_error(
                    0.5,
                    format!(
                        "Error occurred while saving file to disk: {}. Please try again or contact support if the issue persists.",
                        e
                    ),
                    None,
                )
                .await;
                return;
            }
        };

        if !self
            .publish_uploading(0.7, "Persisting file metadata and creating database records...")
            .await
        {
            // The client is gone and no record points at the file yet.
            self.rollback_stored_file(&stored).await;
            return;
        }

        let draft = NewFile {
            original_filename: upload.original_filename.clone(),
            stored_filename: stored.stored_filename.clone(),
            file_path: stored.path.to_string_lossy().into_owned(),
            file_size: upload.data.len() as i64,
            content_type: upload.content_type.clone(),
        };
        let record = match self.files.insert(draft).await {
            Ok(record) => record,
            Err(e) => {
                tracing::error!(error = %e, "Failed to store file metadata");
                self.rollback_stored_file(&stored).await;
                self.emit_error(
                    0.7,
                    format!(
                        "Database operation failed while storing file metadata: {}. The file has been removed from disk. Please try again.",
                        e
                    ),
                    None,
                )
                .await;
                return;
            }
        };

        let mut ev = UploadEvent::new(
            EventStatus::Uploading,
            0.9,
            "File metadata stored. Preparing data quality analysis...",
        );
        ev.file_id = Some(record.id);
        ev.file_reference = Some(record.file_reference.clone());
        if !self.bus.publish(ev).await {
            return;
        }

        let mut ev = UploadEvent::new(
            EventStatus::Uploading,
            1.0,
            "File upload completed successfully. Initiating comprehensive data quality analysis...",
        );
        ev.file_id = Some(record.id);
        ev.file_reference = Some(record.file_reference.clone());
        if !self.bus.publish(ev).await {
            return;
        }

        let sampler = MemorySampler::start();
        let analysis = Self::run_analysis(
            self.bus.clone(),
            record.id,
            record.file_reference.clone(),
            record.file_path.clone(),
            self.update_interval,
        )
        .await;
        let peak_mb = sampler.stop();

        match analysis {
            Err(AnalyzerError::Cancelled) => {
                tracing::debug!(file_id = record.id, "Client disconnected during analysis");
            }
            Err(e) => {
                tracing::warn!(file_id = record.id, error = %e, "CSV analysis failed");
                self.emit_error(
                    ANALYSIS_ERROR_PROGRESS,
                    format!(
                        "Data analysis encountered an error: {}. The file has been uploaded but analysis could not be completed. Please review the file format and try again.",
                        e
                    ),
                    Some(&record),
                )
                .await;
            }
            Ok(report) => {
                self.finalize(&record, upload, report, peak_mb, started).await;
            }
        }
    }

    /// Run the chunked scan on a blocking worker, bridging its progress
    /// callback onto the event bus. Non-terminal chunk events arriving
    /// within `update_interval` of the previous one are coalesced away.
    async fn run_analysis(
        bus: EventBus,
        file_id: i64,
        file_reference: String,
        file_path: String,
        update_interval: Duration,
    ) -> Result<CsvReport, AnalyzerError> {
        tokio::task::spawn_blocking(move || {
            let mut last_chunk_emit: Option<Instant> = None;

            let with_ids = |mut ev: UploadEvent| {
                ev.file_id = Some(file_id);
                ev.file_reference = Some(file_reference.clone());
                ev
            };

            analyze_csv(Path::new(&file_path), DEFAULT_CHUNK_SIZE, &mut |progress| {
                match progress {
                    AnalyzeProgress::Started => {
                        let ev = with_ids(UploadEvent::new(
                            EventStatus::Analyzing,
                            0.1,
                            "Reading and parsing CSV file structure...",
                        ));
                        bus.publish_blocking(ev)
                    }
                    AnalyzeProgress::Loaded {
                        estimated_rows,
                        total_columns,
                    } => {
                        let mut ev = with_ids(UploadEvent::new(
                            EventStatus::Analyzing,
                            0.2,
                            format!(
                                "CSV file successfully loaded. Beginning comprehensive analysis of {} rows across {} columns...",
                                estimated_rows, total_columns
                            ),
                        ));
                        ev.total_rows = Some(estimated_rows as i64);
                        ev.total_columns = Some(total_columns as i64);
                        bus.publish_blocking(ev)
                    }
                    AnalyzeProgress::Chunk {
                        rows_processed,
                        estimated_rows,
                        null_rows,
                        duplicate_counts,
                    } => {
                        if let Some(last) = last_chunk_emit {
                            if last.elapsed() < update_interval {
                                return true;
                            }
                        }
                        last_chunk_emit = Some(Instant::now());

                        let mut ev = with_ids(UploadEvent::new(
                            EventStatus::Analyzing,
                            chunk_progress(rows_processed, estimated_rows),
                            format!(
                                "Processing {} of {} rows. Found {} rows with null or undefined values so far...",
                                rows_processed, estimated_rows, null_rows
                            ),
                        ));
                        ev.null_count = null_rows as i64;
                        ev.processed_count = rows_processed as i64;
                        ev.total_rows = Some(estimated_rows as i64);
                        ev.duplicate_records = Some(to_duplicate_map(duplicate_counts));
                        bus.publish_blocking(ev)
                    }
                    AnalyzeProgress::Finished { report } => {
                        let mut ev = with_ids(UploadEvent::new(
                            EventStatus::Analyzing,
                            0.9,
                            format!(
                                "Data quality analysis completed successfully. Identified {} rows containing null or undefined values. Detected duplicate entries in {} column(s). Generating comprehensive report...",
                                report.null_rows,
                                report.duplicate_counts.len()
                            ),
                        ));
                        ev.null_count = report.null_rows as i64;
                        ev.processed_count = report.total_rows as i64;
                        ev.total_rows = Some(report.total_rows as i64);
                        ev.total_columns = Some(report.total_columns as i64);
                        ev.duplicate_records = Some(to_duplicate_map(&report.duplicate_counts));
                        bus.publish_blocking(ev)
                    }
                }
            })
        })
        .await
        .map_err(|e| {
            AnalyzerError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("analysis worker failed: {}", e),
            ))
        })?
    }

    /// Persist the analysis results and emit the completion event. An update
    /// failure is logged but does not fail the upload: the file is durable
    /// and the analysis succeeded, so completion carries in-memory values.
    async fn finalize(
        &self,
        record: &FileRecord,
        upload: ReceivedUpload,
        report: CsvReport,
        peak_mb: Option<f64>,
        started: Instant,
    ) {
        let duplicate_records = to_duplicate_map(&report.duplicate_counts);
        let elapsed = started.elapsed().as_secs_f64();
        let update = AnalysisUpdate {
            null_count: report.null_rows as i64,
            total_rows: report.total_rows as i64,
            total_columns: report.total_columns as i64,
            duplicate_records: duplicate_records.clone(),
            analysis_time: format!("{:.2}", elapsed),
            memory_usage_mb: peak_mb.map(|mb| format!("{:.2}", mb)),
        };

        if let Err(e) = self.files.update_analysis(record.id, update).await {
            tracing::warn!(file_id = record.id, error = %e, "Failed to persist analysis results");
        }

        tracing::info!(
            file_id = record.id,
            null_rows = report.null_rows,
            total_rows = report.total_rows,
            total_columns = report.total_columns,
            elapsed_secs = elapsed,
            peak_memory_mb = peak_mb,
            "Upload and analysis complete"
        );

        let mut ev = UploadEvent::new(
            EventStatus::Completed,
            1.0,
            "File upload and data quality analysis completed successfully. Your comprehensive report is ready for review.",
        );
        ev.file_id = Some(record.id);
        ev.file_reference = Some(record.file_reference.clone());
        ev.null_count = report.null_rows as i64;
        ev.processed_count = report.total_rows as i64;
        ev.total_rows = Some(report.total_rows as i64);
        ev.total_columns = Some(report.total_columns as i64);
        ev.duplicate_records = Some(duplicate_records);
        ev.original_filename = Some(upload.original_filename);
        ev.stored_filename = Some(record.stored_filename.clone());
        ev.file_size = Some(record.file_size);
        ev.file_path = Some(record.file_path.clone());
        ev.time_consumption = Some((elapsed * 100.0).round() / 100.0);
        self.bus.publish(ev).await;
    }

    async fn publish_uploading(&self, progress: f64, message: &str) -> bool {
        self.bus
            .publish(UploadEvent::new(EventStatus::Uploading, progress, message))
            .await
    }

    async fn emit_error(&self, progress: f64, message: String, record: Option<&FileRecord>) {
        let mut ev = UploadEvent::new(EventStatus::Error, progress, message);
        if let Some(record) = record {
            ev.file_id = Some(record.id);
            ev.file_reference = Some(record.file_reference.clone());
        }
        self.bus.publish(ev).await;
    }

    async fn rollback_stored_file(&self, stored: &StoredFile) {
        if let Err(e) = self.storage.delete(&stored.path).await {
            tracing::warn!(
                path = %stored.path.display(),
                error = %e,
                "Failed to remove stored file during rollback"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowlens_core::Config;
    use rowlens_db::FileRepository;
    use rowlens_storage::LocalStorage;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_state(tmp: &tempfile::TempDir) -> AppState {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        rowlens_db::init_schema(&pool).await.unwrap();
        let storage = LocalStorage::new(tmp.path().join("uploads")).await.unwrap();
        AppState {
            config: Config::default(),
            files: FileRepository::new(pool),
            storage: Arc::new(storage),
        }
    }

    fn upload(filename: &str, content: &str) -> ReceivedUpload {
        ReceivedUpload {
            original_filename: filename.to_string(),
            content_type: "text/csv".to_string(),
            data: Bytes::from(content.to_string().into_bytes()),
        }
    }

    async fn collect_events(mut rx: mpsc::Receiver<UploadEvent>) -> Vec<UploadEvent> {
        let mut events = Vec::new();
        while let Some(ev) = rx.recv().await {
            events.push(ev);
        }
        events
    }

    #[test]
    fn chunk_progress_spans_the_analyzing_band() {
        assert_eq!(chunk_progress(0, 0), 0.1);
        assert!((chunk_progress(5, 10) - 0.5).abs() < 1e-9);
        assert!((chunk_progress(10, 10) - 0.9).abs() < 1e-9);
        // A low estimate must not push progress past the band.
        assert!((chunk_progress(20, 10) - 0.9).abs() < 1e-9);
    }

    #[tokio::test]
    async fn happy_path_emits_ordered_events_and_persists_analysis() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(&tmp).await;

        let rx = UploadPipeline::spawn(
            &state,
            upload("people.csv", "a,b\n1,2\n3,\n,5\n"),
            Duration::from_millis(100),
        );
        let events = collect_events(rx).await;

        let first = events.first().unwrap();
        assert_eq!(first.status, EventStatus::Uploading);
        assert_eq!(first.progress, 0.0);

        let last = events.last().unwrap();
        assert_eq!(last.status, EventStatus::Completed);
        assert_eq!(last.progress, 1.0);
        assert_eq!(last.null_count, 2);
        assert_eq!(last.total_rows, Some(3));
        assert_eq!(last.total_columns, Some(2));
        assert_eq!(last.original_filename.as_deref(), Some("people.csv"));
        assert!(last.stored_filename.as_deref().unwrap().ends_with(".csv"));
        assert!(last.time_consumption.unwrap() >= 0.0);
        assert_eq!(last.duplicate_records.as_ref().unwrap().len(), 0);

        // Progress is non-decreasing within each status segment, and every
        // value carries at most two decimals.
        let mut last_seen: HashMap<EventStatus, f64> = HashMap::new();
        for ev in &events {
            let prev = last_seen.insert(ev.status, ev.progress).unwrap_or(0.0);
            assert!(ev.progress >= prev, "progress regressed within a status");
            assert!(((ev.progress * 100.0).round() - ev.progress * 100.0).abs() < 1e-9);
        }

        assert!(events.iter().any(|e| e.status == EventStatus::Analyzing));

        // The record was finalized in the store.
        let file_id = last.file_id.unwrap();
        let record = state.files.get_by_id(file_id).await.unwrap().unwrap();
        assert!(record.is_analyzed());
        assert_eq!(record.null_count, Some(2));
        assert_eq!(record.total_rows, Some(3));
    }

    #[tokio::test]
    async fn malformed_csv_ends_with_error_event_and_unanalyzed_record() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(&tmp).await;

        let rx = UploadPipeline::spawn(
            &state,
            upload("bad.csv", "a,b\n1,2\n1,2,3\n"),
            Duration::from_millis(100),
        );
        let events = collect_events(rx).await;

        let last = events.last().unwrap();
        assert_eq!(last.status, EventStatus::Error);
        assert!(last.message.contains("analysis"));

        // The file record survives the failed analysis with null analysis
        // fields and stays retrievable.
        let (files, total) = state.files.list(1, 10, "").await.unwrap();
        assert_eq!(total, 1);
        assert!(!files[0].is_analyzed());
    }

    #[tokio::test]
    async fn disconnect_before_persist_leaves_no_orphans() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(&tmp).await;

        let rx = UploadPipeline::spawn(
            &state,
            upload("gone.csv", "a\n1\n"),
            Duration::from_millis(100),
        );
        drop(rx);

        tokio::time::sleep(Duration::from_millis(200)).await;

        let (_, total) = state.files.list(1, 10, "").await.unwrap();
        assert_eq!(total, 0);

        let mut entries = tokio::fs::read_dir(tmp.path().join("uploads")).await.unwrap();
        assert!(entries.next_entry().await.unwrap().is_none());
    }
}
