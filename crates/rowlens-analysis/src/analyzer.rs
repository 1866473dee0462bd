//! Chunked CSV scan for null rows and per-column duplicate counts.
//!
//! A row is a null row when any of its cells is missing data: empty, or one
//! of a fixed set of string sentinels after trimming surrounding whitespace
//! and ignoring case. Duplicate accounting compares the raw cell token as it
//! appears in the file (no trimming, no case folding); cells that are
//! null-like never participate in duplicate keys.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Rows scanned per chunk before a progress callback fires.
pub const DEFAULT_CHUNK_SIZE: usize = 100_000;

/// String forms treated as missing data. Closed set; matching is done on the
/// trimmed, case-insensitive cell.
const NULL_LIKE: [&str; 7] = ["", "null", "none", "undefined", "nan", "n/a", "na"];

/// Whether a raw cell should be classified as missing data.
pub fn is_null_like(cell: &str) -> bool {
    let trimmed = cell.trim();
    NULL_LIKE.iter().any(|s| trimmed.eq_ignore_ascii_case(s))
}

#[derive(Debug, thiserror::Error)]
pub enum AnalyzerError {
    /// Malformed CSV (unterminated quote, inconsistent column count).
    /// `row` is the 1-based data-row number of the offending record.
    #[error("malformed CSV at data row {row}: {message}")]
    Parse { row: u64, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The progress callback requested a stop between chunks.
    #[error("analysis cancelled")]
    Cancelled,
}

/// Final analysis result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvReport {
    /// Number of data rows containing at least one null-like cell.
    pub null_rows: u64,
    /// Number of data rows (header excluded).
    pub total_rows: u64,
    /// Number of columns established by the header.
    pub total_columns: usize,
    /// Per column: how many values are a non-first occurrence. Columns
    /// without duplicates are omitted.
    pub duplicate_counts: HashMap<String, u64>,
}

/// Progress notifications, issued in chunk order.
#[derive(Debug)]
pub enum AnalyzeProgress<'a> {
    /// File is about to be opened.
    Started,
    /// Header parsed; `estimated_rows` comes from a newline count and may be
    /// off for quoted multi-line fields, the final totals never are.
    Loaded {
        estimated_rows: u64,
        total_columns: usize,
    },
    /// A chunk finished scanning. Counts are running totals.
    Chunk {
        rows_processed: u64,
        estimated_rows: u64,
        null_rows: u64,
        duplicate_counts: &'a HashMap<String, u64>,
    },
    /// Scan complete; the same report is returned from [`analyze_csv`].
    Finished { report: &'a CsvReport },
}

/// Fast data-row estimate: newline count minus the header line. Used only as
/// a progress denominator.
pub fn estimate_data_rows(path: &Path) -> std::io::Result<u64> {
    let mut file = File::open(path)?;
    let mut buf = [0u8; 64 * 1024];
    let mut newlines: u64 = 0;
    let mut last_byte: u8 = b'\n';
    let mut total: u64 = 0;
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        newlines += buf[..n].iter().filter(|&&b| b == b'\n').count() as u64;
        last_byte = buf[n - 1];
        total += n as u64;
    }
    let mut lines = newlines;
    if total > 0 && last_byte != b'\n' {
        lines += 1;
    }
    Ok(lines.saturating_sub(1))
}

fn map_csv_error(err: csv::Error, row: u64) -> AnalyzerError {
    let message = err.to_string();
    match err.into_kind() {
        csv::ErrorKind::Io(io) => AnalyzerError::Io(io),
        _ => AnalyzerError::Parse { row, message },
    }
}

/// Scan `path` in chunks of `chunk_size` rows.
///
/// `progress` is invoked once at start, once after the header, once per chunk
/// (including the final partial chunk), and once with the finished report.
/// Returning `false` from the callback stops the scan with
/// [`AnalyzerError::Cancelled`] at the next chunk boundary.
pub fn analyze_csv(
    path: &Path,
    chunk_size: usize,
    progress: &mut dyn FnMut(AnalyzeProgress<'_>) -> bool,
) -> Result<CsvReport, AnalyzerError> {
    let chunk_size = chunk_size.max(1);

    if !progress(AnalyzeProgress::Started) {
        return Err(AnalyzerError::Cancelled);
    }

    let estimated_rows = estimate_data_rows(path)?;

    let mut reader = csv::ReaderBuilder::new()
        .from_path(path)
        .map_err(|e| map_csv_error(e, 1))?;

    let headers = reader.headers().map_err(|e| map_csv_error(e, 1))?.clone();
    if headers.is_empty() {
        return Err(AnalyzerError::Parse {
            row: 1,
            message: "CSV file is empty".to_string(),
        });
    }
    let columns: Vec<String> = headers.iter().map(str::to_string).collect();
    let total_columns = columns.len();

    tracing::debug!(
        total_columns,
        estimated_rows,
        path = %path.display(),
        "CSV header parsed"
    );

    if !progress(AnalyzeProgress::Loaded {
        estimated_rows,
        total_columns,
    }) {
        return Err(AnalyzerError::Cancelled);
    }

    let mut value_counts: Vec<HashMap<String, u64>> = vec![HashMap::new(); total_columns];
    let mut running_duplicates: HashMap<String, u64> = HashMap::new();
    let mut total_rows: u64 = 0;
    let mut null_rows: u64 = 0;
    let mut rows_in_chunk: usize = 0;

    for result in reader.records() {
        let record = result.map_err(|e| map_csv_error(e, total_rows + 1))?;

        if record.iter().any(is_null_like) {
            null_rows += 1;
        }

        for (idx, cell) in record.iter().enumerate().take(total_columns) {
            if !is_null_like(cell) {
                *value_counts[idx].entry(cell.to_string()).or_insert(0) += 1;
            }
        }

        total_rows += 1;
        rows_in_chunk += 1;

        if rows_in_chunk == chunk_size {
            rows_in_chunk = 0;
            collect_duplicates(&columns, &value_counts, &mut running_duplicates);
            if !progress(AnalyzeProgress::Chunk {
                rows_processed: total_rows,
                estimated_rows,
                null_rows,
                duplicate_counts: &running_duplicates,
            }) {
                return Err(AnalyzerError::Cancelled);
            }
        }
    }

    if rows_in_chunk > 0 {
        collect_duplicates(&columns, &value_counts, &mut running_duplicates);
        if !progress(AnalyzeProgress::Chunk {
            rows_processed: total_rows,
            estimated_rows,
            null_rows,
            duplicate_counts: &running_duplicates,
        }) {
            return Err(AnalyzerError::Cancelled);
        }
    }

    collect_duplicates(&columns, &value_counts, &mut running_duplicates);
    let report = CsvReport {
        null_rows,
        total_rows,
        total_columns,
        duplicate_counts: running_duplicates,
    };

    tracing::info!(
        null_rows = report.null_rows,
        total_rows = report.total_rows,
        total_columns = report.total_columns,
        duplicate_columns = report.duplicate_counts.len(),
        "CSV analysis complete"
    );

    progress(AnalyzeProgress::Finished { report: &report });
    Ok(report)
}

/// A column's duplicate count is the number of non-first occurrences across
/// all its values: the sum of `count - 1` over values seen more than once.
fn collect_duplicates(
    columns: &[String],
    value_counts: &[HashMap<String, u64>],
    out: &mut HashMap<String, u64>,
) {
    out.clear();
    for (name, counts) in columns.iter().zip(value_counts) {
        let duplicates: u64 = counts
            .values()
            .filter(|&&count| count >= 2)
            .map(|&count| count - 1)
            .sum();
        if duplicates > 0 {
            out.insert(name.clone(), duplicates);
        }
    }
}
