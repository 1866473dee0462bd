//! CSV data-quality analysis.
//!
//! [`analyzer`] scans a CSV file in fixed-size row chunks, counting rows that
//! contain missing data and per-column duplicate values, reporting progress
//! through a caller-supplied callback. [`memory`] samples the resident set
//! size of the current process on a dedicated thread so peak usage during an
//! analysis can be reported.
//!
//! The analyzer is synchronous by design: callers run it on a blocking worker
//! thread and bridge progress back to their async world in the callback.

pub mod analyzer;
pub mod memory;

pub use analyzer::{
    analyze_csv, estimate_data_rows, is_null_like, AnalyzeProgress, AnalyzerError, CsvReport,
    DEFAULT_CHUNK_SIZE,
};
pub use memory::MemorySampler;
