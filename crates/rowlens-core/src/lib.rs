//! Core types shared across the rowlens workspace: configuration, the
//! unified error taxonomy, and the domain models exposed over HTTP.

pub mod config;
pub mod error;
pub mod models;

pub use config::Config;
pub use error::{AppError, ErrorMetadata, LogLevel};
