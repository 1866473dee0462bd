//! Storage abstraction for uploaded files.
//!
//! The [`Storage`] trait covers exactly what the upload pipeline needs:
//! allocate a unique name and persist bytes, and delete a file again when a
//! later step fails or the record is removed. The only backend is the local
//! filesystem ([`LocalStorage`]); the trait keeps handlers and the pipeline
//! decoupled from it.

mod local;
mod traits;

pub use local::LocalStorage;
pub use traits::{Storage, StorageError, StorageResult, StoredFile};
