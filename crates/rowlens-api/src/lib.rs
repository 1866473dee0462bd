//! rowlens HTTP API.
//!
//! One axum application exposing CSV upload (streaming and plain), file
//! CRUD, analysis reports, and previews. The streaming upload pipeline in
//! [`pipeline`] is the interesting part: it coordinates storage, metadata,
//! the chunked analyzer, and a memory sampler, publishing lifecycle events
//! onto a bounded bus that [`sse`] serializes to the client.

pub mod api_doc;
pub mod error;
pub mod events;
pub mod handlers;
pub mod pipeline;
pub mod setup;
pub mod sse;
pub mod state;
pub mod telemetry;
pub mod validation;
