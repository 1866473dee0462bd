//! SSE serialization of upload events.
//!
//! Consumes the event bus and emits one `data: <json>\n\n` frame per event.
//! The response ends cleanly when the bus closes; if the client disconnects
//! first, dropping the receiver makes the pipeline's next publish fail,
//! which cancels the analyzer.

use axum::{
    http::{header, HeaderValue},
    response::{
        sse::{Event, Sse},
        IntoResponse, Response,
    },
};
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::events::UploadEvent;

/// Build the `text/event-stream` response for one upload's event bus.
pub fn event_stream_response(rx: mpsc::Receiver<UploadEvent>) -> Response {
    let stream = ReceiverStream::new(rx).map(|event| Event::default().json_data(&event));

    (
        [(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"))],
        Sse::new(stream),
    )
        .into_response()
}
