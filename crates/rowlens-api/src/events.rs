//! Upload lifecycle events and the per-upload event bus.
//!
//! Each upload owns one bounded FIFO channel from the pipeline (and the
//! analyzer callback) to the SSE serializer. The small capacity is the
//! backpressure mechanism: a slow client eventually blocks the publisher
//! instead of growing a buffer. The bus closes when the pipeline drops its
//! sender after the terminal event; publishing after the consumer is gone
//! reports disconnection instead of failing.

use std::collections::HashMap;

use serde::Serialize;
use tokio::sync::mpsc;

/// Bounded capacity of the event bus.
pub const EVENT_BUS_CAPACITY: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Uploading,
    Analyzing,
    Completed,
    Error,
}

/// One SSE progress event. `null_count`, `processed_count`, and `total_rows`
/// are always present on the wire (the original UI relies on them); the
/// remaining metadata appears once it is known.
#[derive(Debug, Clone, Serialize)]
pub struct UploadEvent {
    pub status: EventStatus,
    pub progress: f64,
    pub message: String,
    pub null_count: i64,
    pub processed_count: i64,
    pub total_rows: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_columns: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicate_records: Option<HashMap<String, i64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stored_filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_consumption: Option<f64>,
}

/// Round a progress value to two decimals for the wire.
pub fn round_progress(progress: f64) -> f64 {
    (progress * 100.0).round() / 100.0
}

impl UploadEvent {
    pub fn new(status: EventStatus, progress: f64, message: impl Into<String>) -> Self {
        UploadEvent {
            status,
            progress: round_progress(progress),
            message: message.into(),
            null_count: 0,
            processed_count: 0,
            total_rows: None,
            total_columns: None,
            duplicate_records: None,
            file_id: None,
            file_reference: None,
            original_filename: None,
            stored_filename: None,
            file_size: None,
            file_path: None,
            time_consumption: None,
        }
    }
}

/// Sender half of the per-upload event bus.
#[derive(Clone)]
pub struct EventBus {
    tx: mpsc::Sender<UploadEvent>,
}

impl EventBus {
    /// Create a bus and its consumer end.
    pub fn channel() -> (EventBus, mpsc::Receiver<UploadEvent>) {
        let (tx, rx) = mpsc::channel(EVENT_BUS_CAPACITY);
        (EventBus { tx }, rx)
    }

    /// Publish an event, waiting while the bus is full. Returns `false` when
    /// the consumer is gone (client disconnected).
    pub async fn publish(&self, event: UploadEvent) -> bool {
        self.tx.send(event).await.is_ok()
    }

    /// Blocking variant for publishers on worker threads (the analyzer
    /// progress callback).
    pub fn publish_blocking(&self, event: UploadEvent) -> bool {
        self.tx.blocking_send(event).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn event(progress: f64, message: &str) -> UploadEvent {
        UploadEvent::new(EventStatus::Uploading, progress, message)
    }

    #[tokio::test]
    async fn events_arrive_in_publish_order() {
        let (bus, mut rx) = EventBus::channel();
        for i in 0..5 {
            assert!(bus.publish(event(0.1 * i as f64, &format!("step {}", i))).await);
        }
        drop(bus);

        let mut messages = Vec::new();
        while let Some(ev) = rx.recv().await {
            messages.push(ev.message);
        }
        assert_eq!(
            messages,
            vec!["step 0", "step 1", "step 2", "step 3", "step 4"]
        );
    }

    #[tokio::test]
    async fn full_bus_applies_backpressure() {
        let (bus, mut rx) = EventBus::channel();
        for _ in 0..EVENT_BUS_CAPACITY {
            assert!(bus.publish(event(0.5, "fill")).await);
        }

        // Capacity reached: the next publish must park until the consumer
        // drains an event.
        let blocked =
            tokio::time::timeout(Duration::from_millis(50), bus.publish(event(0.5, "extra")))
                .await;
        assert!(blocked.is_err());

        rx.recv().await.unwrap();
        let unblocked =
            tokio::time::timeout(Duration::from_millis(500), bus.publish(event(0.5, "extra")))
                .await;
        assert!(matches!(unblocked, Ok(true)));
    }

    #[tokio::test]
    async fn publish_after_consumer_drop_reports_disconnect() {
        let (bus, rx) = EventBus::channel();
        drop(rx);
        assert!(!bus.publish(event(0.5, "nobody listening")).await);
    }

    #[test]
    fn serialization_omits_unset_metadata_and_rounds_progress() {
        let ev = UploadEvent::new(EventStatus::Analyzing, 0.366666, "scanning");
        let json = serde_json::to_value(&ev).unwrap();

        assert_eq!(json["status"], "analyzing");
        assert_eq!(json["progress"], 0.37);
        assert_eq!(json["null_count"], 0);
        assert_eq!(json["processed_count"], 0);
        assert!(json["total_rows"].is_null());
        assert!(json.get("file_id").is_none());
        assert!(json.get("duplicate_records").is_none());
        assert!(json.get("time_consumption").is_none());
    }

    #[test]
    fn serialization_includes_metadata_once_set() {
        let mut ev = UploadEvent::new(EventStatus::Completed, 1.0, "done");
        ev.file_id = Some(7);
        ev.file_reference = Some("ref".to_string());
        ev.total_rows = Some(3);
        ev.total_columns = Some(2);
        ev.time_consumption = Some(0.42);
        let json = serde_json::to_value(&ev).unwrap();

        assert_eq!(json["status"], "completed");
        assert_eq!(json["progress"], 1.0);
        assert_eq!(json["file_id"], 7);
        assert_eq!(json["total_columns"], 2);
        assert_eq!(json["time_consumption"], 0.42);
    }
}
