//! Operational metrics.
//!
//! The handler emits one [`MetricEvent`] per connection and job milestone.
//! Sinks are best-effort: a failed `record` is logged by the caller and
//! never changes what the client sees.

mod elasticsearch;

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use gol_protocol::EngineKind;
use serde_json::{json, Value};
use thiserror::Error;

pub use elasticsearch::{ElasticsearchSink, INDEX_MAPPING};

/// A metrics event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetricEvent {
    ConnectionOpened {
        client_id: String,
    },
    ConnectionClosed {
        client_id: String,
    },
    JobStarted {
        client_id: String,
        job_id: String,
        engine: EngineKind,
        /// Largest size exponent requested (`paramMax`)
        grid_size: u32,
        /// Number of sizes processed (`paramMax - paramMin + 1`)
        iterations: u64,
    },
    JobCompleted {
        client_id: String,
        job_id: String,
        engine: EngineKind,
        duration_ms: u64,
        /// Terminal state, lowercase (`completed`, `failed`, `timed_out`)
        status: String,
        /// Bytes of result or log text returned to the client
        output_size: usize,
    },
}

impl MetricEvent {
    /// Value of the `request_type` document field
    pub fn request_type(&self) -> &'static str {
        match self {
            MetricEvent::ConnectionOpened { .. } => "client_connection",
            MetricEvent::ConnectionClosed { .. } => "client_disconnection",
            MetricEvent::JobStarted { .. } => "job_start",
            MetricEvent::JobCompleted { .. } => "job_completion",
        }
    }

    pub fn client_id(&self) -> &str {
        match self {
            MetricEvent::ConnectionOpened { client_id }
            | MetricEvent::ConnectionClosed { client_id }
            | MetricEvent::JobStarted { client_id, .. }
            | MetricEvent::JobCompleted { client_id, .. } => client_id,
        }
    }

    /// Flat JSON document for indexing.
    pub fn to_document(&self, timestamp: DateTime<Utc>) -> Value {
        let mut doc = json!({
            "timestamp": timestamp.to_rfc3339(),
            "request_type": self.request_type(),
            "client_id": self.client_id(),
        });

        let fields = match self {
            MetricEvent::ConnectionOpened { .. } | MetricEvent::ConnectionClosed { .. } => {
                json!({})
            }
            MetricEvent::JobStarted {
                job_id,
                engine,
                grid_size,
                iterations,
                ..
            } => json!({
                "job_id": job_id,
                "engine_type": engine.as_str(),
                "grid_size": grid_size,
                "iterations": iterations,
                "status": "started",
            }),
            MetricEvent::JobCompleted {
                job_id,
                engine,
                duration_ms,
                status,
                output_size,
                ..
            } => json!({
                "job_id": job_id,
                "engine_type": engine.as_str(),
                "execution_time_ms": duration_ms,
                "status": status,
                "output_size": output_size,
            }),
        };

        if let (Value::Object(doc_map), Value::Object(field_map)) = (&mut doc, fields) {
            doc_map.extend(field_map);
        }
        doc
    }
}

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("metrics transport error: {0}")]
    Transport(String),

    #[error("metrics backend rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },
}

impl From<reqwest::Error> for MetricsError {
    fn from(e: reqwest::Error) -> Self {
        MetricsError::Transport(e.to_string())
    }
}

/// Destination for metric events
pub trait MetricsSink: Send + Sync {
    fn record(&self, event: &MetricEvent) -> Result<(), MetricsError>;
}

/// Discards every event (metrics disabled).
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl MetricsSink for NullSink {
    fn record(&self, _event: &MetricEvent) -> Result<(), MetricsError> {
        Ok(())
    }
}

/// Keeps events in memory for inspection.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<MetricEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<MetricEvent> {
        self.events.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    /// Events of one `request_type`, in arrival order.
    pub fn events_of(&self, request_type: &str) -> Vec<MetricEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.request_type() == request_type)
            .collect()
    }
}

impl MetricsSink for RecordingSink {
    fn record(&self, event: &MetricEvent) -> Result<(), MetricsError> {
        self.events
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(event.clone());
        Ok(())
    }
}
