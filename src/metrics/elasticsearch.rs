//! Elasticsearch metrics sink.

use std::time::Duration;

use chrono::Utc;
use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use serde_json::Value;
use tracing::{debug, info};

use super::{MetricEvent, MetricsError, MetricsSink};

/// Field mapping installed when the index is created.
pub const INDEX_MAPPING: &str = r#"{
  "mappings": {
    "properties": {
      "timestamp": {"type": "date"},
      "request_type": {"type": "keyword"},
      "client_id": {"type": "keyword"},
      "job_id": {"type": "keyword"},
      "engine_type": {"type": "keyword"},
      "status": {"type": "keyword"},
      "execution_time_ms": {"type": "long"},
      "grid_size": {"type": "integer"},
      "iterations": {"type": "integer"},
      "output_size": {"type": "long"}
    }
  }
}"#;

/// Indexes one document per event into `<url>/<index>/_doc`.
#[derive(Debug, Clone)]
pub struct ElasticsearchSink {
    client: Client,
    base_url: String,
    index: String,
}

impl ElasticsearchSink {
    pub fn new(base_url: &str, index: &str, timeout: Duration) -> Result<Self, MetricsError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            index: index.to_string(),
        })
    }

    fn index_url(&self) -> String {
        format!("{}/{}", self.base_url, self.index)
    }

    /// Create the index with [`INDEX_MAPPING`] unless it already exists.
    ///
    /// Returns whether the index was created.
    pub fn ensure_index(&self) -> Result<bool, MetricsError> {
        let url = self.index_url();
        let head = self.client.head(&url).send()?;
        if head.status().is_success() {
            debug!(index = %self.index, "metrics index exists");
            return Ok(false);
        }
        if head.status() != StatusCode::NOT_FOUND {
            return Err(rejected(head));
        }

        let mapping: Value = serde_json::from_str(INDEX_MAPPING)
            .map_err(|e| MetricsError::Transport(format!("index mapping: {}", e)))?;
        let response = self.client.put(&url).json(&mapping).send()?;
        if !response.status().is_success() {
            return Err(rejected(response));
        }
        info!(index = %self.index, "created metrics index");
        Ok(true)
    }
}

fn rejected(response: Response) -> MetricsError {
    let status = response.status().as_u16();
    let body = response.text().unwrap_or_default();
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/reason")
                .and_then(|r| r.as_str())
                .map(str::to_string)
        })
        .unwrap_or(body);
    MetricsError::Rejected { status, message }
}

impl MetricsSink for ElasticsearchSink {
    fn record(&self, event: &MetricEvent) -> Result<(), MetricsError> {
        let doc = event.to_document(Utc::now());
        let response = self
            .client
            .post(format!("{}/_doc", self.index_url()))
            .json(&doc)
            .send()?;
        if !response.status().is_success() {
            return Err(rejected(response));
        }
        debug!(request_type = event.request_type(), "recorded metric");
        Ok(())
    }
}
