//! Per-engine job templates.
//!
//! Each engine maps a request onto a fixed custom resource kind. Everything
//! cluster-specific (images, namespaces, resource limits, replica counts)
//! comes from configuration, never from the request.

pub mod mpi;
pub mod spark;

use gol_cluster::JobSpec;
use gol_protocol::{EngineKind, JobRequest};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::job::JobId;

pub use mpi::MpiTemplate;
pub use spark::SparkTemplate;

pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";
pub const MANAGED_BY_VALUE: &str = "gol-gateway";
pub const JOB_ID_LABEL: &str = "gol-gateway/job-id";

/// Labels stamped on every resource the gateway creates.
pub(crate) fn common_labels(job_id: &JobId) -> Value {
    json!({
        MANAGED_BY_LABEL: MANAGED_BY_VALUE,
        JOB_ID_LABEL: job_id.as_str(),
    })
}

/// A configured engine template.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineTemplate {
    Spark(SparkTemplate),
    Mpi(MpiTemplate),
}

impl EngineTemplate {
    pub fn kind(&self) -> EngineKind {
        match self {
            EngineTemplate::Spark(_) => EngineKind::Spark,
            EngineTemplate::Mpi(_) => EngineKind::Mpi,
        }
    }

    pub fn is_enabled(&self) -> bool {
        match self {
            EngineTemplate::Spark(t) => t.enabled,
            EngineTemplate::Mpi(t) => t.enabled,
        }
    }

    pub fn result_marker(&self) -> &str {
        match self {
            EngineTemplate::Spark(t) => &t.result_marker,
            EngineTemplate::Mpi(t) => &t.result_marker,
        }
    }

    pub fn keep_marker(&self) -> bool {
        match self {
            EngineTemplate::Spark(t) => t.keep_marker,
            EngineTemplate::Mpi(t) => t.keep_marker,
        }
    }

    pub fn build(&self, request: &JobRequest, job_id: &JobId) -> JobSpec {
        match self {
            EngineTemplate::Spark(t) => t.build(request, job_id),
            EngineTemplate::Mpi(t) => t.build(request, job_id),
        }
    }
}

/// The `[engines]` configuration section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub spark: SparkTemplate,
    pub mpi: MpiTemplate,
}

impl EngineSettings {
    pub fn template(&self, kind: EngineKind) -> EngineTemplate {
        match kind {
            EngineKind::Spark => EngineTemplate::Spark(self.spark.clone()),
            EngineKind::Mpi => EngineTemplate::Mpi(self.mpi.clone()),
        }
    }

    /// All templates, in [`EngineKind::ALL`] order.
    pub fn templates(&self) -> Vec<EngineTemplate> {
        EngineKind::ALL.iter().map(|k| self.template(*k)).collect()
    }
}
