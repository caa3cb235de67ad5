//! Job identity and the JobSpec builder.

use std::fmt;
use std::sync::{Mutex, OnceLock};

use gol_cluster::JobSpec;
use gol_protocol::{EngineKind, JobRequest};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ulid::{Generator, Ulid};

use crate::engine::EngineSettings;

/// Unique, time-ordered job identifier (lowercase ULID).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

fn generator() -> &'static Mutex<Generator> {
    static GENERATOR: OnceLock<Mutex<Generator>> = OnceLock::new();
    GENERATOR.get_or_init(|| Mutex::new(Generator::new()))
}

impl JobId {
    /// Generate a new id.
    ///
    /// Ids are strictly increasing within the process, even for requests
    /// arriving in the same millisecond on different threads.
    pub fn generate() -> Self {
        let ulid = generator()
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .generate()
            .unwrap_or_else(|_| Ulid::new());
        JobId(ulid.to_string().to_lowercase())
    }

    /// Parse a previously generated id.
    pub fn parse(s: &str) -> Result<Self, BuildError> {
        let lower = s.to_ascii_lowercase();
        if Ulid::from_string(&s.to_ascii_uppercase()).is_err() {
            return Err(BuildError::InvalidJobId(s.to_string()));
        }
        Ok(JobId(lower))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Cluster resource name for this job: `gol-<engine>-<id>`.
    ///
    /// Lowercase alphanumerics and dashes only, at most 36 characters, so
    /// always a valid DNS-1123 label.
    pub fn resource_name(&self, engine: EngineKind) -> String {
        format!("gol-{}-{}", engine.as_str(), self.0)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Errors building a JobSpec
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("engine '{0}' is not enabled on this gateway")]
    UnsupportedEngine(EngineKind),

    #[error("invalid job id: {0}")]
    InvalidJobId(String),
}

/// Turns validated requests into cluster job specifications.
///
/// Pure: the same request and id always produce the same spec.
#[derive(Debug, Clone, Default)]
pub struct JobSpecBuilder {
    engines: EngineSettings,
}

impl JobSpecBuilder {
    pub fn new(engines: EngineSettings) -> Self {
        Self { engines }
    }

    pub fn build(&self, request: &JobRequest, job_id: &JobId) -> Result<JobSpec, BuildError> {
        let template = self.engines.template(request.engine);
        if !template.is_enabled() {
            return Err(BuildError::UnsupportedEngine(request.engine));
        }
        Ok(template.build(request, job_id))
    }
}
