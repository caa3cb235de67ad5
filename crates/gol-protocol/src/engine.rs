//! Compute engine identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ProtocolError;

/// Compute engine a job is submitted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// Spark application (driver + executors).
    #[default]
    Spark,
    /// MPI + OpenMP job (launcher + fixed worker pool).
    Mpi,
}

impl EngineKind {
    /// Every engine the protocol knows about.
    pub const ALL: [EngineKind; 2] = [EngineKind::Spark, EngineKind::Mpi];

    /// Canonical wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::Spark => "spark",
            EngineKind::Mpi => "mpi",
        }
    }

    /// Resolve an engine name, case-insensitive, accepting known aliases.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "spark" => Some(EngineKind::Spark),
            "mpi" | "mpi-omp" | "mpi_omp" | "openmp" => Some(EngineKind::Mpi),
            _ => None,
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EngineKind {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| ProtocolError::unknown_engine(s))
    }
}
