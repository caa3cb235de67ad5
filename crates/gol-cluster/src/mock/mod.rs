//! Mock Cluster Implementation
//!
//! In-process stand-in for the cluster job-management API, used by unit and
//! integration tests. Safe for concurrent use by many connection handlers.
//!
//! # Behaviour
//!
//! - `submit`: stores the resource; duplicate names are rejected
//! - `get_status`: walks a scripted state progression, one step per call
//! - `list_pods` / `read_logs`: serve a single result pod per live resource
//! - `delete`: removes the resource; unknown names succeed
//!
//! Every call is recorded so tests can assert on exact call counts.

mod cluster;
mod failure;

pub use cluster::{ClusterOp, MockCluster};
pub use failure::{FailureConfig, FailureInjector};
