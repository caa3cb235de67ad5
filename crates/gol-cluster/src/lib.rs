//! Cluster Job Client
//!
//! Thin interface over the cluster job-management API. The gateway depends
//! only on the [`ClusterClient`] trait:
//!
//! - `submit`: create the custom resource described by a [`JobSpec`]
//! - `get_status`: read the resource and map it to a [`JobState`]
//! - `list_pods` / `read_logs`: fetch output from the job's pods
//! - `delete`: remove the resource (idempotent)
//!
//! Two implementations ship: [`KubeClient`] for the Kubernetes REST API and
//! [`MockCluster`] for in-process tests.

pub mod client;
pub mod error;
pub mod kube;
pub mod mock;
pub mod spec;
pub mod state;

pub use client::ClusterClient;
pub use error::ClusterError;
pub use kube::{KubeClient, KubeConfig};
pub use mock::{ClusterOp, FailureConfig, MockCluster};
pub use spec::{JobSpec, PodRef, PodSelector, ResourceRef};
pub use state::{JobState, StatusConvention};
