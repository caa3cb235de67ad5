//! The collaborator interface the gateway drives.

use crate::error::ClusterError;
use crate::spec::{JobSpec, PodRef, PodSelector};
use crate::state::JobState;

/// Cluster job-management API.
///
/// Implementations must be safe for concurrent use; one instance is shared
/// by every connection handler.
pub trait ClusterClient: Send + Sync {
    /// Create the custom resource. Fails with `Submission` on rejection.
    fn submit(&self, spec: &JobSpec) -> Result<(), ClusterError>;

    /// Read the resource and map it to a state.
    ///
    /// Fails with `NotFoundYet` while the resource is not visible.
    fn get_status(&self, spec: &JobSpec) -> Result<JobState, ClusterError>;

    /// List pods matching a label selector.
    fn list_pods(&self, selector: &PodSelector) -> Result<Vec<PodRef>, ClusterError>;

    /// Read the full log of a pod.
    fn read_logs(&self, pod: &PodRef) -> Result<String, ClusterError>;

    /// Delete the resource. A missing resource counts as success.
    fn delete(&self, spec: &JobSpec) -> Result<(), ClusterError>;
}
