//! Mock cluster state and the [`ClusterClient`] implementation over it.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::client::ClusterClient;
use crate::error::ClusterError;
use crate::spec::{JobSpec, PodRef, PodSelector};
use crate::state::JobState;

use super::failure::{FailureConfig, FailureInjector};

/// Operations of the cluster API, used for call records and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClusterOp {
    Submit,
    GetStatus,
    ListPods,
    ReadLogs,
    Delete,
}

/// A resource held by the mock.
#[derive(Debug, Clone)]
struct MockResource {
    spec: JobSpec,
    /// Remaining scripted states; the last one sticks.
    progression: VecDeque<JobState>,
    /// Status reads left that answer `NotFoundYet`.
    hidden_reads: u32,
}

#[derive(Debug)]
struct MockClusterState {
    resources: HashMap<String, MockResource>,
    submitted: Vec<JobSpec>,
    calls: Vec<(ClusterOp, String)>,
    progression: Vec<JobState>,
    visibility_delay: u32,
    logs: Option<String>,
    failures: FailureInjector,
}

impl Default for MockClusterState {
    fn default() -> Self {
        Self {
            resources: HashMap::new(),
            submitted: Vec::new(),
            calls: Vec::new(),
            progression: vec![JobState::Running, JobState::Completed],
            visibility_delay: 0,
            logs: Some(String::new()),
            failures: FailureInjector::new(),
        }
    }
}

/// Configurable mock cluster for testing
///
/// Cloning shares the underlying state, so a test can keep a handle while
/// the gateway owns another.
#[derive(Debug, Clone, Default)]
pub struct MockCluster {
    state: Arc<Mutex<MockClusterState>>,
}

impl MockCluster {
    /// Create a mock whose jobs go RUNNING then COMPLETED with empty logs.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockClusterState> {
        // A panicking test thread must not hide the records from the others.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // === Public API for test configuration ===

    /// States reported by successive status reads of every job submitted
    /// from now on. The last state repeats forever.
    pub fn set_progression(&self, states: Vec<JobState>) {
        self.lock().progression = states;
    }

    /// Number of status reads answering `NotFoundYet` right after submission.
    pub fn set_visibility_delay(&self, reads: u32) {
        self.lock().visibility_delay = reads;
    }

    /// Log text served by the result pod of every job.
    pub fn set_logs(&self, logs: impl Into<String>) {
        self.lock().logs = Some(logs.into());
    }

    /// Make `list_pods` find nothing.
    pub fn remove_pods(&self) {
        self.lock().logs = None;
    }

    /// Inject a failure for an operation.
    pub fn inject_failure(&self, op: ClusterOp, config: FailureConfig) {
        self.lock().failures.inject(op, config);
    }

    /// Clear all failure injections.
    pub fn clear_failures(&self) {
        self.lock().failures.clear();
    }

    // === Inspection ===

    /// Every spec accepted by `submit`, in order.
    pub fn submitted(&self) -> Vec<JobSpec> {
        self.lock().submitted.clone()
    }

    /// Names of resources that still exist.
    pub fn live_resources(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().resources.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of calls of `op` (all targets).
    pub fn call_count(&self, op: ClusterOp) -> usize {
        self.lock().calls.iter().filter(|(o, _)| *o == op).count()
    }

    /// Number of calls of `op` against a given target name.
    pub fn calls_for(&self, op: ClusterOp, target: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|(o, t)| *o == op && t == target)
            .count()
    }

    /// Full call record as `(op, target)` pairs.
    pub fn calls(&self) -> Vec<(ClusterOp, String)> {
        self.lock().calls.clone()
    }
}

fn injected(op: ClusterOp, failure: FailureConfig) -> ClusterError {
    match op {
        ClusterOp::Submit => ClusterError::Submission {
            status: failure.status,
            message: failure.message,
        },
        _ => ClusterError::Api {
            status: failure.status,
            message: failure.message,
        },
    }
}

fn pod_name(job_name: &str) -> String {
    format!("{}-result", job_name)
}

impl ClusterClient for MockCluster {
    fn submit(&self, spec: &JobSpec) -> Result<(), ClusterError> {
        let mut state = self.lock();
        state.calls.push((ClusterOp::Submit, spec.name().to_string()));
        if let Some(failure) = state.failures.check(ClusterOp::Submit) {
            return Err(injected(ClusterOp::Submit, failure));
        }

        if state.resources.contains_key(spec.name()) {
            return Err(ClusterError::Submission {
                status: 409,
                message: format!("{} \"{}\" already exists", spec.resource.plural, spec.name()),
            });
        }

        let resource = MockResource {
            spec: spec.clone(),
            progression: state.progression.iter().copied().collect(),
            hidden_reads: state.visibility_delay,
        };
        state.resources.insert(spec.name().to_string(), resource);
        state.submitted.push(spec.clone());
        Ok(())
    }

    fn get_status(&self, spec: &JobSpec) -> Result<JobState, ClusterError> {
        let mut state = self.lock();
        state.calls.push((ClusterOp::GetStatus, spec.name().to_string()));
        if let Some(failure) = state.failures.check(ClusterOp::GetStatus) {
            return Err(injected(ClusterOp::GetStatus, failure));
        }

        let resource = state
            .resources
            .get_mut(spec.name())
            .ok_or(ClusterError::NotFoundYet)?;

        if resource.hidden_reads > 0 {
            resource.hidden_reads -= 1;
            return Err(ClusterError::NotFoundYet);
        }

        let current = if resource.progression.len() > 1 {
            resource.progression.pop_front()
        } else {
            resource.progression.front().copied()
        };
        Ok(current.unwrap_or(JobState::Submitted))
    }

    fn list_pods(&self, selector: &PodSelector) -> Result<Vec<PodRef>, ClusterError> {
        let mut state = self.lock();
        state.calls.push((ClusterOp::ListPods, selector.labels.clone()));
        if let Some(failure) = state.failures.check(ClusterOp::ListPods) {
            return Err(injected(ClusterOp::ListPods, failure));
        }

        if state.logs.is_none() {
            return Ok(Vec::new());
        }

        let mut pods: Vec<PodRef> = state
            .resources
            .values()
            .filter(|r| &r.spec.pod_selector == selector)
            .map(|r| PodRef {
                namespace: r.spec.pod_selector.namespace.clone(),
                name: pod_name(r.spec.name()),
                phase: Some("Succeeded".to_string()),
            })
            .collect();
        pods.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(pods)
    }

    fn read_logs(&self, pod: &PodRef) -> Result<String, ClusterError> {
        let mut state = self.lock();
        state.calls.push((ClusterOp::ReadLogs, pod.name.clone()));
        if let Some(failure) = state.failures.check(ClusterOp::ReadLogs) {
            return Err(injected(ClusterOp::ReadLogs, failure));
        }

        let exists = state.resources.keys().any(|name| pod_name(name) == pod.name);
        match (&state.logs, exists) {
            (Some(logs), true) => Ok(logs.clone()),
            _ => Err(ClusterError::NotFoundYet),
        }
    }

    fn delete(&self, spec: &JobSpec) -> Result<(), ClusterError> {
        let mut state = self.lock();
        state.calls.push((ClusterOp::Delete, spec.name().to_string()));
        if let Some(failure) = state.failures.check(ClusterOp::Delete) {
            return Err(injected(ClusterOp::Delete, failure));
        }

        // Not found is success.
        state.resources.remove(spec.name());
        Ok(())
    }
}
