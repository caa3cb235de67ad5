//! Job state machine
//!
//! Job states: SUBMITTED → RUNNING → {COMPLETED | FAILED}, with TIMED_OUT as
//! a locally imposed terminal state. Transitions are driven by the remote
//! scheduler; the gateway only observes them.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Job state enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    /// Resource created, scheduler has not started it yet
    Submitted,
    /// Job is actively executing
    Running,
    /// Job finished successfully
    Completed,
    /// Job failed
    Failed,
    /// No terminal state was reported before the poll deadline
    TimedOut,
}

impl JobState {
    /// Returns true if no further transition is expected.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Failed | JobState::TimedOut
        )
    }

    /// Returns true only for the successful terminal state.
    pub fn is_success(&self) -> bool {
        matches!(self, JobState::Completed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Submitted => "SUBMITTED",
            JobState::Running => "RUNNING",
            JobState::Completed => "COMPLETED",
            JobState::Failed => "FAILED",
            JobState::TimedOut => "TIMED_OUT",
        }
    }

    /// Check if an observed transition from this state to target is plausible.
    ///
    /// Used only for logging; remote schedulers may skip states.
    pub fn can_transition_to(&self, target: JobState) -> bool {
        match (self, target) {
            (JobState::Submitted, _) => target != JobState::Submitted,
            (JobState::Running, JobState::Submitted) => false,
            (JobState::Running, _) => target != JobState::Running,
            _ => false,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a custom resource reports its progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusConvention {
    /// Spark operator: `status.applicationState.state`.
    SparkApplicationState,
    /// Kubeflow training operators: `status.conditions[]` with `type`/`status`.
    KubeflowConditions,
}

impl StatusConvention {
    /// Map a resource object (as returned by GET) to a job state.
    ///
    /// Never returns `TimedOut`; that state is imposed by the poller.
    pub fn interpret(&self, resource: &Value) -> JobState {
        match self {
            StatusConvention::SparkApplicationState => {
                let state = resource
                    .pointer("/status/applicationState/state")
                    .and_then(Value::as_str)
                    .unwrap_or("");
                match state {
                    "COMPLETED" => JobState::Completed,
                    "FAILED" | "SUBMISSION_FAILED" => JobState::Failed,
                    "" | "NEW" | "SUBMITTED" => JobState::Submitted,
                    _ => JobState::Running,
                }
            }
            StatusConvention::KubeflowConditions => {
                let conditions = resource
                    .pointer("/status/conditions")
                    .and_then(Value::as_array)
                    .map(Vec::as_slice)
                    .unwrap_or(&[]);
                let is_true = |kind: &str| {
                    conditions.iter().any(|c| {
                        c.get("type").and_then(Value::as_str) == Some(kind)
                            && c.get("status").and_then(Value::as_str) == Some("True")
                    })
                };
                if is_true("Succeeded") {
                    JobState::Completed
                } else if is_true("Failed") {
                    JobState::Failed
                } else if is_true("Running") {
                    JobState::Running
                } else {
                    JobState::Submitted
                }
            }
        }
    }
}
