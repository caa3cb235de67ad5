//! Job state polling with a hard deadline.
//!
//! The poller reads job status at a fixed interval until the job reaches a
//! terminal state or the deadline passes. It never retries forever: a job
//! that keeps reporting a non-terminal state, or a cluster that keeps
//! failing status reads, ends as `TimedOut`.

use std::time::{Duration, Instant};

use gol_cluster::{ClusterClient, ClusterError, JobSpec, JobState};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::clock::Clock;

/// Poll timing configuration (the `[poll]` section)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Seconds between status reads (default: 10)
    pub interval_seconds: u64,

    /// Maximum seconds from submission to a terminal state (default: 1800 = 30 min)
    pub deadline_seconds: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 10,
            deadline_seconds: 1800,
        }
    }
}

impl PollConfig {
    pub fn validate(&self) -> Result<(), PollConfigError> {
        // deadline_seconds must be in (0, 86400]
        if self.deadline_seconds == 0 || self.deadline_seconds > 86400 {
            return Err(PollConfigError::DeadlineOutOfBounds {
                value: self.deadline_seconds,
            });
        }

        // interval_seconds must be in (0, min(3600, deadline_seconds)]
        let max = self.deadline_seconds.min(3600);
        if self.interval_seconds == 0 || self.interval_seconds > max {
            return Err(PollConfigError::IntervalOutOfBounds {
                value: self.interval_seconds,
                max,
            });
        }

        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_seconds)
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PollConfigError {
    #[error("poll.deadline_seconds must be in (0, 86400], got {value}")]
    DeadlineOutOfBounds { value: u64 },

    #[error("poll.interval_seconds must be in (0, {max}], got {value}")]
    IntervalOutOfBounds { value: u64, max: u64 },
}

/// Wall-clock budget for one job, measured on a [`Clock`].
#[derive(Debug, Clone, Copy)]
pub struct PollDeadline {
    start: Instant,
    limit: Duration,
}

impl PollDeadline {
    pub fn start(clock: &dyn Clock, limit: Duration) -> Self {
        Self {
            start: clock.now(),
            limit,
        }
    }

    pub fn elapsed(&self, clock: &dyn Clock) -> Duration {
        clock.now().saturating_duration_since(self.start)
    }

    pub fn remaining(&self, clock: &dyn Clock) -> Duration {
        self.limit.saturating_sub(self.elapsed(clock))
    }
}

/// How a poll ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOutcome {
    /// Terminal state, or `TimedOut`.
    pub state: JobState,
    /// Status reads issued.
    pub polls: u32,
    /// Status reads that failed with something other than not-found.
    pub errors: u32,
    pub elapsed: Duration,
}

/// Polls one job until it is terminal or out of time.
pub struct JobPoller<'a> {
    cluster: &'a dyn ClusterClient,
    clock: &'a dyn Clock,
    config: PollConfig,
}

impl<'a> JobPoller<'a> {
    pub fn new(cluster: &'a dyn ClusterClient, clock: &'a dyn Clock, config: PollConfig) -> Self {
        Self {
            cluster,
            clock,
            config,
        }
    }

    /// Poll `spec` to completion.
    ///
    /// Always returns a terminal state. Status reads that fail are counted
    /// and retried on the next tick; a job not yet visible counts as
    /// `Submitted`.
    pub fn poll(&self, spec: &JobSpec) -> PollOutcome {
        let deadline = PollDeadline::start(self.clock, self.config.deadline());
        let mut observed = JobState::Submitted;
        let mut polls = 0u32;
        let mut errors = 0u32;

        loop {
            polls += 1;
            match self.cluster.get_status(spec) {
                Ok(state) if state.is_terminal() => {
                    info!(job = %spec.name(), state = %state, polls, "job reached terminal state");
                    return PollOutcome {
                        state,
                        polls,
                        errors,
                        elapsed: deadline.elapsed(self.clock),
                    };
                }
                Ok(state) => {
                    if state != observed {
                        if !observed.can_transition_to(state) {
                            debug!(job = %spec.name(), from = %observed, to = %state, "unexpected state transition");
                        }
                        info!(job = %spec.name(), from = %observed, to = %state, "job state changed");
                        observed = state;
                    }
                }
                Err(ClusterError::NotFoundYet) => {
                    debug!(job = %spec.name(), "job not visible yet");
                }
                Err(e) => {
                    errors += 1;
                    warn!(job = %spec.name(), error = %e, "status read failed, will retry");
                }
            }

            let remaining = deadline.remaining(self.clock);
            if remaining.is_zero() {
                warn!(
                    job = %spec.name(),
                    last_state = %observed,
                    deadline_seconds = self.config.deadline_seconds,
                    "job did not finish before the deadline"
                );
                return PollOutcome {
                    state: JobState::TimedOut,
                    polls,
                    errors,
                    elapsed: deadline.elapsed(self.clock),
                };
            }

            self.clock.sleep(self.config.interval().min(remaining));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::job::{JobId, JobSpecBuilder};
    use gol_cluster::{ClusterOp, FailureConfig, MockCluster};
    use gol_protocol::{EngineKind, JobRequest};

    fn submitted(cluster: &MockCluster) -> JobSpec {
        let request = JobRequest::new(EngineKind::Spark, 3, 4).unwrap();
        let spec = JobSpecBuilder::default()
            .build(&request, &JobId::generate())
            .unwrap();
        cluster.submit(&spec).unwrap();
        spec
    }

    fn config(interval: u64, deadline: u64) -> PollConfig {
        PollConfig {
            interval_seconds: interval,
            deadline_seconds: deadline,
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(PollConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_bounds() {
        assert_eq!(
            config(10, 0).validate(),
            Err(PollConfigError::DeadlineOutOfBounds { value: 0 })
        );
        assert!(config(10, 86401).validate().is_err());
        assert!(config(10, 86400).validate().is_ok());
        assert_eq!(
            config(0, 60).validate(),
            Err(PollConfigError::IntervalOutOfBounds { value: 0, max: 60 })
        );
        assert!(config(61, 60).validate().is_err());
        assert!(config(3601, 7200).validate().is_err());
        assert!(config(3600, 7200).validate().is_ok());
    }

    #[test]
    fn test_completes_after_progression() {
        let cluster = MockCluster::new();
        cluster.set_progression(vec![JobState::Submitted, JobState::Running, JobState::Completed]);
        let spec = submitted(&cluster);
        let clock = ManualClock::new();

        let outcome = JobPoller::new(&cluster, &clock, config(10, 1800)).poll(&spec);

        assert_eq!(outcome.state, JobState::Completed);
        assert_eq!(outcome.polls, 3);
        assert_eq!(outcome.errors, 0);
        assert_eq!(outcome.elapsed, Duration::from_secs(20));
    }

    #[test]
    fn test_failed_is_terminal() {
        let cluster = MockCluster::new();
        cluster.set_progression(vec![JobState::Running, JobState::Failed]);
        let spec = submitted(&cluster);
        let clock = ManualClock::new();

        let outcome = JobPoller::new(&cluster, &clock, config(5, 60)).poll(&spec);
        assert_eq!(outcome.state, JobState::Failed);
        assert_eq!(outcome.polls, 2);
    }

    #[test]
    fn test_times_out_at_deadline() {
        let cluster = MockCluster::new();
        cluster.set_progression(vec![JobState::Running]);
        let spec = submitted(&cluster);
        let clock = ManualClock::new();

        let outcome = JobPoller::new(&cluster, &clock, config(10, 30)).poll(&spec);

        assert_eq!(outcome.state, JobState::TimedOut);
        // Reads at t=0, 10, 20 and 30.
        assert_eq!(outcome.polls, 4);
        assert_eq!(clock.elapsed(), Duration::from_secs(30));
    }

    #[test]
    fn test_last_sleep_clamped_to_deadline() {
        let cluster = MockCluster::new();
        cluster.set_progression(vec![JobState::Running]);
        let spec = submitted(&cluster);
        let clock = ManualClock::new();

        let outcome = JobPoller::new(&cluster, &clock, config(20, 30)).poll(&spec);

        assert_eq!(outcome.state, JobState::TimedOut);
        assert_eq!(outcome.polls, 3);
        assert_eq!(clock.elapsed(), Duration::from_secs(30));
    }

    #[test]
    fn test_not_found_yet_counts_as_submitted() {
        let cluster = MockCluster::new();
        cluster.set_visibility_delay(2);
        let spec = submitted(&cluster);
        let clock = ManualClock::new();

        let outcome = JobPoller::new(&cluster, &clock, config(1, 60)).poll(&spec);

        assert_eq!(outcome.state, JobState::Completed);
        assert_eq!(outcome.polls, 4);
        assert_eq!(outcome.errors, 0);
    }

    #[test]
    fn test_transient_errors_retried() {
        let cluster = MockCluster::new();
        cluster.inject_failure(
            ClusterOp::GetStatus,
            FailureConfig::unavailable().with_fail_count(2),
        );
        let spec = submitted(&cluster);
        let clock = ManualClock::new();

        let outcome = JobPoller::new(&cluster, &clock, config(1, 60)).poll(&spec);

        assert_eq!(outcome.state, JobState::Completed);
        assert_eq!(outcome.errors, 2);
        assert_eq!(outcome.polls, 4);
    }

    #[test]
    fn test_persistent_errors_end_in_timeout() {
        let cluster = MockCluster::new();
        cluster.inject_failure(ClusterOp::GetStatus, FailureConfig::unavailable());
        let spec = submitted(&cluster);
        let clock = ManualClock::new();

        let outcome = JobPoller::new(&cluster, &clock, config(10, 60)).poll(&spec);

        assert_eq!(outcome.state, JobState::TimedOut);
        assert_eq!(outcome.errors, outcome.polls);
    }

    #[test]
    fn test_deadline_tracking() {
        let clock = ManualClock::new();
        let deadline = PollDeadline::start(&clock, Duration::from_secs(30));
        assert_eq!(deadline.remaining(&clock), Duration::from_secs(30));
        clock.advance(Duration::from_secs(45));
        assert_eq!(deadline.remaining(&clock), Duration::ZERO);
        assert_eq!(deadline.elapsed(&clock), Duration::from_secs(45));
    }
}
