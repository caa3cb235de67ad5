//! Failure Injection for Mock Cluster
//!
//! Supports configurable failure injection for testing error paths.

use std::collections::HashMap;

use super::cluster::ClusterOp;

/// Failure configuration for an operation
#[derive(Debug, Clone)]
pub struct FailureConfig {
    /// HTTP-like status code carried by the error
    pub status: u16,
    /// Error message to return
    pub message: String,
    /// Number of times to fail before succeeding (None = always fail)
    pub fail_count: Option<u32>,
}

impl FailureConfig {
    /// Create a config that returns an error
    pub fn error(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            fail_count: None,
        }
    }

    /// Create a transient server-side error (HTTP 503)
    pub fn unavailable() -> Self {
        Self::error(503, "service unavailable")
    }

    /// Set the number of times to fail before succeeding
    pub fn with_fail_count(mut self, count: u32) -> Self {
        self.fail_count = Some(count);
        self
    }
}

/// Failure injector for the mock cluster
#[derive(Debug, Default)]
pub struct FailureInjector {
    /// Per-operation failure configs
    configs: HashMap<ClusterOp, FailureConfig>,
    /// Call counts per operation (for fail_count tracking)
    call_counts: HashMap<ClusterOp, u32>,
}

impl FailureInjector {
    /// Create a new failure injector
    pub fn new() -> Self {
        Self::default()
    }

    /// Inject a failure for an operation
    pub fn inject(&mut self, op: ClusterOp, config: FailureConfig) {
        self.configs.insert(op, config);
        self.call_counts.insert(op, 0);
    }

    /// Clear all failure injections
    pub fn clear(&mut self) {
        self.configs.clear();
        self.call_counts.clear();
    }

    /// Check if a failure should occur for an operation
    /// Returns the failure config if one should occur, None otherwise
    pub fn check(&mut self, op: ClusterOp) -> Option<FailureConfig> {
        let config = self.configs.get(&op)?;
        let count = self.call_counts.entry(op).or_insert(0);
        *count += 1;

        if let Some(fail_limit) = config.fail_count {
            if *count > fail_limit {
                return None;
            }
        }

        Some(config.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_config_error() {
        let config = FailureConfig::error(409, "already exists");
        assert_eq!(config.status, 409);
        assert_eq!(config.message, "already exists");
        assert!(config.fail_count.is_none());
    }

    #[test]
    fn test_failure_injector_basic() {
        let mut injector = FailureInjector::new();

        assert!(injector.check(ClusterOp::Submit).is_none());

        injector.inject(ClusterOp::Submit, FailureConfig::error(403, "quota exceeded"));

        let config = injector.check(ClusterOp::Submit).unwrap();
        assert_eq!(config.message, "quota exceeded");
        assert!(injector.check(ClusterOp::Delete).is_none());
    }

    #[test]
    fn test_failure_injector_fail_count() {
        let mut injector = FailureInjector::new();

        // Fail twice, then succeed
        injector.inject(
            ClusterOp::GetStatus,
            FailureConfig::unavailable().with_fail_count(2),
        );

        assert!(injector.check(ClusterOp::GetStatus).is_some());
        assert!(injector.check(ClusterOp::GetStatus).is_some());
        assert!(injector.check(ClusterOp::GetStatus).is_none());
    }

    #[test]
    fn test_failure_injector_clear() {
        let mut injector = FailureInjector::new();

        injector.inject(ClusterOp::ListPods, FailureConfig::unavailable());
        injector.clear();
        assert!(injector.check(ClusterOp::ListPods).is_none());
    }
}
