//! Replies written back to the client.

use std::fmt;

use crate::error::ProtocolError;
use crate::USAGE;

/// A single message sent from the gateway to the client.
///
/// A connection sees at most one `Accepted` followed by exactly one final
/// reply, or a single rejection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Request rejected before anything was submitted.
    Rejected(ProtocolError),
    /// The cluster refused to create the job.
    SubmissionFailed { message: String },
    /// Job created; the poll phase follows.
    Accepted { job_name: String },
    /// Job reached a successful terminal state.
    Completed { job_name: String, result: String },
    /// Job failed or never reached a terminal state.
    Failed {
        job_name: String,
        state: String,
        logs: String,
    },
}

impl Reply {
    /// Render the reply as wire text, always newline-terminated.
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Rejected(err) => writeln!(f, "ERROR {}\n{}", err, USAGE),
            Reply::SubmissionFailed { message } => {
                writeln!(f, "ERROR job submission failed: {}", message)
            }
            Reply::Accepted { job_name } => {
                writeln!(f, "JOB {} created, awaiting completion...", job_name)
            }
            Reply::Completed { job_name, result } => {
                writeln!(f, "Job {} completed successfully\nResult:\n{}", job_name, result)
            }
            Reply::Failed {
                job_name,
                state,
                logs,
            } => writeln!(
                f,
                "Job {} failed with state '{}'\nLogs:\n{}",
                job_name,
                state,
                logs.trim_end()
            ),
        }
    }
}
