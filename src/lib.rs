//! Game of Life job gateway
//!
//! A TCP gateway that turns one-line requests (`[engine,]paramMin,paramMax`)
//! into Kubernetes compute jobs (Spark or MPI/OpenMP), waits for them to
//! finish, returns the filtered result to the client, and deletes the job.

pub mod clock;
pub mod config;
pub mod engine;
pub mod filter;
pub mod handler;
pub mod job;
pub mod listener;
pub mod metrics;
pub mod poller;
pub mod shutdown;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{EffectiveConfig, GatewayConfig};
pub use handler::{ConnectionHandler, ConnectionOutcome, HandlerError, JobLease};
pub use job::{BuildError, JobId, JobSpecBuilder};
pub use listener::Listener;
pub use metrics::{ElasticsearchSink, MetricEvent, MetricsSink, NullSink, RecordingSink};
pub use poller::{JobPoller, PollConfig, PollOutcome};
pub use shutdown::ShutdownState;
