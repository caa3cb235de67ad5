//! Game of Life Gateway Protocol
//!
//! Defines the plaintext line protocol between clients and the gateway:
//!
//! ```text
//! client -> gateway:  [engine,]paramMin,paramMax\n
//! gateway -> client:  JOB <name> created, awaiting completion...\n
//!                     <result block or failure block>
//!                     (connection close)
//! ```
//!
//! There is no status byte; the connection close is the completion signal.

pub mod engine;
pub mod error;
pub mod request;
pub mod response;

pub use engine::EngineKind;
pub use error::{ErrorCode, ProtocolError};
pub use request::{parse_request, read_request, JobRequest};
pub use response::Reply;

/// Default maximum size of a single request line in bytes.
pub const DEFAULT_MAX_REQUEST_BYTES: usize = 1024;

/// Usage hint appended to invalid-request replies.
pub const USAGE: &str = "usage: [engine,]paramMin,paramMax (e.g. 3,4 or mpi,2,2)";
