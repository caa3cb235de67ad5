//! Per-connection request handling.
//!
//! One handler call owns one request end to end: read and parse the request
//! line, build and submit the job, acknowledge, poll, collect and filter the
//! logs, reply, and delete the job. Once a job has been submitted it is
//! deleted exactly once, whichever way the handler exits.

use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::Arc;
use std::time::{Duration, Instant};

use gol_cluster::{ClusterClient, JobSpec, JobState};
use gol_protocol::{parse_request, read_request, EngineKind, JobRequest, ProtocolError, Reply};
use thiserror::Error;
use tracing::{debug, info, info_span, warn};

use crate::clock::Clock;
use crate::config::GatewayConfig;
use crate::filter::{FilterError, ResultFilters};
use crate::job::{BuildError, JobId, JobSpecBuilder};
use crate::metrics::{MetricEvent, MetricsSink};
use crate::poller::{JobPoller, PollConfig};

/// Placeholder logs when the job left no pod behind.
pub const NO_POD_LOGS: &str = "[no pod found for job]";

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("client I/O error: {0}")]
    Io(#[from] io::Error),
}

/// How a connection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionOutcome {
    /// Bad input; nothing was submitted.
    Rejected,
    /// The cluster refused the job.
    SubmissionFailed,
    /// The job ran to this terminal state and was cleaned up.
    Finished(JobState),
}

/// Handler settings taken from the gateway configuration.
#[derive(Debug, Clone)]
pub struct HandlerSettings {
    pub default_engine: EngineKind,
    pub max_request_bytes: usize,
    /// Time allowed for the whole request line, across all reads.
    pub read_timeout: Duration,
    pub poll: PollConfig,
}

impl From<&GatewayConfig> for HandlerSettings {
    fn from(config: &GatewayConfig) -> Self {
        Self {
            default_engine: config.server.default_engine,
            max_request_bytes: config.server.max_request_bytes,
            read_timeout: config.server.read_timeout(),
            poll: config.poll,
        }
    }
}

/// Deletes a submitted job exactly once.
///
/// `release` deletes after the final reply; dropping an unreleased lease
/// (early return, client I/O error, panic) deletes too.
pub struct JobLease<'a> {
    cluster: &'a dyn ClusterClient,
    spec: &'a JobSpec,
    released: bool,
}

impl<'a> JobLease<'a> {
    pub fn new(cluster: &'a dyn ClusterClient, spec: &'a JobSpec) -> Self {
        Self {
            cluster,
            spec,
            released: false,
        }
    }

    pub fn release(mut self) {
        self.cleanup();
    }

    fn cleanup(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        match self.cluster.delete(self.spec) {
            Ok(()) => info!(job = %self.spec.name(), "job deleted"),
            Err(e) => warn!(job = %self.spec.name(), error = %e, "job cleanup failed"),
        }
    }
}

impl Drop for JobLease<'_> {
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// Serves gateway connections. Shared by all connection threads.
pub struct ConnectionHandler {
    cluster: Arc<dyn ClusterClient>,
    metrics: Arc<dyn MetricsSink>,
    clock: Arc<dyn Clock>,
    builder: JobSpecBuilder,
    filters: ResultFilters,
    settings: HandlerSettings,
}

impl ConnectionHandler {
    pub fn new(
        config: &GatewayConfig,
        cluster: Arc<dyn ClusterClient>,
        metrics: Arc<dyn MetricsSink>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, FilterError> {
        Ok(Self {
            cluster,
            metrics,
            clock,
            builder: JobSpecBuilder::new(config.engines.clone()),
            filters: ResultFilters::from_settings(&config.engines)?,
            settings: HandlerSettings::from(config),
        })
    }

    /// Serve one accepted TCP connection and close it.
    pub fn handle_connection(&self, stream: TcpStream, peer: SocketAddr, conn_id: u64) {
        let span = info_span!("conn", id = conn_id, peer = %peer);
        let _enter = span.enter();

        let read_half = match stream.try_clone() {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "could not split connection");
                return;
            }
        };
        let mut reader = BufReader::new(RequestStream {
            stream: read_half,
            deadline: Instant::now() + self.settings.read_timeout,
        });
        let mut writer = stream;

        match self.serve(&mut reader, &mut writer, &peer.to_string()) {
            Ok(outcome) => info!(?outcome, "connection closed"),
            Err(e) => warn!(error = %e, "connection ended early"),
        }
        let _ = writer.shutdown(Shutdown::Both);
    }

    /// Run the request/response exchange over any reader and writer.
    pub fn serve<R: BufRead, W: Write>(
        &self,
        reader: &mut R,
        writer: &mut W,
        client_id: &str,
    ) -> Result<ConnectionOutcome, HandlerError> {
        self.emit(MetricEvent::ConnectionOpened {
            client_id: client_id.to_string(),
        });
        let result = self.exchange(reader, writer, client_id);
        self.emit(MetricEvent::ConnectionClosed {
            client_id: client_id.to_string(),
        });
        result
    }

    fn exchange<R: BufRead, W: Write>(
        &self,
        reader: &mut R,
        writer: &mut W,
        client_id: &str,
    ) -> Result<ConnectionOutcome, HandlerError> {
        let request = match self.read_and_parse(reader) {
            Ok(request) => request,
            Err(e) => {
                info!(code = ?e.code, error = %e.message, "request rejected");
                send(writer, &Reply::Rejected(e))?;
                return Ok(ConnectionOutcome::Rejected);
            }
        };

        let job_id = JobId::generate();
        let spec = match self.builder.build(&request, &job_id) {
            Ok(spec) => spec,
            Err(BuildError::UnsupportedEngine(engine)) => {
                info!(engine = %engine, "request for disabled engine rejected");
                let err = ProtocolError::unsupported_engine(engine.as_str());
                send(writer, &Reply::Rejected(err))?;
                return Ok(ConnectionOutcome::Rejected);
            }
            Err(e) => {
                send(writer, &Reply::Rejected(ProtocolError::invalid_request(e.to_string())))?;
                return Ok(ConnectionOutcome::Rejected);
            }
        };
        let job_name = spec.name().to_string();

        info!(job = %job_name, engine = %request.engine, args = ?spec.arguments, "submitting job");
        if let Err(e) = self.cluster.submit(&spec) {
            warn!(job = %job_name, error = %e, "job submission failed");
            send(
                writer,
                &Reply::SubmissionFailed {
                    message: e.to_string(),
                },
            )?;
            return Ok(ConnectionOutcome::SubmissionFailed);
        }

        let lease = JobLease::new(self.cluster.as_ref(), &spec);
        let started = self.clock.now();
        self.emit(MetricEvent::JobStarted {
            client_id: client_id.to_string(),
            job_id: job_name.clone(),
            engine: request.engine,
            grid_size: request.param_max,
            iterations: u64::from(request.span()) + 1,
        });

        send(
            writer,
            &Reply::Accepted {
                job_name: job_name.clone(),
            },
        )?;

        let outcome = JobPoller::new(self.cluster.as_ref(), self.clock.as_ref(), self.settings.poll)
            .poll(&spec);

        let logs = self.fetch_logs(&spec);
        let reply = if outcome.state.is_success() {
            let result = self.filters.filter(request.engine, &logs);
            debug!(job = %job_name, blocks = result.block_count(), "filtered job output");
            Reply::Completed {
                job_name: job_name.clone(),
                result: result.text(),
            }
        } else {
            Reply::Failed {
                job_name: job_name.clone(),
                state: outcome.state.to_string(),
                logs,
            }
        };

        let output_size = match &reply {
            Reply::Completed { result, .. } => result.len(),
            Reply::Failed { logs, .. } => logs.len(),
            _ => 0,
        };
        self.emit(MetricEvent::JobCompleted {
            client_id: client_id.to_string(),
            job_id: job_name.clone(),
            engine: request.engine,
            duration_ms: u64::try_from(
                self.clock.now().saturating_duration_since(started).as_millis(),
            )
            .unwrap_or(u64::MAX),
            status: outcome.state.as_str().to_ascii_lowercase(),
            output_size,
        });

        let sent = send(writer, &reply);
        lease.release();
        sent?;

        Ok(ConnectionOutcome::Finished(outcome.state))
    }

    fn read_and_parse<R: BufRead>(&self, reader: &mut R) -> Result<JobRequest, ProtocolError> {
        let line = read_request(reader, self.settings.max_request_bytes)?;
        debug!(request = %line, "request received");
        parse_request(&line, self.settings.default_engine)
    }

    /// Logs of the job's first pod, or a placeholder when none can be read.
    fn fetch_logs(&self, spec: &JobSpec) -> String {
        let pods = match self.cluster.list_pods(&spec.pod_selector) {
            Ok(pods) => pods,
            Err(e) => {
                warn!(job = %spec.name(), error = %e, "listing job pods failed");
                return format!("[logs unavailable: {}]", e);
            }
        };

        let Some(pod) = pods.first() else {
            warn!(job = %spec.name(), selector = %spec.pod_selector.labels, "no pod found for job");
            return NO_POD_LOGS.to_string();
        };

        match self.cluster.read_logs(pod) {
            Ok(logs) => logs,
            Err(e) => {
                warn!(job = %spec.name(), pod = %pod.name, error = %e, "reading pod logs failed");
                format!("[logs unavailable for pod {}: {}]", pod.name, e)
            }
        }
    }

    fn emit(&self, event: MetricEvent) {
        if let Err(e) = self.metrics.record(&event) {
            warn!(request_type = event.request_type(), error = %e, "metrics sink failed");
        }
    }
}

/// Client socket whose reads all share one deadline.
///
/// Each read waits at most for the time left, so a client trickling bytes
/// cannot hold the connection past the request timeout.
struct RequestStream {
    stream: TcpStream,
    deadline: Instant,
}

impl Read for RequestStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "request deadline passed"));
        }
        self.stream.set_read_timeout(Some(remaining))?;
        self.stream.read(buf)
    }
}

fn send<W: Write>(writer: &mut W, reply: &Reply) -> io::Result<()> {
    writer.write_all(reply.render().as_bytes())?;
    writer.flush()
}
