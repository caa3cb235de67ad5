//! Gateway Scenario Tests
//!
//! Drives the real TCP listener against a mock cluster, a recording metrics
//! sink and a manual clock, so minutes of polling finish instantly.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use gol_cluster::{ClusterOp, FailureConfig, JobState, MockCluster};
use gol_gateway::{
    ConnectionHandler, GatewayConfig, Listener, ManualClock, PollConfig, RecordingSink,
    ShutdownState,
};

struct Gateway {
    addr: SocketAddr,
    cluster: MockCluster,
    metrics: Arc<RecordingSink>,
    shutdown: Arc<ShutdownState>,
    thread: Option<JoinHandle<()>>,
}

impl Gateway {
    fn start(config: GatewayConfig, cluster: MockCluster) -> Self {
        let metrics = Arc::new(RecordingSink::new());
        let handler = ConnectionHandler::new(
            &config,
            Arc::new(cluster.clone()),
            metrics.clone(),
            Arc::new(ManualClock::new()),
        )
        .unwrap();

        let shutdown = Arc::new(ShutdownState::new());
        let listener = Listener::bind(
            "127.0.0.1:0",
            Arc::new(handler),
            Arc::clone(&shutdown),
            Duration::from_millis(config.server.read_timeout_seconds * 1000),
        )
        .unwrap();
        let addr = listener.local_addr().unwrap();
        let thread = thread::spawn(move || listener.run().unwrap());

        Self {
            addr,
            cluster,
            metrics,
            shutdown,
            thread: Some(thread),
        }
    }

    /// Send `request` and read every reply until the server closes.
    fn exchange(&self, request: &str) -> String {
        let mut stream = TcpStream::connect(self.addr).unwrap();
        stream.set_read_timeout(Some(Duration::from_secs(10))).unwrap();
        stream.write_all(request.as_bytes()).unwrap();
        let mut out = String::new();
        stream.read_to_string(&mut out).unwrap();
        out
    }

    /// Stop accepting and wait for in-flight connections.
    fn stop(&mut self) {
        self.shutdown.request_shutdown();
        if let Some(thread) = self.thread.take() {
            thread.join().unwrap();
        }
    }
}

impl Drop for Gateway {
    fn drop(&mut self) {
        self.stop();
    }
}

fn job_name(out: &str) -> String {
    out.strip_prefix("JOB ")
        .and_then(|rest| rest.split_whitespace().next())
        .unwrap_or_default()
        .to_string()
}

#[test]
fn test_default_engine_job_completes_with_filtered_result() {
    let cluster = MockCluster::new();
    cluster.set_progression(vec![JobState::Submitted, JobState::Running, JobState::Completed]);
    cluster.set_logs("24/05/01 INFO boot\n=== RESULT ===\n1,2,1\n2,3,1\n");
    let mut gw = Gateway::start(GatewayConfig::default(), cluster);

    let out = gw.exchange("3,4\n");
    gw.stop();

    let name = job_name(&out);
    assert!(name.starts_with("gol-spark-"), "reply: {}", out);
    assert_eq!(
        out,
        format!(
            "JOB {0} created, awaiting completion...\n\
             Job {0} completed successfully\nResult:\n1,2,1\n2,3,1\n",
            name
        )
    );

    let submitted = gw.cluster.submitted();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].arguments, vec!["3", "4"]);
    assert_eq!(submitted[0].resource.kind, "SparkApplication");
    assert_eq!(gw.cluster.calls_for(ClusterOp::Delete, &name), 1);
    assert!(gw.cluster.live_resources().is_empty());
}

#[test]
fn test_mpi_timeout_deletes_exactly_once() {
    let cluster = MockCluster::new();
    cluster.set_progression(vec![JobState::Running]);
    let mut config = GatewayConfig::default();
    config.poll = PollConfig {
        interval_seconds: 10,
        deadline_seconds: 120,
    };
    let mut gw = Gateway::start(config, cluster);

    let out = gw.exchange("mpi,2,2\n");
    gw.stop();

    let name = job_name(&out);
    assert!(name.starts_with("gol-mpi-"), "reply: {}", out);
    assert!(out.contains(&format!("Job {} failed with state 'TIMED_OUT'", name)));

    let submitted = gw.cluster.submitted();
    assert_eq!(submitted[0].resource.kind, "MPIJob");
    assert_eq!(submitted[0].arguments, vec!["2", "2"]);
    let replicas = &submitted[0].body["spec"]["mpiReplicaSpecs"];
    assert_eq!(replicas["Launcher"]["replicas"], 1);
    assert_eq!(replicas["Worker"]["replicas"], 2);

    assert_eq!(gw.cluster.calls_for(ClusterOp::Delete, &name), 1);
    assert_eq!(gw.cluster.call_count(ClusterOp::Delete), 1);
}

#[test]
fn test_invalid_requests_rejected_without_submission() {
    let mut gw = Gateway::start(GatewayConfig::default(), MockCluster::new());

    for request in ["abc\n", "1,2,3,4\n", "4,3\n", "spark,,2\n", "hadoop,1,2\n"] {
        let out = gw.exchange(request);
        assert!(out.starts_with("ERROR INVALID_REQUEST"), "{:?} -> {}", request, out);
        assert!(out.contains("usage:"));
    }
    gw.stop();

    assert_eq!(gw.cluster.call_count(ClusterOp::Submit), 0);
    assert!(gw.cluster.calls().is_empty());
}

#[test]
fn test_oversized_request_rejected() {
    let mut gw = Gateway::start(GatewayConfig::default(), MockCluster::new());

    // One byte over the limit and no newline: the server consumes all of it.
    let request = "9".repeat(1025);
    let out = gw.exchange(&request);
    gw.stop();

    assert!(out.starts_with("ERROR REQUEST_TOO_LARGE"), "{}", out);
    assert_eq!(gw.cluster.call_count(ClusterOp::Submit), 0);
}

#[test]
fn test_silent_client_times_out() {
    let mut config = GatewayConfig::default();
    config.server.read_timeout_seconds = 1;
    let mut gw = Gateway::start(config, MockCluster::new());

    let mut stream = TcpStream::connect(gw.addr).unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(10))).unwrap();
    let mut out = String::new();
    stream.read_to_string(&mut out).unwrap();
    gw.stop();

    assert!(out.starts_with("ERROR READ_TIMEOUT"), "{}", out);
    assert_eq!(gw.cluster.call_count(ClusterOp::Submit), 0);
}

#[test]
fn test_trickling_client_cut_off_at_request_deadline() {
    let mut config = GatewayConfig::default();
    config.server.read_timeout_seconds = 1;
    let mut gw = Gateway::start(config, MockCluster::new());

    let mut stream = TcpStream::connect(gw.addr).unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(10))).unwrap();
    let mut writer = stream.try_clone().unwrap();
    // One byte every 200ms for 4s: every single read finishes well within
    // the timeout, only the whole request does not.
    let trickle = thread::spawn(move || {
        for _ in 0..20 {
            if writer.write_all(b"1").is_err() {
                break;
            }
            thread::sleep(Duration::from_millis(200));
        }
    });

    let started = Instant::now();
    let mut buf = [0u8; 256];
    loop {
        match stream.read(&mut buf) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
    }
    let closed_after = started.elapsed();
    trickle.join().unwrap();
    gw.stop();

    assert!(
        closed_after < Duration::from_millis(2500),
        "connection held for {:?}",
        closed_after
    );
    assert_eq!(gw.cluster.call_count(ClusterOp::Submit), 0);
}

#[test]
fn test_submission_failure_reported_and_not_deleted() {
    let cluster = MockCluster::new();
    cluster.inject_failure(
        ClusterOp::Submit,
        FailureConfig::error(422, "admission webhook denied the request"),
    );
    let mut gw = Gateway::start(GatewayConfig::default(), cluster);

    let out = gw.exchange("3,4\n");
    gw.stop();

    assert!(out.starts_with("ERROR job submission failed"), "{}", out);
    assert!(out.contains("admission webhook denied"));
    assert_eq!(gw.cluster.call_count(ClusterOp::Delete), 0);
}

#[test]
fn test_missing_pod_gives_placeholder_and_cleans_up() {
    let cluster = MockCluster::new();
    cluster.set_progression(vec![JobState::Failed]);
    cluster.remove_pods();
    let mut gw = Gateway::start(GatewayConfig::default(), cluster);

    let out = gw.exchange("1,1\n");
    gw.stop();

    assert!(out.contains("failed with state 'FAILED'\nLogs:\n[no pod found for job]\n"));
    assert_eq!(gw.cluster.call_count(ClusterOp::Delete), 1);
}

#[test]
fn test_client_disconnect_still_cleans_up() {
    let cluster = MockCluster::new();
    cluster.set_progression(vec![JobState::Running, JobState::Running, JobState::Completed]);
    let mut gw = Gateway::start(GatewayConfig::default(), cluster);

    {
        let mut stream = TcpStream::connect(gw.addr).unwrap();
        stream.write_all(b"3,4\n").unwrap();
    }
    // Draining joins the handler, which must have deleted its job.
    thread::sleep(Duration::from_millis(200));
    gw.stop();

    assert_eq!(gw.cluster.call_count(ClusterOp::Submit), 1);
    assert_eq!(gw.cluster.call_count(ClusterOp::Delete), 1);
    assert!(gw.cluster.live_resources().is_empty());
}

#[test]
fn test_metrics_recorded_per_connection() {
    let cluster = MockCluster::new();
    cluster.set_logs("=== RESULT ===\n0,0,1\n");
    let mut gw = Gateway::start(GatewayConfig::default(), cluster);

    gw.exchange("2,3\n");
    gw.exchange("bad\n");
    gw.stop();

    assert_eq!(gw.metrics.events_of("client_connection").len(), 2);
    assert_eq!(gw.metrics.events_of("client_disconnection").len(), 2);
    assert_eq!(gw.metrics.events_of("job_start").len(), 1);
    assert_eq!(gw.metrics.events_of("job_completion").len(), 1);
}

#[test]
fn test_shutdown_stops_accepting() {
    let mut gw = Gateway::start(GatewayConfig::default(), MockCluster::new());
    let addr = gw.addr;
    gw.stop();

    assert!(TcpStream::connect(addr).is_err());
}
