//! ElasticsearchSink Tests
//!
//! Runs the sink against a canned HTTP responder, one connection per request.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use gol_gateway::metrics::MetricsError;
use gol_gateway::{ElasticsearchSink, MetricEvent, MetricsSink};
use gol_protocol::EngineKind;

#[derive(Debug, Clone)]
struct SeenRequest {
    method: String,
    path: String,
    body: String,
}

fn serve(responses: Vec<(u16, &'static str)>) -> (String, Arc<Mutex<Vec<SeenRequest>>>, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = Arc::clone(&seen);

    let handle = thread::spawn(move || {
        for (status, body) in responses {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());

            let mut request_line = String::new();
            reader.read_line(&mut request_line).unwrap();
            let mut parts = request_line.split_whitespace();
            let method = parts.next().unwrap_or_default().to_string();
            let path = parts.next().unwrap_or_default().to_string();

            let mut content_length = 0usize;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                let line = line.trim_end();
                if line.is_empty() {
                    break;
                }
                if let Some((name, value)) = line.split_once(':') {
                    if name.trim().eq_ignore_ascii_case("content-length") {
                        content_length = value.trim().parse().unwrap();
                    }
                }
            }
            let mut request_body = vec![0u8; content_length];
            reader.read_exact(&mut request_body).unwrap();

            seen_clone.lock().unwrap().push(SeenRequest {
                method: method.clone(),
                path,
                body: String::from_utf8(request_body).unwrap(),
            });

            // HEAD responses carry headers only.
            let payload = if method == "HEAD" { "" } else { body };
            let mut stream = stream;
            write!(
                stream,
                "HTTP/1.1 {} Canned\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                if method == "HEAD" { body.len() } else { payload.len() },
                payload
            )
            .unwrap();
            stream.flush().unwrap();
        }
    });

    (base, seen, handle)
}

fn sink(base: &str) -> ElasticsearchSink {
    ElasticsearchSink::new(base, "game-of-life-metrics", Duration::from_secs(5)).unwrap()
}

#[test]
fn test_ensure_index_creates_missing_index() {
    let (base, seen, handle) = serve(vec![(404, ""), (200, r#"{"acknowledged":true}"#)]);

    assert!(sink(&base).ensure_index().unwrap());
    handle.join().unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen[0].method, "HEAD");
    assert_eq!(seen[0].path, "/game-of-life-metrics");
    assert_eq!(seen[1].method, "PUT");
    let mapping: serde_json::Value = serde_json::from_str(&seen[1].body).unwrap();
    assert_eq!(mapping["mappings"]["properties"]["client_id"]["type"], "keyword");
}

#[test]
fn test_ensure_index_existing() {
    let (base, seen, handle) = serve(vec![(200, "")]);

    assert!(!sink(&base).ensure_index().unwrap());
    handle.join().unwrap();
    assert_eq!(seen.lock().unwrap().len(), 1);
}

#[test]
fn test_record_posts_document() {
    let (base, seen, handle) = serve(vec![(201, r#"{"result":"created"}"#)]);

    let event = MetricEvent::JobStarted {
        client_id: "10.1.2.3:40000".to_string(),
        job_id: "gol-spark-01hzy3v6k8q2m4n5p7r9s0t1wx".to_string(),
        engine: EngineKind::Spark,
        grid_size: 4,
        iterations: 2,
    };
    sink(&base).record(&event).unwrap();
    handle.join().unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen[0].method, "POST");
    assert_eq!(seen[0].path, "/game-of-life-metrics/_doc");
    let doc: serde_json::Value = serde_json::from_str(&seen[0].body).unwrap();
    assert_eq!(doc["request_type"], "job_start");
    assert_eq!(doc["client_id"], "10.1.2.3:40000");
    assert_eq!(doc["engine_type"], "spark");
    assert!(doc["timestamp"].as_str().unwrap().contains('T'));
}

#[test]
fn test_record_rejection_carries_reason() {
    let (base, _seen, handle) = serve(vec![(
        400,
        r#"{"error":{"reason":"mapper_parsing_exception"},"status":400}"#,
    )]);

    let event = MetricEvent::ConnectionClosed {
        client_id: "c".to_string(),
    };
    let err = sink(&base).record(&event).unwrap_err();
    handle.join().unwrap();

    match err {
        MetricsError::Rejected { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "mapper_parsing_exception");
        }
        other => panic!("expected rejection, got {:?}", other),
    }
}
