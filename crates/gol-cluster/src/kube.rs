//! Kubernetes REST implementation of [`ClusterClient`].
//!
//! Talks to the API server directly over HTTPS with a bearer token:
//!
//! - create: `POST   /apis/{group}/{version}/namespaces/{ns}/{plural}`
//! - status: `GET    /apis/{group}/{version}/namespaces/{ns}/{plural}/{name}`
//! - delete: `DELETE /apis/{group}/{version}/namespaces/{ns}/{plural}/{name}`
//! - pods:   `GET    /api/v1/namespaces/{ns}/pods?labelSelector=...`
//! - logs:   `GET    /api/v1/namespaces/{ns}/pods/{pod}/log`

use std::fs;
use std::path::Path;
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::{Method, StatusCode};
use serde_json::{json, Value};

use crate::client::ClusterClient;
use crate::error::ClusterError;
use crate::spec::{JobSpec, PodRef, PodSelector};
use crate::state::JobState;

/// Default location of the mounted service-account credentials.
pub const SERVICE_ACCOUNT_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";

/// Connection settings for the API server.
#[derive(Debug, Clone)]
pub struct KubeConfig {
    /// Base URL, e.g. `https://10.0.0.1:443` or `http://127.0.0.1:8001`.
    pub api_server: String,
    /// Bearer token (omitted when talking through `kubectl proxy`).
    pub token: Option<String>,
    /// PEM bundle used to verify the API server certificate.
    pub ca_cert_pem: Option<Vec<u8>>,
    /// Skip certificate verification entirely.
    pub insecure_skip_tls_verify: bool,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl KubeConfig {
    /// Plain endpoint without credentials.
    pub fn new(api_server: impl Into<String>) -> Self {
        Self {
            api_server: api_server.into(),
            token: None,
            ca_cert_pem: None,
            insecure_skip_tls_verify: false,
            request_timeout: Duration::from_secs(30),
        }
    }

    /// Resolve settings from an optional explicit endpoint and credential files.
    ///
    /// Without an explicit endpoint the in-cluster service address is taken
    /// from `KUBERNETES_SERVICE_HOST` / `KUBERNETES_SERVICE_PORT`. Missing
    /// credential files are skipped.
    pub fn resolve(
        api_server: Option<&str>,
        token_path: &Path,
        ca_cert_path: &Path,
    ) -> Result<Self, ClusterError> {
        let api_server = match api_server {
            Some(url) => url.to_string(),
            None => in_cluster_endpoint()?,
        };

        let token = if token_path.exists() {
            let raw = fs::read_to_string(token_path).map_err(|e| {
                ClusterError::Config(format!("reading {}: {}", token_path.display(), e))
            })?;
            Some(raw.trim().to_string())
        } else {
            None
        };

        let ca_cert_pem = if ca_cert_path.exists() {
            Some(fs::read(ca_cert_path).map_err(|e| {
                ClusterError::Config(format!("reading {}: {}", ca_cert_path.display(), e))
            })?)
        } else {
            None
        };

        Ok(Self {
            token,
            ca_cert_pem,
            ..Self::new(api_server)
        })
    }
}

fn in_cluster_endpoint() -> Result<String, ClusterError> {
    let host = std::env::var("KUBERNETES_SERVICE_HOST").map_err(|_| {
        ClusterError::Config(
            "no api_server configured and KUBERNETES_SERVICE_HOST is not set".to_string(),
        )
    })?;
    let port = std::env::var("KUBERNETES_SERVICE_PORT").unwrap_or_else(|_| "443".to_string());
    // IPv6 service addresses need brackets in URLs.
    if host.contains(':') {
        Ok(format!("https://[{}]:{}", host, port))
    } else {
        Ok(format!("https://{}:{}", host, port))
    }
}

/// Blocking Kubernetes API client.
pub struct KubeClient {
    http: Client,
    config: KubeConfig,
}

impl KubeClient {
    /// Build the HTTP client for the given settings.
    pub fn new(config: KubeConfig) -> Result<Self, ClusterError> {
        let mut builder = Client::builder().timeout(config.request_timeout);

        if let Some(ref pem) = config.ca_cert_pem {
            let cert = reqwest::Certificate::from_pem(pem)
                .map_err(|e| ClusterError::Config(format!("invalid CA certificate: {}", e)))?;
            builder = builder.add_root_certificate(cert);
        }
        if config.insecure_skip_tls_verify {
            builder = builder.danger_accept_invalid_certs(true);
        }

        let http = builder
            .build()
            .map_err(|e| ClusterError::Config(format!("building HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    /// The API server base URL.
    pub fn api_server(&self) -> &str {
        &self.config.api_server
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.config.api_server.trim_end_matches('/'), path);
        let builder = self.http.request(method, url);
        match self.config.token {
            Some(ref token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    fn get_resource(&self, spec: &JobSpec) -> Result<Value, ClusterError> {
        let response = self.request(Method::GET, &spec.resource.item_path()).send()?;
        match response.status() {
            s if s.is_success() => Ok(response.json()?),
            StatusCode::NOT_FOUND => Err(ClusterError::NotFoundYet),
            _ => Err(api_error(response)),
        }
    }
}

/// Extract `(status, message)` from a failed response.
///
/// Kubernetes answers errors with a `Status` object carrying `message`.
fn error_parts(response: Response) -> (u16, String) {
    let status = response.status().as_u16();
    let body = response.text().unwrap_or_default();
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                format!("HTTP {}", status)
            } else {
                trimmed.chars().take(512).collect()
            }
        });
    (status, message)
}

fn api_error(response: Response) -> ClusterError {
    let (status, message) = error_parts(response);
    ClusterError::Api { status, message }
}

impl ClusterClient for KubeClient {
    fn submit(&self, spec: &JobSpec) -> Result<(), ClusterError> {
        let response = self
            .request(Method::POST, &spec.resource.collection_path())
            .json(&spec.body)
            .send()?;
        if response.status().is_success() {
            tracing::debug!(job = %spec.name(), "custom resource created");
            return Ok(());
        }
        let (status, message) = error_parts(response);
        Err(ClusterError::Submission { status, message })
    }

    fn get_status(&self, spec: &JobSpec) -> Result<JobState, ClusterError> {
        let resource = self.get_resource(spec)?;
        Ok(spec.status_convention.interpret(&resource))
    }

    fn list_pods(&self, selector: &PodSelector) -> Result<Vec<PodRef>, ClusterError> {
        let path = format!("/api/v1/namespaces/{}/pods", selector.namespace);
        let response = self
            .request(Method::GET, &path)
            .query(&[("labelSelector", selector.labels.as_str())])
            .send()?;
        if !response.status().is_success() {
            return Err(api_error(response));
        }

        let list: Value = response.json()?;
        let items = list
            .get("items")
            .and_then(Value::as_array)
            .ok_or_else(|| ClusterError::Decode("pod list without items".to_string()))?;

        Ok(items
            .iter()
            .filter_map(|pod| {
                let name = pod.pointer("/metadata/name")?.as_str()?;
                Some(PodRef {
                    namespace: selector.namespace.clone(),
                    name: name.to_string(),
                    phase: pod
                        .pointer("/status/phase")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                })
            })
            .collect())
    }

    fn read_logs(&self, pod: &PodRef) -> Result<String, ClusterError> {
        let path = format!("/api/v1/namespaces/{}/pods/{}/log", pod.namespace, pod.name);
        let response = self.request(Method::GET, &path).send()?;
        match response.status() {
            s if s.is_success() => Ok(response.text()?),
            StatusCode::NOT_FOUND => Err(ClusterError::NotFoundYet),
            _ => Err(api_error(response)),
        }
    }

    fn delete(&self, spec: &JobSpec) -> Result<(), ClusterError> {
        let response = self
            .request(Method::DELETE, &spec.resource.item_path())
            .json(&json!({"propagationPolicy": "Background"}))
            .send()?;
        match response.status() {
            s if s.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Ok(()),
            _ => Err(api_error(response)),
        }
    }
}
