//! Job specification and pod references.

use serde::{Deserialize, Serialize};

use crate::state::StatusConvention;

/// Routing metadata that uniquely identifies a submitted custom resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    /// API group (e.g. `sparkoperator.k8s.io`).
    pub api_group: String,
    /// API version within the group (e.g. `v1beta2`).
    pub api_version: String,
    /// Namespace the resource lives in.
    pub namespace: String,
    /// Resource kind (e.g. `SparkApplication`).
    pub kind: String,
    /// Plural resource name used in REST paths (e.g. `sparkapplications`).
    pub plural: String,
    /// Resource name, unique per request.
    pub name: String,
}

impl ResourceRef {
    /// REST path of the resource collection.
    pub fn collection_path(&self) -> String {
        format!(
            "/apis/{}/{}/namespaces/{}/{}",
            self.api_group, self.api_version, self.namespace, self.plural
        )
    }

    /// REST path of this resource.
    pub fn item_path(&self) -> String {
        format!("{}/{}", self.collection_path(), self.name)
    }
}

/// Label selector for the pod whose logs carry the job result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodSelector {
    pub namespace: String,
    /// Comma-separated `key=value` label selector.
    pub labels: String,
}

/// A pod found by [`ClusterClient::list_pods`](crate::ClusterClient::list_pods).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodRef {
    pub namespace: String,
    pub name: String,
    /// Pod phase as reported by the API (`Running`, `Succeeded`, ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
}

/// A fully built job, ready for submission.
///
/// Owned by exactly one connection handler for the lifetime of one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSpec {
    /// Where the resource is submitted.
    pub resource: ResourceRef,
    /// Custom resource body posted to the API.
    pub body: serde_json::Value,
    /// Pod carrying the result logs.
    pub pod_selector: PodSelector,
    /// How to read the resource status.
    pub status_convention: StatusConvention,
    /// Engine arguments, in order.
    pub arguments: Vec<String>,
}

impl JobSpec {
    /// Resource name (also the job name shown to clients).
    pub fn name(&self) -> &str {
        &self.resource.name
    }
}
