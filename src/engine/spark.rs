//! Spark engine template (SparkApplication via the Spark operator).

use gol_cluster::{JobSpec, PodSelector, ResourceRef, StatusConvention};
use gol_protocol::JobRequest;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::common_labels;
use crate::job::JobId;

pub const API_GROUP: &str = "sparkoperator.k8s.io";
pub const API_VERSION: &str = "v1beta2";
pub const KIND: &str = "SparkApplication";
pub const PLURAL: &str = "sparkapplications";

/// Spark application settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SparkTemplate {
    pub enabled: bool,
    pub namespace: String,
    pub image: String,
    /// Python entrypoint inside the image.
    pub main_application_file: String,
    pub spark_version: String,
    pub service_account: String,
    pub driver_cores: u32,
    pub driver_memory: String,
    pub executor_cores: u32,
    pub executor_memory: String,
    pub executor_instances: u32,
    /// Regex marking the start of each result block in the driver log.
    /// The driver must print this line before its result cells.
    pub result_marker: String,
    pub keep_marker: bool,
}

impl Default for SparkTemplate {
    fn default() -> Self {
        Self {
            enabled: true,
            namespace: "spark".to_string(),
            image: "life-spark:latest".to_string(),
            main_application_file: "local:///app/game_of_life_spark.py".to_string(),
            spark_version: "3.5.0".to_string(),
            service_account: "spark".to_string(),
            driver_cores: 1,
            driver_memory: "1g".to_string(),
            executor_cores: 1,
            executor_memory: "1g".to_string(),
            executor_instances: 2,
            result_marker: "=== RESULT ===".to_string(),
            keep_marker: false,
        }
    }
}

impl SparkTemplate {
    pub fn build(&self, request: &JobRequest, job_id: &JobId) -> JobSpec {
        let name = job_id.resource_name(request.engine);
        let arguments = request.arguments();
        let labels = common_labels(job_id);

        let body = json!({
            "apiVersion": format!("{}/{}", API_GROUP, API_VERSION),
            "kind": KIND,
            "metadata": {
                "name": name,
                "namespace": self.namespace,
                "labels": labels,
            },
            "spec": {
                "type": "Python",
                "pythonVersion": "3",
                "mode": "cluster",
                "image": self.image,
                "imagePullPolicy": "IfNotPresent",
                "mainApplicationFile": self.main_application_file,
                "sparkVersion": self.spark_version,
                "arguments": arguments,
                "restartPolicy": { "type": "Never" },
                "driver": {
                    "cores": self.driver_cores,
                    "memory": self.driver_memory,
                    "serviceAccount": self.service_account,
                    "labels": labels,
                },
                "executor": {
                    "cores": self.executor_cores,
                    "memory": self.executor_memory,
                    "instances": self.executor_instances,
                    "labels": labels,
                },
            },
        });

        JobSpec {
            resource: ResourceRef {
                api_group: API_GROUP.to_string(),
                api_version: API_VERSION.to_string(),
                namespace: self.namespace.clone(),
                kind: KIND.to_string(),
                plural: PLURAL.to_string(),
                name: name.clone(),
            },
            body,
            pod_selector: PodSelector {
                namespace: self.namespace.clone(),
                labels: format!("{}/app-name={},spark-role=driver", API_GROUP, name),
            },
            status_convention: StatusConvention::SparkApplicationState,
            arguments,
        }
    }
}
