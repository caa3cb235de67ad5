//! MPI/OpenMP engine template (Kubeflow `MPIJob`, launcher + workers).

use gol_cluster::{JobSpec, PodSelector, ResourceRef, StatusConvention};
use gol_protocol::JobRequest;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::common_labels;
use crate::job::JobId;

pub const API_GROUP: &str = "kubeflow.org";
pub const API_VERSION: &str = "v2beta1";
pub const KIND: &str = "MPIJob";
pub const PLURAL: &str = "mpijobs";

const JOB_NAME_LABEL: &str = "training.kubeflow.org/job-name";
const JOB_ROLE_LABEL: &str = "training.kubeflow.org/job-role";

/// MPI job settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MpiTemplate {
    pub enabled: bool,
    pub namespace: String,
    pub image: String,
    /// Engine binary inside the image, run by `mpirun`.
    pub binary: String,
    /// Worker replicas; also the `mpirun -np` process count.
    pub workers: u32,
    pub slots_per_worker: u32,
    pub omp_threads: u32,
    pub cpu_limit: String,
    pub memory_limit: String,
    pub service_account: Option<String>,
    /// Regex for the per-size verdict line the engine prints.
    pub result_marker: String,
    /// Keep the verdict line at the head of each result block.
    pub keep_marker: bool,
}

impl Default for MpiTemplate {
    fn default() -> Self {
        Self {
            enabled: true,
            namespace: "mpi".to_string(),
            image: "life-mpi-omp:latest".to_string(),
            binary: "/app/life_mpi_omp".to_string(),
            workers: 2,
            slots_per_worker: 1,
            omp_threads: 2,
            cpu_limit: "2".to_string(),
            memory_limit: "1Gi".to_string(),
            service_account: None,
            result_marker: r"(?m)^\*\*RESULTADO (?:CORRETO|ERRADO)\*\*".to_string(),
            keep_marker: true,
        }
    }
}

impl MpiTemplate {
    pub fn build(&self, request: &JobRequest, job_id: &JobId) -> JobSpec {
        let name = job_id.resource_name(request.engine);
        let arguments = request.arguments();
        let labels = common_labels(job_id);

        let mut launcher_args = vec![
            "-np".to_string(),
            self.workers.to_string(),
            self.binary.clone(),
        ];
        launcher_args.extend(arguments.iter().cloned());

        let omp_env = json!([{ "name": "OMP_NUM_THREADS", "value": self.omp_threads.to_string() }]);
        let limits = json!({ "cpu": self.cpu_limit, "memory": self.memory_limit });

        let mut launcher_pod = json!({
            "containers": [{
                "name": "launcher",
                "image": self.image,
                "imagePullPolicy": "IfNotPresent",
                "command": ["mpirun"],
                "args": launcher_args,
                "env": omp_env,
            }],
        });
        let mut worker_pod = json!({
            "containers": [{
                "name": "worker",
                "image": self.image,
                "imagePullPolicy": "IfNotPresent",
                "env": omp_env,
                "resources": { "limits": limits },
            }],
        });
        if let Some(account) = &self.service_account {
            launcher_pod["serviceAccountName"] = json!(account);
            worker_pod["serviceAccountName"] = json!(account);
        }

        let body = json!({
            "apiVersion": format!("{}/{}", API_GROUP, API_VERSION),
            "kind": KIND,
            "metadata": {
                "name": name,
                "namespace": self.namespace,
                "labels": labels,
            },
            "spec": {
                "slotsPerWorker": self.slots_per_worker,
                "mpiImplementation": "OpenMPI",
                "runPolicy": {
                    "cleanPodPolicy": "Running",
                    "backoffLimit": 0,
                },
                "mpiReplicaSpecs": {
                    "Launcher": {
                        "replicas": 1,
                        "restartPolicy": "Never",
                        "template": {
                            "metadata": { "labels": labels },
                            "spec": launcher_pod,
                        },
                    },
                    "Worker": {
                        "replicas": self.workers,
                        "restartPolicy": "Never",
                        "template": {
                            "metadata": { "labels": labels },
                            "spec": worker_pod,
                        },
                    },
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
                labels: format!("{}={},{}=launcher", JOB_NAME_LABEL, name, JOB_ROLE_LABEL),
            },
            status_convention: StatusConvention::KubeflowConditions,
            arguments,
        }
    }
}
