//! HPC backend parameters

use marshal_common::DeviceType;
use marshal_wlm::WorkloadManager;
use serde::{Deserialize, Serialize};

/// Container runtime the launcher starts the job with
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerRuntime {
    /// Singularity or Apptainer
    #[default]
    Singularity,
    /// Podman
    Podman,
}

/// Launcher carrier for a scheduler and container runtime
pub fn carrier(wlm: WorkloadManager, runtime: ContainerRuntime) -> &'static str {
    match (wlm, runtime) {
        (WorkloadManager::Slurm, ContainerRuntime::Singularity) => {
            "com.cray.analytics.capsules.carriers.hpc.slurm.SingularityOverSlurm"
        }
        (WorkloadManager::Slurm, ContainerRuntime::Podman) => {
            "com.cray.analytics.capsules.carriers.hpc.slurm.PodmanOverSlurm"
        }
        (WorkloadManager::Pbs, ContainerRuntime::Singularity) => {
            "com.cray.analytics.capsules.carriers.hpc.pbs.SingularityOverPbs"
        }
        (WorkloadManager::Pbs, ContainerRuntime::Podman) => {
            "com.cray.analytics.capsules.carriers.hpc.pbs.PodmanOverPbs"
        }
    }
}

/// What the dispatcher resource manager knows about the target cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DispatcherParams {
    /// Master address tasks connect back to
    pub master_host: String,
    /// Master port
    pub master_port: u16,
    /// Certificate name the task verifies the master with; empty when TLS is off
    #[serde(default)]
    pub certificate_name: String,
    /// Slots allocated to the task
    pub slots: u32,
    /// Device type of the allocated slots
    #[serde(default)]
    pub slot_type: DeviceType,
    /// Partition (Slurm) or queue (PBS); empty for the scheduler default
    #[serde(default)]
    pub partition: String,
    /// The scheduler tracks GPUs as trackable resources
    #[serde(default)]
    pub tres_supported: bool,
    /// Runtime the launcher starts containers with
    #[serde(default)]
    pub container_runtime: ContainerRuntime,
    /// Scheduler behind the launcher
    #[serde(default)]
    pub workload_manager: WorkloadManager,
    /// Nodes excluded from scheduling
    #[serde(default)]
    pub disabled_nodes: Vec<String>,
    /// Accounting label (`--wckey` / `-P`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_label: Option<String>,
}

impl DispatcherParams {
    /// Parameters for a Slurm cluster running Singularity
    pub fn new(master_host: impl Into<String>, master_port: u16, slots: u32) -> Self {
        Self {
            master_host: master_host.into(),
            master_port,
            certificate_name: String::new(),
            slots,
            slot_type: DeviceType::default(),
            partition: String::new(),
            tres_supported: false,
            container_runtime: ContainerRuntime::default(),
            workload_manager: WorkloadManager::default(),
            disabled_nodes: Vec::new(),
            job_label: None,
        }
    }

    /// Carrier for these parameters
    pub fn carrier(&self) -> &'static str {
        carrier(self.workload_manager, self.container_runtime)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn carrier_per_scheduler_and_runtime() {
        assert!(carrier(WorkloadManager::Slurm, ContainerRuntime::Podman)
            .ends_with("PodmanOverSlurm"));
        assert!(carrier(WorkloadManager::Pbs, ContainerRuntime::Singularity)
            .ends_with("SingularityOverPbs"));
    }

    #[test]
    fn params_deserialize_with_defaults() {
        let params: DispatcherParams = serde_json::from_str(
            r#"{"master_host": "master", "master_port": 8080, "slots": 4, "slot_type": "cuda",
                "workload_manager": "pbs", "container_runtime": "podman"}"#,
        )
        .unwrap();
        assert_eq!(params.slot_type, DeviceType::Cuda);
        assert_eq!(params.workload_manager, WorkloadManager::Pbs);
        assert!(params.disabled_nodes.is_empty());
        assert_eq!(
            params.carrier(),
            "com.cray.analytics.capsules.carriers.hpc.pbs.PodmanOverPbs"
        );
    }
}
