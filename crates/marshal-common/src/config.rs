//! Cluster-wide task container defaults and scheduler pass-through options

use serde::{Deserialize, Serialize};

/// Shared memory size used when neither task nor cluster overrides it (4 GiB)
pub const DEFAULT_SHM_SIZE_BYTES: i64 = 4 * 1024 * 1024 * 1024;

/// Container network mode used when the task does not ask for the host network
pub const DEFAULT_NETWORK_MODE: &str = "bridge";

/// Raw Slurm options and GPU type
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlurmConfig {
    /// Options forwarded to `sbatch`
    #[serde(default)]
    pub sbatch_args: Vec<String>,
    /// GPU type requested from the launcher
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpu_type: Option<String>,
}

/// Raw PBS options
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PbsConfig {
    /// Options forwarded to `qsub`
    #[serde(default)]
    pub pbsbatch_args: Vec<String>,
}

/// Defaults applied to every task container in the cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskContainerDefaults {
    /// Shared memory size in bytes
    pub shm_size_bytes: i64,
    /// Docker network mode
    pub network_mode: String,
    /// Slurm options prepended to every job's own
    pub slurm: SlurmConfig,
    /// PBS options prepended to every job's own
    pub pbs: PbsConfig,
}

impl Default for TaskContainerDefaults {
    fn default() -> Self {
        Self {
            shm_size_bytes: DEFAULT_SHM_SIZE_BYTES,
            network_mode: DEFAULT_NETWORK_MODE.to_string(),
            slurm: SlurmConfig::default(),
            pbs: PbsConfig::default(),
        }
    }
}
