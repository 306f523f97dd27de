//! The resolved task spec handed to backend translators

use std::collections::BTreeMap;
use std::sync::Arc;

use marshal_archive::{Archive, Item, ItemKind, RunArchive};
use marshal_common::{
    AgentUserGroup, BindMount, Device, DeviceType, EnvironmentConfig, PbsConfig, ResourcesConfig,
    SlurmConfig, TaskContainerDefaults, DEFAULT_WORK_DIR, MASTER_CERT_PATH, RUN_DIR,
};

use crate::assets::Script;
use crate::harness::HarnessArchive;
use crate::kind::TaskKind;
use crate::variant::TaskVariant;

/// Everything needed to launch one task on any backend.
///
/// Built fresh for each launch, consumed by exactly one translator call, and
/// never modified in between. Kind-specific answers come from `kind`; the
/// accessors below combine them with the fields every task shares.
#[derive(Debug, Clone)]
pub struct TaskSpec<K = TaskVariant> {
    /// Task id
    pub task_id: String,
    /// Allocation id
    pub allocation_id: String,
    /// Token the task uses to talk back to the master
    pub allocation_session_token: String,
    /// Cluster id
    pub cluster_id: String,
    /// Container id assigned for this launch
    pub container_id: String,
    /// Devices assigned to the task
    pub devices: Vec<Device>,
    /// Identity the task runs as
    pub owner: AgentUserGroup,
    /// Cluster base environment
    pub base_environment: EnvironmentConfig,
    /// Cluster container defaults
    pub task_container_defaults: TaskContainerDefaults,
    /// Container working directory
    pub work_dir: String,
    /// Extra variables applied before the kind's overlay
    pub extra_env_vars: BTreeMap<String, String>,
    /// Extra archives, materialized after all others
    pub extra_archives: Vec<RunArchive>,
    /// Harness wheels
    pub harness: Option<Arc<HarnessArchive>>,
    /// Master TLS certificate (PEM)
    pub master_cert: Option<Vec<u8>>,
    /// Task Slurm options
    pub slurm: SlurmConfig,
    /// Task PBS options
    pub pbs: PbsConfig,
    /// The task kind
    pub kind: K,
}

impl<K> TaskSpec<K> {
    /// Spec for `kind` with empty ids, a root owner, and cluster defaults
    pub fn new(kind: K) -> Self {
        Self {
            task_id: String::new(),
            allocation_id: String::new(),
            allocation_session_token: String::new(),
            cluster_id: String::new(),
            container_id: String::new(),
            devices: Vec::new(),
            owner: AgentUserGroup::default(),
            base_environment: EnvironmentConfig::default(),
            task_container_defaults: TaskContainerDefaults::default(),
            work_dir: DEFAULT_WORK_DIR.to_string(),
            extra_env_vars: BTreeMap::new(),
            extra_archives: Vec::new(),
            harness: None,
            master_cert: None,
            slurm: SlurmConfig::default(),
            pbs: PbsConfig::default(),
            kind,
        }
    }

    /// Device type of the first assigned device, or CPU when there are none
    pub fn device_type(&self) -> DeviceType {
        self.devices
            .first()
            .map(|d| d.device_type)
            .unwrap_or_default()
    }

    /// Slurm options: cluster defaults, then the task's own
    pub fn slurm_args(&self) -> Vec<String> {
        let defaults = &self.task_container_defaults.slurm.sbatch_args;
        defaults.iter().chain(&self.slurm.sbatch_args).cloned().collect()
    }

    /// PBS options: cluster defaults, then the task's own
    pub fn pbs_args(&self) -> Vec<String> {
        let defaults = &self.task_container_defaults.pbs.pbsbatch_args;
        defaults.iter().chain(&self.pbs.pbsbatch_args).cloned().collect()
    }

    /// GPU type from the task's Slurm options, else the cluster's
    pub fn gpu_type(&self) -> Option<&str> {
        self.slurm
            .gpu_type
            .as_deref()
            .or(self.task_container_defaults.slurm.gpu_type.as_deref())
    }

    /// Variables every task gets, before the kind's overlay
    fn base_env_vars(&self) -> BTreeMap<String, String> {
        let use_gpu = self.devices.iter().any(|d| d.device_type.is_gpu());

        let mut vars = BTreeMap::from([
            ("DET_CLUSTER_ID".to_string(), self.cluster_id.clone()),
            ("DET_TASK_ID".to_string(), self.task_id.clone()),
            ("DET_ALLOCATION_ID".to_string(), self.allocation_id.clone()),
            (
                "DET_SESSION_TOKEN".to_string(),
                self.allocation_session_token.clone(),
            ),
            ("DET_CONTAINER_ID".to_string(), self.container_id.clone()),
            ("DET_USE_GPU".to_string(), use_gpu.to_string()),
            ("DET_USER".to_string(), self.owner.user.clone()),
        ]);
        if self.master_cert.is_some() {
            vars.insert(
                "DET_MASTER_CERT_FILE".to_string(),
                MASTER_CERT_PATH.to_string(),
            );
        }
        vars.extend(self.extra_env_vars.clone());
        vars.insert("DET_WORKDIR".to_string(), self.work_dir.clone());
        vars
    }

    /// Archives every task gets, before the kind's own
    fn base_archives(&self) -> Vec<RunArchive> {
        let mut archives = vec![
            Archive::new(vec![self
                .owner
                .owned_item(self.work_dir.as_str(), ItemKind::Directory, 0o700)])
            .mounted_at("/"),
            Archive::new(vec![
                Script::TaskLoggingSetup.item_at(Script::TaskLoggingSetup.name()),
                Script::TaskLoggingTeardown.item_at(Script::TaskLoggingTeardown.name()),
                Script::TaskSignalHandling.item_at(Script::TaskSignalHandling.name()),
            ])
            .mounted_at(RUN_DIR),
        ];

        if let Some(harness) = &self.harness {
            archives.push(harness.run_archive());
        }
        if let Some(cert) = &self.master_cert {
            archives.push(
                Archive::new(vec![Item::root_owned(
                    MASTER_CERT_PATH,
                    ItemKind::file(cert.clone()),
                    0o644,
                )])
                .mounted_at("/"),
            );
        }
        archives
    }
}

impl<K: TaskKind> TaskSpec<K> {
    /// Task description
    pub fn description(&self) -> String {
        self.kind.description()
    }

    /// Container entrypoint argv
    pub fn entrypoint(&self) -> Vec<String> {
        self.kind.entrypoint()
    }

    /// The kind's environment layered over the cluster base
    pub fn environment(&self) -> EnvironmentConfig {
        self.kind.environment(&self.base_environment)
    }

    /// Base variables with the kind's overlay applied
    pub fn env_vars(&self) -> BTreeMap<String, String> {
        self.kind.env_vars(&self.base_env_vars())
    }

    /// All archives in materialization order: base, kind, then extras
    pub fn archives(&self) -> Vec<RunArchive> {
        let mut archives = self.base_archives();
        archives.extend(self.kind.archives(&self.owner, &self.work_dir));
        archives.extend(self.extra_archives.iter().cloned());
        archives
    }

    /// Bind mounts with relative container paths resolved against the work directory
    pub fn mounts(&self) -> Vec<BindMount> {
        self.kind
            .mounts()
            .iter()
            .map(|m| m.resolved(&self.work_dir))
            .collect()
    }

    /// Shared memory size: the kind's override, else the cluster default
    pub fn shm_size(&self) -> i64 {
        match self.kind.shm_size() {
            size if size > 0 => size,
            _ => self.task_container_defaults.shm_size_bytes,
        }
    }

    /// Ship output through the fluent log driver
    pub fn use_fluent_logging(&self) -> bool {
        self.kind.use_fluent_logging()
    }

    /// Run on the host network
    pub fn use_host_mode(&self) -> bool {
        self.kind.use_host_mode()
    }

    /// Resources the task asked for
    pub fn resources_config(&self) -> ResourcesConfig {
        self.kind.resources_config()
    }

    /// Task ids plus the kind's logging fields
    pub fn logging_fields(&self) -> BTreeMap<String, String> {
        let mut fields = BTreeMap::from([
            ("task_id".to_string(), self.task_id.clone()),
            ("allocation_id".to_string(), self.allocation_id.clone()),
        ]);
        fields.extend(self.kind.logging_fields());
        fields
    }
}
