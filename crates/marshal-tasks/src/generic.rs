//! Generic tasks: a user entrypoint with the user's files

use std::collections::BTreeMap;

use marshal_archive::{path, Archive, RunArchive};
use marshal_common::{
    AgentUserGroup, BindMount, EnvironmentConfig, ResourcesConfig, RUN_DIR,
};

use crate::assets::Script;
use crate::kind::{overlay_env_vars, TaskKind};

/// An arbitrary user entrypoint run with the command entrypoint script
#[derive(Debug, Clone)]
pub struct GenericTask {
    /// Description shown to users
    pub description: String,
    /// User argv
    pub entrypoint: Vec<String>,
    /// Task environment
    pub environment: EnvironmentConfig,
    /// Task resources
    pub resources: ResourcesConfig,
    /// Task bind mounts
    pub bind_mounts: Vec<BindMount>,
    /// Context directory files, copied into the work directory
    pub user_files: Archive,
    /// Ship output through the fluent log driver
    pub fluent_logging: bool,
}

impl GenericTask {
    fn entrypoint_path() -> String {
        path::join(RUN_DIR, Script::CommandEntrypoint.name())
    }
}

impl TaskKind for GenericTask {
    fn archives(&self, _owner: &AgentUserGroup, work_dir: &str) -> Vec<RunArchive> {
        vec![
            Archive::new(vec![Script::CommandEntrypoint.item_at(Self::entrypoint_path())])
                .mounted_at("/"),
            self.user_files.clone().mounted_at(work_dir),
        ]
    }

    fn description(&self) -> String {
        self.description.clone()
    }

    fn entrypoint(&self) -> Vec<String> {
        std::iter::once(Self::entrypoint_path())
            .chain(self.entrypoint.iter().cloned())
            .collect()
    }

    fn environment(&self, base: &EnvironmentConfig) -> EnvironmentConfig {
        base.merged(&self.environment)
    }

    fn env_vars(&self, base: &BTreeMap<String, String>) -> BTreeMap<String, String> {
        overlay_env_vars(base, [("DET_TASK_TYPE", "GENERIC")])
    }

    fn mounts(&self) -> Vec<BindMount> {
        self.bind_mounts.clone()
    }

    fn shm_size(&self) -> i64 {
        self.resources.shm_size.unwrap_or(0)
    }

    fn use_fluent_logging(&self) -> bool {
        self.fluent_logging
    }

    fn use_host_mode(&self) -> bool {
        false
    }

    fn resources_config(&self) -> ResourcesConfig {
        self.resources.clone()
    }

    fn logging_fields(&self) -> BTreeMap<String, String> {
        BTreeMap::from([("task_type".to_string(), "GENERIC".to_string())])
    }
}
