//! The closed set of task kinds

use std::collections::BTreeMap;

use marshal_archive::RunArchive;
use marshal_common::{AgentUserGroup, BindMount, EnvironmentConfig, ResourcesConfig};

use crate::command::CommandTask;
use crate::gc::CheckpointGcTask;
use crate::generic::GenericTask;
use crate::kind::TaskKind;
use crate::trial::TrialTask;

/// One of the task kinds the cluster launches
#[derive(Debug, Clone)]
pub enum TaskVariant {
    /// Command, notebook, shell, or tensorboard
    Command(CommandTask),
    /// Trial run
    Trial(TrialTask),
    /// Checkpoint garbage collection
    CheckpointGc(CheckpointGcTask),
    /// Generic task
    Generic(GenericTask),
}

impl TaskVariant {
    fn inner(&self) -> &dyn TaskKind {
        match self {
            Self::Command(task) => task,
            Self::Trial(task) => task,
            Self::CheckpointGc(task) => task,
            Self::Generic(task) => task,
        }
    }
}

impl TaskKind for TaskVariant {
    fn archives(&self, owner: &AgentUserGroup, work_dir: &str) -> Vec<RunArchive> {
        self.inner().archives(owner, work_dir)
    }

    fn description(&self) -> String {
        self.inner().description()
    }

    fn entrypoint(&self) -> Vec<String> {
        self.inner().entrypoint()
    }

    fn environment(&self, base: &EnvironmentConfig) -> EnvironmentConfig {
        self.inner().environment(base)
    }

    fn env_vars(&self, base: &BTreeMap<String, String>) -> BTreeMap<String, String> {
        self.inner().env_vars(base)
    }

    fn mounts(&self) -> Vec<BindMount> {
        self.inner().mounts()
    }

    fn shm_size(&self) -> i64 {
        self.inner().shm_size()
    }

    fn use_fluent_logging(&self) -> bool {
        self.inner().use_fluent_logging()
    }

    fn use_host_mode(&self) -> bool {
        self.inner().use_host_mode()
    }

    fn resources_config(&self) -> ResourcesConfig {
        self.inner().resources_config()
    }

    fn logging_fields(&self) -> BTreeMap<String, String> {
        self.inner().logging_fields()
    }
}

impl From<CommandTask> for TaskVariant {
    fn from(task: CommandTask) -> Self {
        Self::Command(task)
    }
}

impl From<TrialTask> for TaskVariant {
    fn from(task: TrialTask) -> Self {
        Self::Trial(task)
    }
}

impl From<CheckpointGcTask> for TaskVariant {
    fn from(task: CheckpointGcTask) -> Self {
        Self::CheckpointGc(task)
    }
}

impl From<GenericTask> for TaskVariant {
    fn from(task: GenericTask) -> Self {
        Self::Generic(task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::CheckpointStorage;

    #[test]
    fn delegates_to_selected_kind() {
        let gc = CheckpointGcTask::new(
            3,
            CheckpointStorage::Directory {
                container_path: "/ckpt".to_string(),
            },
            vec![],
        )
        .unwrap();
        let variant = TaskVariant::from(gc.clone());

        assert_eq!(variant.description(), gc.description());
        assert_eq!(variant.entrypoint(), gc.entrypoint());
        assert_eq!(variant.resources_config(), gc.resources_config());
        assert!(variant.mounts().is_empty());
    }
}
