//! Checkpoint garbage collection

use std::collections::BTreeMap;

use marshal_archive::{path, Archive, ItemKind, RunArchive};
use marshal_common::{
    AgentUserGroup, BindMount, EnvironmentConfig, ResourcesConfig, CHECKPOINT_GC_DIR,
};
use uuid::Uuid;

use crate::assets::Script;
use crate::error::TaskError;
use crate::kind::{overlay_env_vars, TaskKind};
use crate::storage::CheckpointStorage;

const STORAGE_CONFIG_FILE: &str = "storage_config.json";
const CHECKPOINTS_TO_DELETE_FILE: &str = "checkpoints_to_delete.json";

/// Deletes checkpoints (or files matching globs inside them) for one experiment.
///
/// The JSON inputs are rendered once in [`new`](Self::new), so building the
/// task's archives cannot fail later.
#[derive(Debug, Clone)]
pub struct CheckpointGcTask {
    experiment_id: i32,
    storage: CheckpointStorage,
    to_delete: Vec<Uuid>,
    globs: Vec<String>,
    delete_tensorboards: bool,
    environment: EnvironmentConfig,
    storage_json: Vec<u8>,
    to_delete_json: Vec<u8>,
}

impl CheckpointGcTask {
    /// GC task for `to_delete` in `storage`
    pub fn new(
        experiment_id: i32,
        storage: CheckpointStorage,
        to_delete: Vec<Uuid>,
    ) -> Result<Self, TaskError> {
        let storage_json = serde_json::to_vec(&storage).map_err(|source| TaskError::Serialize {
            what: "checkpoint storage config",
            source,
        })?;
        let to_delete_json =
            serde_json::to_vec(&to_delete).map_err(|source| TaskError::Serialize {
                what: "checkpoint delete list",
                source,
            })?;

        Ok(Self {
            experiment_id,
            storage,
            to_delete,
            globs: Vec::new(),
            delete_tensorboards: false,
            environment: EnvironmentConfig::default(),
            storage_json,
            to_delete_json,
        })
    }

    /// Only delete files matching these globs inside each checkpoint
    pub fn with_globs(mut self, globs: Vec<String>) -> Self {
        self.globs = globs;
        self
    }

    /// Also delete the experiment's tensorboard files
    pub fn with_delete_tensorboards(mut self, delete: bool) -> Self {
        self.delete_tensorboards = delete;
        self
    }

    /// Environment layered over the cluster base
    pub fn with_environment(mut self, environment: EnvironmentConfig) -> Self {
        self.environment = environment;
        self
    }

    /// Checkpoints to delete
    pub fn to_delete(&self) -> &[Uuid] {
        &self.to_delete
    }
}

impl TaskKind for CheckpointGcTask {
    fn archives(&self, owner: &AgentUserGroup, _work_dir: &str) -> Vec<RunArchive> {
        let gc = Archive::new(vec![
            owner.owned_item(STORAGE_CONFIG_FILE, ItemKind::file(self.storage_json.clone()), 0o600),
            owner.owned_item(
                CHECKPOINTS_TO_DELETE_FILE,
                ItemKind::file(self.to_delete_json.clone()),
                0o600,
            ),
            Script::GcCheckpointsEntrypoint.item_at(Script::GcCheckpointsEntrypoint.name()),
        ]);
        vec![gc.mounted_at(CHECKPOINT_GC_DIR)]
    }

    fn description(&self) -> String {
        format!("checkpoint-gc-exp-{}", self.experiment_id)
    }

    fn entrypoint(&self) -> Vec<String> {
        let in_gc_dir = |name: &str| path::join(CHECKPOINT_GC_DIR, name);

        let mut argv = vec![
            in_gc_dir(Script::GcCheckpointsEntrypoint.name()),
            "--experiment-id".to_string(),
            self.experiment_id.to_string(),
            "--storage-config".to_string(),
            in_gc_dir(STORAGE_CONFIG_FILE),
            "--delete".to_string(),
            in_gc_dir(CHECKPOINTS_TO_DELETE_FILE),
        ];
        for glob in &self.globs {
            argv.push("--globs".to_string());
            argv.push(glob.clone());
        }
        if self.delete_tensorboards {
            argv.push("--delete-tensorboards".to_string());
        }
        argv
    }

    fn environment(&self, base: &EnvironmentConfig) -> EnvironmentConfig {
        base.merged(&self.environment)
    }

    fn env_vars(&self, base: &BTreeMap<String, String>) -> BTreeMap<String, String> {
        overlay_env_vars(
            base,
            [
                ("DET_EXPERIMENT_ID", self.experiment_id.to_string()),
                ("DET_TASK_TYPE", "CHECKPOINT_GC".to_string()),
            ],
        )
    }

    fn mounts(&self) -> Vec<BindMount> {
        self.storage.bind_mount().into_iter().collect()
    }

    fn shm_size(&self) -> i64 {
        0
    }

    fn use_fluent_logging(&self) -> bool {
        true
    }

    fn use_host_mode(&self) -> bool {
        false
    }

    fn resources_config(&self) -> ResourcesConfig {
        ResourcesConfig {
            slots: 0,
            ..Default::default()
        }
    }

    fn logging_fields(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("experiment_id".to_string(), self.experiment_id.to_string()),
            ("task_type".to_string(), "CHECKPOINT_GC".to_string()),
        ])
    }
}
