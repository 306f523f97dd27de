//! Trial runs

use std::collections::BTreeMap;

use marshal_archive::{path, Archive, ItemKind, RunArchive};
use marshal_common::{
    AgentUserGroup, BindMount, EnvironmentConfig, ResourcesConfig, TRAIN_DIR,
};
use serde_json::Value;
use uuid::Uuid;

use crate::assets::Script;
use crate::kind::{overlay_env_vars, TaskKind};
use crate::ssh::SshKeys;
use crate::storage::CheckpointStorage;

/// One run of an experiment trial
#[derive(Debug, Clone)]
pub struct TrialTask {
    /// Experiment id
    pub experiment_id: i32,
    /// Trial id
    pub trial_id: i32,
    /// Restart counter of the trial
    pub trial_run_id: i32,
    /// Seed for the trial's random generators
    pub trial_seed: u32,
    /// Hyperparameter values
    pub hparams: Value,
    /// Checkpoint to resume from
    pub latest_checkpoint: Option<Uuid>,
    /// Steps already completed by earlier runs
    pub steps_completed: u64,
    /// The trial spans more than one agent
    pub is_multi_agent: bool,
    /// Keys for the inter-node SSH connections
    pub ssh_keys: SshKeys,
    /// User model definition, copied into the work directory
    pub model_definition: Archive,
    /// Experiment environment
    pub environment: EnvironmentConfig,
    /// Experiment resources
    pub resources: ResourcesConfig,
    /// Experiment bind mounts
    pub bind_mounts: Vec<BindMount>,
    /// Checkpoint storage
    pub checkpoint_storage: CheckpointStorage,
}

impl TrialTask {
    fn entrypoint_path() -> String {
        path::join(TRAIN_DIR, Script::TrialEntrypoint.name())
    }
}

impl TaskKind for TrialTask {
    fn archives(&self, owner: &AgentUserGroup, work_dir: &str) -> Vec<RunArchive> {
        let train = Archive::new(vec![
            owner.owned_item(TRAIN_DIR, ItemKind::Directory, 0o700),
            owner.owned_item(path::join(TRAIN_DIR, "model"), ItemKind::Directory, 0o700),
            Script::TrialEntrypoint.item_at(Self::entrypoint_path()),
        ]);

        vec![
            self.ssh_keys.run_archive(owner),
            train.mounted_at("/"),
            self.model_definition.clone().mounted_at(work_dir),
        ]
    }

    fn description(&self) -> String {
        format!("exp-{}-trial-{}", self.experiment_id, self.trial_id)
    }

    fn entrypoint(&self) -> Vec<String> {
        vec![Self::entrypoint_path()]
    }

    fn environment(&self, base: &EnvironmentConfig) -> EnvironmentConfig {
        base.merged(&self.environment)
    }

    fn env_vars(&self, base: &BTreeMap<String, String>) -> BTreeMap<String, String> {
        let latest_checkpoint = self
            .latest_checkpoint
            .map(|id| id.to_string())
            .unwrap_or_default();

        overlay_env_vars(
            base,
            [
                ("DET_EXPERIMENT_ID", self.experiment_id.to_string()),
                ("DET_TRIAL_ID", self.trial_id.to_string()),
                ("DET_TRIAL_RUN_ID", self.trial_run_id.to_string()),
                ("DET_TRIAL_SEED", self.trial_seed.to_string()),
                ("DET_HPARAMS", self.hparams.to_string()),
                ("DET_LATEST_CHECKPOINT", latest_checkpoint),
                ("DET_STEPS_COMPLETED", self.steps_completed.to_string()),
                ("DET_TASK_TYPE", "TRIAL".to_string()),
            ],
        )
    }

    fn mounts(&self) -> Vec<BindMount> {
        let mut mounts = self.bind_mounts.clone();
        mounts.extend(self.checkpoint_storage.bind_mount());
        mounts
    }

    fn shm_size(&self) -> i64 {
        self.resources.shm_size.unwrap_or(0)
    }

    fn use_fluent_logging(&self) -> bool {
        true
    }

    fn use_host_mode(&self) -> bool {
        self.is_multi_agent
    }

    fn resources_config(&self) -> ResourcesConfig {
        self.resources.clone()
    }

    fn logging_fields(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("experiment_id".to_string(), self.experiment_id.to_string()),
            ("trial_id".to_string(), self.trial_id.to_string()),
            ("task_type".to_string(), "TRIAL".to_string()),
        ])
    }
}
