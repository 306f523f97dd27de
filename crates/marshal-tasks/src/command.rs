//! Commands, notebooks, shells, and tensorboards

use std::collections::BTreeMap;
use std::fmt;

use marshal_archive::{path, Archive, Item, RunArchive};
use marshal_common::{
    AgentUserGroup, BindMount, EnvironmentConfig, ResourcesConfig, RUN_DIR,
};
use serde::{Deserialize, Serialize};

use crate::assets::Script;
use crate::kind::{overlay_env_vars, TaskKind};
use crate::ssh::SshKeys;

/// Flavor of command task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CommandType {
    /// Batch command
    Command,
    /// Jupyter notebook server
    Notebook,
    /// Interactive SSH shell
    Shell,
    /// TensorBoard server
    Tensorboard,
}

impl CommandType {
    /// Uppercase name exported as `DET_TASK_TYPE`
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Command => "COMMAND",
            Self::Notebook => "NOTEBOOK",
            Self::Shell => "SHELL",
            Self::Tensorboard => "TENSORBOARD",
        }
    }

    fn entrypoint_script(self) -> Script {
        match self {
            Self::Shell => Script::ShellEntrypoint,
            Self::Command | Self::Notebook | Self::Tensorboard => Script::CommandEntrypoint,
        }
    }
}

impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A command-like task started from the CLI or web UI
#[derive(Debug, Clone)]
pub struct CommandTask {
    /// Flavor
    pub command_type: CommandType,
    /// Description shown to users
    pub description: String,
    /// User argv, run through the command or shell entrypoint script
    pub entrypoint: Vec<String>,
    /// Command environment
    pub environment: EnvironmentConfig,
    /// Command resources
    pub resources: ResourcesConfig,
    /// Command bind mounts
    pub bind_mounts: Vec<BindMount>,
    /// Context directory files, copied into the work directory
    pub user_files: Archive,
    /// Extra files placed by the system; installed root-owned
    pub additional_files: Archive,
    /// Keys for shells
    pub ssh_keys: Option<SshKeys>,
    /// Extra variables the command was launched with
    pub env_vars: BTreeMap<String, String>,
}

impl CommandTask {
    fn entrypoint_path(&self) -> String {
        path::join(RUN_DIR, self.command_type.entrypoint_script().name())
    }
}

impl TaskKind for CommandTask {
    fn archives(&self, owner: &AgentUserGroup, work_dir: &str) -> Vec<RunArchive> {
        let script = self.command_type.entrypoint_script();
        let mut archives = vec![
            Archive::new(vec![script.item_at(self.entrypoint_path())]).mounted_at("/"),
            self.user_files.clone().mounted_at(work_dir),
            self.additional_files
                .iter()
                .map(|item| Item {
                    uid: 0,
                    gid: 0,
                    ..item.clone()
                })
                .collect::<Archive>()
                .mounted_at("/"),
        ];

        if self.command_type == CommandType::Shell {
            if let Some(keys) = &self.ssh_keys {
                archives.push(keys.run_archive(owner));
            }
        }
        archives
    }

    fn description(&self) -> String {
        self.description.clone()
    }

    fn entrypoint(&self) -> Vec<String> {
        std::iter::once(self.entrypoint_path())
            .chain(self.entrypoint.iter().cloned())
            .collect()
    }

    fn environment(&self, base: &EnvironmentConfig) -> EnvironmentConfig {
        base.merged(&self.environment)
    }

    fn env_vars(&self, base: &BTreeMap<String, String>) -> BTreeMap<String, String> {
        let mut vars = overlay_env_vars(base, self.env_vars.clone());
        vars.insert("DET_TASK_TYPE".to_string(), self.command_type.to_string());
        vars
    }

    fn mounts(&self) -> Vec<BindMount> {
        self.bind_mounts.clone()
    }

    fn shm_size(&self) -> i64 {
        self.resources.shm_size.unwrap_or(0)
    }

    fn use_fluent_logging(&self) -> bool {
        true
    }

    fn use_host_mode(&self) -> bool {
        false
    }

    fn resources_config(&self) -> ResourcesConfig {
        self.resources.clone()
    }

    fn logging_fields(&self) -> BTreeMap<String, String> {
        BTreeMap::from([("task_type".to_string(), self.command_type.to_string())])
    }
}
