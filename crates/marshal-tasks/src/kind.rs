//! The capability contract every task kind implements

use std::collections::BTreeMap;

use marshal_archive::RunArchive;
use marshal_common::{AgentUserGroup, BindMount, EnvironmentConfig, ResourcesConfig};

#[cfg(test)]
use mockall::automock;

/// What a backend translator needs to know about a task kind.
///
/// Translators are written once against this trait and never look at the
/// concrete kind. Implementations are immutable values: accessors do no I/O
/// beyond reading embedded assets.
#[cfg_attr(test, automock)]
pub trait TaskKind {
    /// Filesystem content this kind needs beyond the base content every task gets.
    ///
    /// User files belong under `work_dir`, the task's resolved work directory.
    fn archives(&self, owner: &AgentUserGroup, work_dir: &str) -> Vec<RunArchive>;

    /// Human-readable task description
    fn description(&self) -> String;

    /// Container entrypoint argv
    fn entrypoint(&self) -> Vec<String>;

    /// This kind's environment layered over the cluster `base`
    fn environment(&self, base: &EnvironmentConfig) -> EnvironmentConfig;

    /// `base` variables with this kind's variables applied on top.
    ///
    /// The kind's values win on conflicting keys.
    fn env_vars(&self, base: &BTreeMap<String, String>) -> BTreeMap<String, String>;

    /// Bind mounts, with container paths possibly relative to the work directory
    fn mounts(&self) -> Vec<BindMount>;

    /// Shared memory size in bytes; 0 defers to the cluster default
    fn shm_size(&self) -> i64;

    /// Ship container output through the fluent log driver
    fn use_fluent_logging(&self) -> bool;

    /// Run on the host network
    fn use_host_mode(&self) -> bool;

    /// Resources the task asked for
    fn resources_config(&self) -> ResourcesConfig;

    /// Fields attached to log events about this task
    fn logging_fields(&self) -> BTreeMap<String, String>;
}

/// Apply `vars` over a copy of `base`
pub fn overlay_env_vars<I, K, V>(base: &BTreeMap<String, String>, vars: I) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    let mut merged = base.clone();
    merged.extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
    merged
}
