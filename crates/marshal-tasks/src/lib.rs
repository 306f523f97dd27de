//! Task variants and the resolved task spec
//!
//! Every task kind implements [`TaskKind`]. Backend translators only see a
//! [`TaskSpec`], which combines the fields common to all tasks with one kind
//! and answers every question through the contract:
//! - [`CommandTask`]: commands, notebooks, shells, and tensorboards
//! - [`TrialTask`]: one run of an experiment trial
//! - [`CheckpointGcTask`]: checkpoint garbage collection
//! - [`GenericTask`]: an arbitrary user entrypoint

#![deny(missing_docs)]

pub mod assets;
mod command;
pub mod error;
mod gc;
mod generic;
mod harness;
mod kind;
mod spec;
mod ssh;
mod storage;
mod trial;
mod variant;

pub use command::{CommandTask, CommandType};
pub use error::TaskError;
pub use gc::CheckpointGcTask;
pub use generic::GenericTask;
pub use harness::HarnessArchive;
pub use kind::{overlay_env_vars, TaskKind};
pub use spec::TaskSpec;
pub use ssh::SshKeys;
pub use storage::CheckpointStorage;
pub use trial::TrialTask;
pub use variant::TaskVariant;

/// Result type alias using the task error type
pub type Result<T> = std::result::Result<T, TaskError>;
