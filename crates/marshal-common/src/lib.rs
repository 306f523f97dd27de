//! Common types for task materialization: configuration model, errors, and
//! the fixed layout of the task run directory

#![deny(missing_docs)]

pub mod config;
pub mod device;
pub mod environment;
pub mod error;
pub mod mounts;
pub mod resources;
pub mod telemetry;
pub mod user;

pub use config::{PbsConfig, SlurmConfig, TaskContainerDefaults};
pub use device::{Device, DeviceType};
pub use environment::{EnvironmentConfig, EnvironmentImage, EnvironmentVariables, RegistryAuth};
pub use error::Error;
pub use mounts::BindMount;
pub use resources::{DeviceMapping, ResourcesConfig};
pub use user::AgentUserGroup;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Per-task run directory inside every task container
pub const RUN_DIR: &str = "/run/determined";

/// Working directory used when the task does not configure one
pub const DEFAULT_WORK_DIR: &str = "/run/determined/workdir";

/// SSH keys and sshd configuration for multi-node trials and shells
pub const SSH_DIR: &str = "/run/determined/ssh";

/// Trial entrypoint wrapper and model definition
pub const TRAIN_DIR: &str = "/run/determined/train";

/// Checkpoint garbage collection inputs
pub const CHECKPOINT_GC_DIR: &str = "/run/determined/checkpoint_gc";

/// Master TLS certificate location inside the container
pub const MASTER_CERT_PATH: &str = "/run/determined/etc/ssl/master.crt";

/// Harness wheels installed by the entrypoint scripts
pub const HARNESS_WHEEL_DIR: &str = "/opt/determined/wheels";

/// Container path where shared-filesystem checkpoint storage is mounted
pub const SHARED_FS_CONTAINER_PATH: &str = "/determined_shared_fs";

/// Network mode requested by tasks that need the host network
pub const HOST_NETWORK_MODE: &str = "host";
