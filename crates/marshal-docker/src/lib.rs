//! Docker container spec compiler for task launches
//!
//! Compiles a resolved `TaskSpec` into the pull and run specs a container
//! engine driver consumes. Pure compilation crate: no engine I/O.

mod compiler;
mod types;

pub use compiler::to_container_spec;
pub use types::{
    BindOptions, ContainerConfig, ContainerSpec, DeviceRequest, EmptyObject, HostConfig,
    HostDevice, Mount, PullSpec, RunSpec,
};
