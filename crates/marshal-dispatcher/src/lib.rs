//! HPC launcher manifest compiler for task launches
//!
//! Compiles a resolved `TaskSpec` into the manifest the HPC launcher runs
//! under Slurm or PBS. Multi-node jobs share one filesystem, so archives are
//! split into shared and per-process content (see [`archives`]). Pure
//! compilation crate: no launcher I/O.

#![deny(missing_docs)]

pub mod archives;
mod compiler;
mod config;
mod environment;
mod error;
mod types;

pub use compiler::{payload_name, to_dispatcher_manifest};
pub use config::{carrier, ContainerRuntime, DispatcherParams};
pub use error::DispatchError;
pub use types::{
    ClientMetadata, Data, DispatchOutput, LaunchParameters, Manifest, Payload,
    ResourceRequirements, WarehouseMetadata,
};
