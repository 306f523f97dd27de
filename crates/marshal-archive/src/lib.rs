//! Virtual filesystem archives for task containers
//!
//! An [`Archive`] is an ordered list of files, directories, and symlinks with
//! ownership and permission bits. Archives are built in memory by the task
//! variants, then serialized to gzip-compressed tar streams by the backend
//! translators:
//! - the Docker backend copies them into the container before the entrypoint runs
//! - the HPC dispatcher base64-encodes them into the launcher manifest
//!
//! Modification times are kept at one-second resolution on the wire. Sub-second
//! components are truncated on every encode.

#![deny(missing_docs)]

mod archive;
mod codec;
pub mod error;
mod item;
pub mod path;

pub use archive::{Archive, RunArchive};
pub use error::ArchiveError;
pub use item::{Item, ItemKind, EPOCH};

/// Result type alias using the archive error type
pub type Result<T> = std::result::Result<T, ArchiveError>;
