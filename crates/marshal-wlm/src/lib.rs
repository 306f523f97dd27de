//! Workload manager option validation
//!
//! Users may forward raw `sbatch`/`qsub` options to their jobs. Options that
//! would override node counts, partitions, output paths, identity, or GPU
//! accounting computed by the launcher are rejected here.
//!
//! Matching is a deny-list over option prefixes (and, for PBS, whitespace
//! separated tokens). It is a best-effort guard in front of the launcher, not
//! a parser for either scheduler's full option grammar.

#![deny(missing_docs)]

mod error;
mod pbs;
mod slurm;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use error::WlmError;
pub use pbs::validate_pbs;
pub use slurm::validate_slurm;

/// Batch scheduler behind the HPC launcher
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkloadManager {
    /// Slurm, driven through `sbatch`
    #[default]
    Slurm,
    /// PBS Professional, driven through `qsub`
    Pbs,
}

impl WorkloadManager {
    /// Validate options for this scheduler, returning every violation found
    pub fn validate<S: AsRef<str>>(self, options: &[S]) -> Vec<WlmError> {
        match self {
            Self::Slurm => validate_slurm(options),
            Self::Pbs => validate_pbs(options),
        }
    }
}

impl fmt::Display for WorkloadManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Slurm => f.write_str("Slurm"),
            Self::Pbs => f.write_str("PBS"),
        }
    }
}
