//! Manifest construction errors

use marshal_archive::ArchiveError;
use marshal_wlm::WlmError;

/// Why a task could not be compiled into a launcher manifest.
///
/// Every variant aborts the launch before anything is sent to the launcher.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// An archive could not be written as a tarball
    #[error("failed to encode archive mounted at {path}: {source}")]
    Archive {
        /// Mount path of the archive
        path: String,
        /// Underlying encoding failure
        source: ArchiveError,
    },

    /// An experiment environment entry is not `KEY=VALUE`
    #[error("invalid experiment environment variable: {0}")]
    EnvVar(#[from] marshal_common::Error),

    /// Requested scheduler options the launcher owns.
    ///
    /// Slurm and PBS options are both validated before either is reported,
    /// so `errors` holds every violation for both schedulers.
    #[error("forbidden scheduler options: {}", join(.errors))]
    ForbiddenOptions {
        /// Slurm violations first, then PBS
        errors: Vec<WlmError>,
    },

    /// A bind mount targets the launcher-managed run directory
    #[error("bind_mounts.container_path {target} not supported: the HPC launcher cannot mount under /run/determined")]
    RunDirMount {
        /// Offending container path
        target: String,
    },
}

impl DispatchError {
    pub(crate) fn archive(path: &str, source: ArchiveError) -> Self {
        Self::Archive {
            path: path.to_string(),
            source,
        }
    }
}

fn join(errors: &[WlmError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
