//! Option validation errors

use crate::WorkloadManager;

/// One forbidden or malformed scheduler option
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WlmError {
    /// The option is on the scheduler's deny-list
    #[error("{wlm} option {flag} is not configurable")]
    NotConfigurable {
        /// Scheduler the option was meant for
        wlm: WorkloadManager,
        /// Deny-listed flag the option matched
        flag: String,
    },

    /// `--gres` requesting GPUs
    #[error("Slurm option --gres may not be used to configure GPU resources: {option}")]
    GresGpu {
        /// Full option as given
        option: String,
    },

    /// `-l select=...`
    #[error("PBS option -l select is not configurable; the launcher computes it from the slots requested: {option}")]
    PbsSelect {
        /// Full option as given
        option: String,
    },

    /// `-l` whose value is neither `name=value` pairs nor a placement
    #[error("PBS option -l {value} is not a valid resource list or placement")]
    PbsResourceSyntax {
        /// Value following `-l`
        value: String,
    },
}

impl WlmError {
    pub(crate) fn not_configurable(wlm: WorkloadManager, flag: &str) -> Self {
        Self::NotConfigurable {
            wlm,
            flag: flag.to_string(),
        }
    }
}
