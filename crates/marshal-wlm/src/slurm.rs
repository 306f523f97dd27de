//! Slurm `sbatch` options

use crate::error::WlmError;
use crate::WorkloadManager;

/// Options the launcher sets itself. Long forms carry their `=`, so
/// `--gpus-per-task=2` is not mistaken for `--gpus=`.
const FORBIDDEN: &[&str] = &[
    "--ntasks-per-node=",
    "--gpus=",
    "-G",
    "--gpus-per-node=",
    "--nodes=",
    "-N",
    "--ntasks=",
    "-n",
    "--partition=",
    "-p",
    "--output=",
    "-o",
    "--error=",
    "-e",
    "--chdir=",
    "-D",
    "--job-name=",
    "-J",
    "--requeue",
    "--no-requeue",
    "--export=",
    "--uid=",
    "--gid=",
    "--wckey=",
];

const GRES: &str = "--gres";

/// Validate raw Slurm options, returning every violation found.
///
/// An option is forbidden when, after trimming, it starts with a deny-listed
/// flag. `--gres` is allowed unless one of its comma separated entries names
/// the `gpu` resource.
pub fn validate_slurm<S: AsRef<str>>(options: &[S]) -> Vec<WlmError> {
    let mut errors = Vec::new();
    for option in options {
        let option = option.as_ref().trim();

        errors.extend(
            FORBIDDEN
                .iter()
                .filter(|flag| option.starts_with(*flag))
                .map(|flag| WlmError::not_configurable(WorkloadManager::Slurm, flag)),
        );

        if gres_requests_gpu(option) {
            errors.push(WlmError::GresGpu {
                option: option.to_string(),
            });
        }
    }
    errors
}

fn gres_requests_gpu(option: &str) -> bool {
    let Some(rest) = option.strip_prefix(GRES) else {
        return false;
    };
    let Some(value) = rest
        .strip_prefix('=')
        .or_else(|| rest.strip_prefix(char::is_whitespace))
    else {
        return false;
    };

    value
        .trim()
        .split(',')
        .any(|entry| entry.split(':').next().map(str::trim) == Some("gpu"))
}
