//! Task assembly errors

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading task inputs or building a variant
#[derive(Debug, Error)]
pub enum TaskError {
    /// The harness wheel directory could not be read
    #[error("failed to read harness wheels from {}: {source}", path.display())]
    HarnessRead {
        /// Directory or file being read
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// The harness wheel directory holds no wheels
    #[error("no harness wheels found in {}", path.display())]
    NoHarnessWheels {
        /// Directory that was searched
        path: PathBuf,
    },

    /// A task input could not be serialized into its container file
    #[error("failed to serialize {what}: {source}")]
    Serialize {
        /// What was being serialized
        what: &'static str,
        /// Underlying serde error
        source: serde_json::Error,
    },
}

impl TaskError {
    /// Create a harness read error
    pub fn harness_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::HarnessRead {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_directory() {
        let err = TaskError::NoHarnessWheels {
            path: PathBuf::from("/opt/wheels"),
        };
        assert_eq!(err.to_string(), "no harness wheels found in /opt/wheels");

        let err = TaskError::harness_read("/missing", std::io::Error::other("not found"));
        assert!(err.to_string().contains("/missing"));
    }
}
