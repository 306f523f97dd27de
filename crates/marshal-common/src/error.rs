//! Error types for configuration handling
//!
//! Configuration arrives already validated by the loader, so these cover the
//! few string forms that are parsed at translation time.

use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum Error {
    /// Environment variable entry is not of the form `KEY=VALUE`
    #[error("invalid environment variable {entry:?}: {message}")]
    InvalidEnvVar {
        /// The raw entry
        entry: String,
        /// Description of what's invalid
        message: String,
    },

    /// Device mapping string is not of the form `host[:container[:mode]]`
    #[error("invalid device mapping {value:?}: {message}")]
    InvalidDeviceMapping {
        /// The raw mapping
        value: String,
        /// Description of what's invalid
        message: String,
    },
}

impl Error {
    /// Create an invalid environment variable error
    pub fn invalid_env_var(entry: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::InvalidEnvVar {
            entry: entry.into(),
            message: msg.into(),
        }
    }

    /// Create an invalid device mapping error
    pub fn invalid_device_mapping(value: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::InvalidDeviceMapping {
            value: value.into(),
            message: msg.into(),
        }
    }
}
