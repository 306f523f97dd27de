//! Archive codec error types

use thiserror::Error;

/// Errors produced while encoding or decoding archives
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Writing an entry into the tar stream failed
    #[error("failed to encode archive entry {path}: {source}")]
    Encode {
        /// Path of the item being written
        path: String,
        /// Underlying I/O error from the tar or gzip writer
        source: std::io::Error,
    },

    /// Tar headers cannot represent modification times before 1970
    #[error("modification time of {path} is before the Unix epoch")]
    TimestampBeforeEpoch {
        /// Path of the offending item
        path: String,
    },

    /// Flushing the end-of-archive blocks or the gzip trailer failed
    #[error("failed to finish archive stream: {0}")]
    Finish(#[source] std::io::Error),

    /// The gzip or tar stream is corrupt or truncated
    #[error("corrupt archive stream: {0}")]
    Decode(#[source] std::io::Error),

    /// A decoded entry carries a header field that cannot be represented
    #[error("invalid archive entry {path}: {message}")]
    InvalidEntry {
        /// Path of the entry (lossy if the path itself was invalid)
        path: String,
        /// Description of what's invalid
        message: String,
    },

    /// A decoded entry is neither a regular file, a directory, nor a symlink
    #[error("archive entry {path} has unsupported type {entry_type}")]
    UnsupportedEntryType {
        /// Path of the entry
        path: String,
        /// Tar entry type as reported by the header
        entry_type: String,
    },
}

impl ArchiveError {
    /// Create an invalid-entry error
    pub fn invalid_entry(path: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::InvalidEntry {
            path: path.into(),
            message: msg.into(),
        }
    }

    /// Returns true if this error came from reading a stream rather than writing one
    pub fn is_decode(&self) -> bool {
        matches!(
            self,
            Self::Decode(_) | Self::InvalidEntry { .. } | Self::UnsupportedEntryType { .. }
        )
    }
}
