//! Bind mounts from the host into task containers

use marshal_archive::path;
use serde::{Deserialize, Serialize};

fn default_propagation() -> String {
    "rprivate".to_string()
}

/// A host path bound into the container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindMount {
    /// Source path on the host
    pub host_path: String,
    /// Target path in the container. Relative paths resolve against the work directory.
    pub container_path: String,
    /// Mount read-only
    #[serde(default)]
    pub read_only: bool,
    /// Mount propagation mode
    #[serde(default = "default_propagation")]
    pub propagation: String,
}

impl BindMount {
    /// Read-write bind mount with default propagation
    pub fn new(host_path: impl Into<String>, container_path: impl Into<String>) -> Self {
        Self {
            host_path: host_path.into(),
            container_path: container_path.into(),
            read_only: false,
            propagation: default_propagation(),
        }
    }

    /// Mark the mount read-only
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Copy with a relative container path resolved against `work_dir`
    pub fn resolved(&self, work_dir: &str) -> BindMount {
        let container_path = if self.container_path.starts_with('/') {
            self.container_path.clone()
        } else {
            path::join(work_dir, &self.container_path)
        };
        BindMount {
            container_path,
            ..self.clone()
        }
    }
}
