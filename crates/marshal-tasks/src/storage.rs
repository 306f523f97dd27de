//! Checkpoint storage configuration

use marshal_common::{BindMount, SHARED_FS_CONTAINER_PATH};
use serde::{Deserialize, Serialize};

fn default_propagation() -> String {
    "rprivate".to_string()
}

/// Where trials write checkpoints and where checkpoint GC deletes them.
///
/// Serialized verbatim into the checkpoint GC storage config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CheckpointStorage {
    /// Host directory bind-mounted into every task
    SharedFs {
        /// Directory on the host
        host_path: String,
        /// Subdirectory of `host_path` holding checkpoints
        #[serde(default, skip_serializing_if = "Option::is_none")]
        storage_path: Option<String>,
        /// Mount propagation mode
        #[serde(default = "default_propagation")]
        propagation: String,
    },
    /// Amazon S3 or an S3-compatible store
    S3 {
        /// Bucket name
        bucket: String,
        /// Key prefix
        #[serde(default, skip_serializing_if = "Option::is_none")]
        prefix: Option<String>,
        /// Endpoint for S3-compatible stores
        #[serde(default, skip_serializing_if = "Option::is_none")]
        endpoint_url: Option<String>,
    },
    /// Google Cloud Storage
    Gcs {
        /// Bucket name
        bucket: String,
        /// Object prefix
        #[serde(default, skip_serializing_if = "Option::is_none")]
        prefix: Option<String>,
    },
    /// A directory already present in the container
    Directory {
        /// Path inside the container
        container_path: String,
    },
}

impl CheckpointStorage {
    /// Bind mount needed to reach the storage from inside the container
    pub fn bind_mount(&self) -> Option<BindMount> {
        match self {
            Self::SharedFs {
                host_path,
                propagation,
                ..
            } => Some(BindMount {
                propagation: propagation.clone(),
                ..BindMount::new(host_path.clone(), SHARED_FS_CONTAINER_PATH)
            }),
            Self::S3 { .. } | Self::Gcs { .. } | Self::Directory { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_fs_mounts_host_path() {
        let storage = CheckpointStorage::SharedFs {
            host_path: "/mnt/checkpoints".to_string(),
            storage_path: None,
            propagation: "rshared".to_string(),
        };
        let mount = storage.bind_mount().unwrap();
        assert_eq!(mount.host_path, "/mnt/checkpoints");
        assert_eq!(mount.container_path, "/determined_shared_fs");
        assert_eq!(mount.propagation, "rshared");
    }

    #[test]
    fn object_stores_need_no_mount() {
        let storage = CheckpointStorage::S3 {
            bucket: "ckpts".to_string(),
            prefix: None,
            endpoint_url: None,
        };
        assert!(storage.bind_mount().is_none());
    }

    #[test]
    fn serialized_with_type_tag() {
        let json: CheckpointStorage =
            serde_json::from_str(r#"{"type":"shared_fs","host_path":"/mnt"}"#).unwrap();
        assert!(matches!(json, CheckpointStorage::SharedFs { ref propagation, .. } if propagation == "rprivate"));

        let value = serde_json::to_value(CheckpointStorage::Gcs {
            bucket: "b".to_string(),
            prefix: None,
        })
        .unwrap();
        assert_eq!(value, serde_json::json!({"type": "gcs", "bucket": "b"}));
    }
}
