//! Task resource configuration

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

fn default_device_mode() -> String {
    "mrw".to_string()
}

/// A host device exposed inside the container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceMapping {
    /// Device path on the host
    pub host_path: String,
    /// Device path in the container
    pub container_path: String,
    /// cgroup permissions (`r`, `w`, `m`)
    #[serde(default = "default_device_mode")]
    pub mode: String,
}

impl fmt::Display for DeviceMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.host_path, self.container_path, self.mode)
    }
}

/// Parses `host[:container[:mode]]`; the container path defaults to the host path.
impl FromStr for DeviceMapping {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(':');
        let host_path = parts.next().unwrap_or_default();
        if host_path.is_empty() {
            return Err(Error::invalid_device_mapping(s, "empty host path"));
        }
        let container_path = parts.next().filter(|p| !p.is_empty()).unwrap_or(host_path);
        let mode = parts.next().map(str::to_string).unwrap_or_else(default_device_mode);
        if parts.next().is_some() {
            return Err(Error::invalid_device_mapping(s, "too many ':' separators"));
        }

        Ok(Self {
            host_path: host_path.to_string(),
            container_path: container_path.to_string(),
            mode,
        })
    }
}

/// Resources a task asks for
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourcesConfig {
    /// Slots requested
    #[serde(default)]
    pub slots: u32,
    /// Shared memory size in bytes, if the task overrides the cluster default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shm_size: Option<i64>,
    /// Host devices to expose
    #[serde(default)]
    pub devices: Vec<DeviceMapping>,
    /// Resource pool the task was scheduled in
    #[serde(default)]
    pub resource_pool: String,
}
