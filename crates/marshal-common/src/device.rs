//! Devices assigned to a task

use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of compute slot
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    /// CPU-only slot
    #[default]
    Cpu,
    /// NVIDIA GPU
    Cuda,
    /// AMD GPU
    Rocm,
}

impl DeviceType {
    /// Returns true for the GPU families
    pub fn is_gpu(self) -> bool {
        matches!(self, Self::Cuda | Self::Rocm)
    }

    /// Lowercase name, as used in environment variables and image maps
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Cuda => "cuda",
            Self::Rocm => "rocm",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One device allocated to a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    /// Index on the host
    pub id: u32,
    /// Vendor/model string
    pub brand: String,
    /// Stable device UUID (used for GPU device requests)
    pub uuid: String,
    /// Device family
    #[serde(rename = "type")]
    pub device_type: DeviceType,
}
