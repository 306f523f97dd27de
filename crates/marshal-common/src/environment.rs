//! Task container environment configuration
//!
//! Images and environment variables can be given once for every device type
//! or separately per device type:
//!
//! ```yaml
//! image: determinedai/pytorch-ngc:0.38.0
//! environment_variables:
//!   cpu: [OMP_NUM_THREADS=4]
//!   cuda: [NCCL_DEBUG=INFO]
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::device::DeviceType;
use crate::error::Error;

/// Container image reference, shared or per device type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnvironmentImage {
    /// Same image for every device type
    Shared(String),
    /// One image per device type
    PerDevice {
        /// Image for CPU slots
        #[serde(default)]
        cpu: String,
        /// Image for CUDA slots
        #[serde(default)]
        cuda: String,
        /// Image for ROCm slots
        #[serde(default)]
        rocm: String,
    },
}

impl Default for EnvironmentImage {
    fn default() -> Self {
        Self::Shared(String::new())
    }
}

impl EnvironmentImage {
    /// Image reference for a device type
    pub fn for_device(&self, device: DeviceType) -> &str {
        match self {
            Self::Shared(image) => image,
            Self::PerDevice { cpu, cuda, rocm } => match device {
                DeviceType::Cpu => cpu,
                DeviceType::Cuda => cuda,
                DeviceType::Rocm => rocm,
            },
        }
    }

    fn is_unset(&self) -> bool {
        match self {
            Self::Shared(image) => image.is_empty(),
            Self::PerDevice { cpu, cuda, rocm } => {
                cpu.is_empty() && cuda.is_empty() && rocm.is_empty()
            }
        }
    }
}

/// `KEY=VALUE` entries, shared or per device type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnvironmentVariables {
    /// Same entries for every device type
    Shared(Vec<String>),
    /// Entries per device type
    PerDevice {
        /// Entries for CPU slots
        #[serde(default)]
        cpu: Vec<String>,
        /// Entries for CUDA slots
        #[serde(default)]
        cuda: Vec<String>,
        /// Entries for ROCm slots
        #[serde(default)]
        rocm: Vec<String>,
    },
}

impl Default for EnvironmentVariables {
    fn default() -> Self {
        Self::Shared(Vec::new())
    }
}

impl EnvironmentVariables {
    /// Raw entries for a device type, in configured order
    pub fn for_device(&self, device: DeviceType) -> &[String] {
        match self {
            Self::Shared(vars) => vars,
            Self::PerDevice { cpu, cuda, rocm } => match device {
                DeviceType::Cpu => cpu,
                DeviceType::Cuda => cuda,
                DeviceType::Rocm => rocm,
            },
        }
    }

    /// These entries followed by `other`'s, so `other` wins once parsed into a map
    pub fn concat(&self, other: &EnvironmentVariables) -> EnvironmentVariables {
        match (self, other) {
            (Self::Shared(a), Self::Shared(b)) => {
                Self::Shared(a.iter().chain(b).cloned().collect())
            }
            _ => {
                let join = |device| -> Vec<String> {
                    self.for_device(device)
                        .iter()
                        .chain(other.for_device(device))
                        .cloned()
                        .collect()
                };
                Self::PerDevice {
                    cpu: join(DeviceType::Cpu),
                    cuda: join(DeviceType::Cuda),
                    rocm: join(DeviceType::Rocm),
                }
            }
        }
    }
}

/// Split a `KEY=VALUE` entry on the first `=`.
///
/// The value may itself contain `=`. An entry without `=` or with an empty key
/// is rejected.
pub fn parse_env_var(entry: &str) -> Result<(String, String), Error> {
    match entry.split_once('=') {
        Some(("", _)) => Err(Error::invalid_env_var(entry, "empty variable name")),
        Some((key, value)) => Ok((key.to_string(), value.to_string())),
        None => Err(Error::invalid_env_var(entry, "expected KEY=VALUE")),
    }
}

/// Credentials for pulling the task image from a private registry
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryAuth {
    /// Registry user
    #[serde(default)]
    pub username: String,
    /// Registry password or token
    #[serde(default)]
    pub password: String,
    /// Registry host, when not the image's own registry
    #[serde(default, rename = "serveraddress", skip_serializing_if = "String::is_empty")]
    pub server_address: String,
    /// Account email
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub email: String,
}

impl fmt::Debug for RegistryAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryAuth")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("server_address", &self.server_address)
            .field("email", &self.email)
            .finish()
    }
}

/// Container environment for a task
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    /// Image reference
    #[serde(default)]
    pub image: EnvironmentImage,
    /// Experiment-supplied `KEY=VALUE` entries
    #[serde(default)]
    pub environment_variables: EnvironmentVariables,
    /// Named container ports to expose
    #[serde(default)]
    pub ports: BTreeMap<String, u16>,
    /// Pull the image even if it is cached
    #[serde(default)]
    pub force_pull_image: bool,
    /// Private registry credentials
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_auth: Option<RegistryAuth>,
    /// Linux capabilities to add
    #[serde(default)]
    pub add_capabilities: Vec<String>,
    /// Linux capabilities to drop
    #[serde(default)]
    pub drop_capabilities: Vec<String>,
}

impl EnvironmentConfig {
    /// Layer `overlay` over this environment.
    ///
    /// The overlay's image and registry credentials win when set, variables and
    /// capabilities are appended, and ports are merged with the overlay winning.
    pub fn merged(&self, overlay: &EnvironmentConfig) -> EnvironmentConfig {
        let image = if overlay.image.is_unset() {
            self.image.clone()
        } else {
            overlay.image.clone()
        };

        let mut ports = self.ports.clone();
        ports.extend(overlay.ports.iter().map(|(k, v)| (k.clone(), *v)));

        EnvironmentConfig {
            image,
            environment_variables: self
                .environment_variables
                .concat(&overlay.environment_variables),
            ports,
            force_pull_image: self.force_pull_image || overlay.force_pull_image,
            registry_auth: overlay
                .registry_auth
                .clone()
                .or_else(|| self.registry_auth.clone()),
            add_capabilities: union(&self.add_capabilities, &overlay.add_capabilities),
            drop_capabilities: union(&self.drop_capabilities, &overlay.drop_capabilities),
        }
    }

    /// Image reference for a device type
    pub fn image_for(&self, device: DeviceType) -> &str {
        self.image.for_device(device)
    }

    /// Raw variable entries for a device type
    pub fn env_vars_for(&self, device: DeviceType) -> &[String] {
        self.environment_variables.for_device(device)
    }
}

fn union(base: &[String], extra: &[String]) -> Vec<String> {
    let mut out = base.to_vec();
    for cap in extra {
        if !out.contains(cap) {
            out.push(cap.clone());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_splits_on_first_equals() {
        assert_eq!(
            parse_env_var("OPTS=--a=1 --b=2").unwrap(),
            ("OPTS".to_string(), "--a=1 --b=2".to_string())
        );
        assert_eq!(parse_env_var("EMPTY=").unwrap(), ("EMPTY".to_string(), String::new()));
    }

    #[test]
    fn parse_rejects_missing_equals_and_empty_key() {
        assert!(matches!(parse_env_var("EMPTY"), Err(Error::InvalidEnvVar { .. })));
        assert!(matches!(parse_env_var("=value"), Err(Error::InvalidEnvVar { .. })));
    }

    #[test]
    fn image_accepts_string_or_map() {
        let shared: EnvironmentImage = serde_json::from_str("\"img:1\"").unwrap();
        assert_eq!(shared.for_device(DeviceType::Rocm), "img:1");

        let per: EnvironmentImage =
            serde_json::from_str(r#"{"cpu":"img:cpu","cuda":"img:gpu"}"#).unwrap();
        assert_eq!(per.for_device(DeviceType::Cpu), "img:cpu");
        assert_eq!(per.for_device(DeviceType::Cuda), "img:gpu");
        assert_eq!(per.for_device(DeviceType::Rocm), "");
    }

    #[test]
    fn variables_accept_list_or_map() {
        let per: EnvironmentVariables =
            serde_json::from_str(r#"{"cuda":["NCCL_DEBUG=INFO"]}"#).unwrap();
        assert!(per.for_device(DeviceType::Cpu).is_empty());
        assert_eq!(per.for_device(DeviceType::Cuda), ["NCCL_DEBUG=INFO"]);
    }

    #[test]
    fn merged_layers_overlay_over_base() {
        let base = EnvironmentConfig {
            image: EnvironmentImage::Shared("base:1".to_string()),
            environment_variables: EnvironmentVariables::Shared(vec!["A=1".to_string()]),
            ports: BTreeMap::from([("web".to_string(), 8080)]),
            add_capabilities: vec!["SYS_PTRACE".to_string()],
            ..Default::default()
        };
        let overlay = EnvironmentConfig {
            environment_variables: EnvironmentVariables::PerDevice {
                cpu: vec!["A=2".to_string()],
                cuda: vec![],
                rocm: vec![],
            },
            ports: BTreeMap::from([("web".to_string(), 9090)]),
            add_capabilities: vec!["SYS_PTRACE".to_string(), "IPC_LOCK".to_string()],
            force_pull_image: true,
            ..Default::default()
        };

        let merged = base.merged(&overlay);
        assert_eq!(merged.image_for(DeviceType::Cuda), "base:1");
        assert_eq!(merged.env_vars_for(DeviceType::Cpu), ["A=1", "A=2"]);
        assert_eq!(merged.env_vars_for(DeviceType::Cuda), ["A=1"]);
        assert_eq!(merged.ports["web"], 9090);
        assert_eq!(merged.add_capabilities, ["SYS_PTRACE", "IPC_LOCK"]);
        assert!(merged.force_pull_image);
    }

    #[test]
    fn registry_password_is_redacted_in_debug() {
        let auth = RegistryAuth {
            username: "u".to_string(),
            password: "hunter2".to_string(),
            ..Default::default()
        };
        assert!(!format!("{auth:?}").contains("hunter2"));
    }
}
