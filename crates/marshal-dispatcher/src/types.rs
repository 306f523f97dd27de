//! HPC launcher manifest types
//!
//! Serialized as the launcher's JSON manifest (camelCase field names).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Launcher manifest carrying one payload
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// Manifest format version
    pub version: String,
    /// Who submitted the manifest
    pub client_metadata: ClientMetadata,
    /// Always exactly one payload
    pub payloads: Vec<Payload>,
    /// Launcher-side storage key
    pub warehouse_metadata: WarehouseMetadata,
}

/// Submitting client
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClientMetadata {
    /// Client name
    pub name: String,
}

/// Fresh per manifest so concurrent launches never share launcher files
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WarehouseMetadata {
    /// Random UUID
    pub version: String,
}

/// The job itself
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Payload {
    /// Name derived from the task description, see [`crate::payload_name`]
    pub name: String,
    /// Launcher capsule id
    pub id: String,
    /// Capsule version
    pub version: String,
    /// Single carrier for the scheduler and runtime, see [`crate::carrier`]
    pub carriers: Vec<String>,
    /// How the job runs
    pub launch_parameters: LaunchParameters,
    /// What the job asks the scheduler for
    pub resource_requirements: ResourceRequirements,
}

/// Container launch settings
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LaunchParameters {
    /// Always `batch`
    pub mode: String,
    /// Launcher options such as `workingDir`, `enableNvidia` and `queue`
    pub configuration: BTreeMap<String, String>,
    /// `Archives`, `slurmArgs`, `pbsArgs`, and podman `ports`
    pub custom: BTreeMap<String, Vec<String>>,
    /// Wrapper script, then the task entrypoint
    pub arguments: Vec<String>,
    /// Task image under the `default` key
    pub images: BTreeMap<String, String>,
    /// Bound data volumes
    pub data: Vec<Data>,
    /// Job environment
    pub environment: BTreeMap<String, String>,
}

/// A data volume bound into the job's containers
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Data {
    /// `ds<N>` in mount order
    pub name: String,
    /// Host path
    pub source: String,
    /// Container path
    pub target: String,
    /// Mounted read-only
    pub read_only: bool,
}

/// Scheduler request, keyed `per-node` and `total`
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRequirements {
    /// Node counts
    pub instances: BTreeMap<String, i32>,
    /// GPU counts, for GPU slot types
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpus: Option<BTreeMap<String, i32>>,
    /// Core counts, for CPU slot types
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cores: Option<BTreeMap<String, f32>>,
}

/// A compiled manifest plus the names the caller tracks the launch by
#[derive(Clone, Debug, PartialEq)]
pub struct DispatchOutput {
    /// Manifest to submit
    pub manifest: Manifest,
    /// User the launcher runs the job as
    pub impersonated_user: String,
    /// Name of the single payload
    pub payload_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_requirements_omit_unset_dimensions() {
        let resources = ResourceRequirements {
            instances: BTreeMap::from([("per-node".to_string(), 1)]),
            gpus: Some(BTreeMap::from([("total".to_string(), 8)])),
            cores: None,
        };
        let json = serde_json::to_value(&resources).unwrap();
        assert_eq!(json["instances"]["per-node"], 1);
        assert_eq!(json["gpus"]["total"], 8);
        assert!(json.get("cores").is_none());
    }

    #[test]
    fn data_uses_camel_case() {
        let data = Data {
            name: "ds0".to_string(),
            source: "/scratch".to_string(),
            target: "/data".to_string(),
            read_only: true,
        };
        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["readOnly"], true);
    }
}
