//! Launcher manifest compilation from resolved task specs
//!
//! Works against any `TaskKind`, like the Docker compiler. Every check that
//! can fail runs before the manifest is assembled, so a returned error means
//! nothing was built.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use marshal_archive::path;
use marshal_common::{BindMount, DeviceType, EnvironmentConfig, DEFAULT_WORK_DIR, RUN_DIR};
use marshal_tasks::{TaskKind, TaskSpec};
use marshal_wlm::{validate_pbs, validate_slurm, WorkloadManager};
use regex::Regex;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::archives::{dispatcher_archive, encode_archives, run_dir_link_names, wrapper_path};
use crate::config::{ContainerRuntime, DispatcherParams};
use crate::environment::launcher_env;
use crate::error::DispatchError;
use crate::types::{
    ClientMetadata, Data, DispatchOutput, LaunchParameters, Manifest, Payload,
    ResourceRequirements, WarehouseMetadata,
};

const MANIFEST_VERSION: &str = "v1";
const CLIENT_NAME: &str = "det";
const PAYLOAD_ID: &str = "com.cray.analytics.capsules.generic.container";
const PAYLOAD_VERSION: &str = "latest";
const PAYLOAD_PREFIX: &str = "ai";
const LAUNCH_MODE: &str = "batch";

/// Launcher working directory when the task keeps the default work directory
const LAUNCHER_WORK_DIR: &str = "/var/tmp";
const TMP_DIR: &str = "/tmp";

/// Name-safe characters for payload names
static PAYLOAD_NAME_FILTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_-]+").expect("valid payload name pattern"));

/// Compile a resolved task spec into a launcher manifest.
///
/// Fails on an archive that cannot be encoded, a malformed experiment
/// variable, a bind mount under the run directory, or any forbidden scheduler
/// option. Option violations are reported together.
pub fn to_dispatcher_manifest<K: TaskKind>(
    spec: &TaskSpec<K>,
    params: &DispatcherParams,
) -> Result<DispatchOutput, DispatchError> {
    let fields = spec.logging_fields();
    check_options(spec)?;
    let environment = spec.environment();
    let volumes = data_volumes(&spec.mounts())?;

    let archives = spec.archives();
    let links = run_dir_link_names(&archives);
    debug!(?fields, ?links, "run directory links");
    let encoded = encode_archives(&dispatcher_archive(&spec.owner, &links), &archives)?;

    let slurm_args = slurm_args(spec, params);
    let pbs_args = pbs_args(spec, params);
    debug!(?fields, ?slurm_args, ?pbs_args, "scheduler options");

    let mut custom = BTreeMap::from([
        ("Archives".to_string(), encoded),
        ("slurmArgs".to_string(), slurm_args),
        ("pbsArgs".to_string(), pbs_args),
    ]);
    let ports = podman_ports(&environment);
    if params.container_runtime == ContainerRuntime::Podman && !ports.is_empty() {
        custom.insert("ports".to_string(), ports);
    }

    let environment_vars = launcher_env(spec, params, &environment, volumes.binds_tmp)?;
    let resources = resource_requirements(params);
    debug!(?fields, ?resources, carrier = params.carrier(), "resource requirements");

    let arguments = std::iter::once(wrapper_path())
        .chain(spec.entrypoint())
        .collect();
    let images = BTreeMap::from([(
        "default".to_string(),
        environment.image_for(params.slot_type).to_string(),
    )]);

    let payload_name = payload_name(&spec.description());
    let payload = Payload {
        name: payload_name.clone(),
        id: PAYLOAD_ID.to_string(),
        version: PAYLOAD_VERSION.to_string(),
        carriers: vec![params.carrier().to_string()],
        launch_parameters: LaunchParameters {
            mode: LAUNCH_MODE.to_string(),
            configuration: launch_configuration(spec, params, &environment),
            custom,
            arguments,
            images,
            data: volumes.data,
            environment: environment_vars,
        },
        resource_requirements: resources,
    };

    Ok(DispatchOutput {
        manifest: Manifest {
            version: MANIFEST_VERSION.to_string(),
            client_metadata: ClientMetadata {
                name: CLIENT_NAME.to_string(),
            },
            payloads: vec![payload],
            warehouse_metadata: WarehouseMetadata {
                version: Uuid::new_v4().to_string(),
            },
        },
        impersonated_user: spec.owner.user.clone(),
        payload_name,
    })
}

/// Launcher payload name: the prefix plus the name-safe part of the description
pub fn payload_name(description: &str) -> String {
    let safe = PAYLOAD_NAME_FILTER.replace_all(description, "");
    if safe.is_empty() {
        PAYLOAD_PREFIX.to_string()
    } else {
        format!("{PAYLOAD_PREFIX}_{safe}")
    }
}

struct DataVolumes {
    data: Vec<Data>,
    binds_tmp: bool,
}

fn data_volumes(mounts: &[BindMount]) -> Result<DataVolumes, DispatchError> {
    let mut data = Vec::with_capacity(mounts.len());
    let mut binds_tmp = false;
    for (index, mount) in mounts.iter().enumerate() {
        if path::is_within(RUN_DIR, &mount.container_path) {
            error!(container_path = %mount.container_path, "bind mount under the run directory");
            return Err(DispatchError::RunDirMount {
                target: mount.container_path.clone(),
            });
        }
        binds_tmp |= path::trim_trailing(&mount.container_path) == TMP_DIR;
        data.push(Data {
            name: format!("ds{index}"),
            source: mount.host_path.clone(),
            target: mount.container_path.clone(),
            read_only: mount.read_only,
        });
    }
    Ok(DataVolumes { data, binds_tmp })
}

fn launch_configuration<K: TaskKind>(
    spec: &TaskSpec<K>,
    params: &DispatcherParams,
    environment: &EnvironmentConfig,
) -> BTreeMap<String, String> {
    let work_dir = if spec.work_dir == DEFAULT_WORK_DIR {
        LAUNCHER_WORK_DIR
    } else {
        &spec.work_dir
    };

    let mut config = BTreeMap::from([
        ("workingDir".to_string(), work_dir.to_string()),
        ("enableWritableTmpFs".to_string(), "true".to_string()),
        ("exportAll".to_string(), "true".to_string()),
    ]);
    let mut set = |key: &str, value: String| {
        config.insert(key.to_string(), value);
    };

    if !params.partition.is_empty() {
        set("queue", params.partition.clone());
    }
    match params.slot_type {
        DeviceType::Cuda => set("enableNvidia", "true".to_string()),
        DeviceType::Rocm => set("enableROCM", "true".to_string()),
        DeviceType::Cpu => {}
    }
    if params.container_runtime == ContainerRuntime::Podman {
        set("networkMode", "host".to_string());
        if environment.registry_auth.is_some() {
            warn!("registry_auth is not supported with podman; log in on the compute nodes instead");
        }
    }
    if let Some(gpu_type) = spec.gpu_type().filter(|t| !t.is_empty()) {
        set("gpuType", gpu_type.to_string());
    }
    if environment.force_pull_image {
        set("disableImageCache", "true".to_string());
    }
    if !environment.add_capabilities.is_empty() {
        set("addCapabilities", environment.add_capabilities.join(","));
    }
    if !environment.drop_capabilities.is_empty() {
        set("dropCapabilities", environment.drop_capabilities.join(","));
    }

    let devices: Vec<String> = spec
        .resources_config()
        .devices
        .iter()
        .map(ToString::to_string)
        .collect();
    if !devices.is_empty() {
        set("devices", devices.join(","));
    }

    config
}

/// Container ports for environment ports named `podman*`
fn podman_ports(environment: &EnvironmentConfig) -> Vec<String> {
    environment
        .ports
        .iter()
        .filter(|(name, _)| name.to_lowercase().starts_with("podman"))
        .map(|(_, port)| port.to_string())
        .collect()
}

/// Validate Slurm and PBS options together so neither hides the other
fn check_options<K>(spec: &TaskSpec<K>) -> Result<(), DispatchError> {
    let slurm = validate_slurm(&spec.slurm_args());
    let pbs = validate_pbs(&spec.pbs_args());
    if slurm.is_empty() && pbs.is_empty() {
        return Ok(());
    }

    error!(slurm = slurm.len(), pbs = pbs.len(), "forbidden scheduler options");
    let mut errors = slurm;
    errors.extend(pbs);
    Err(DispatchError::ForbiddenOptions { errors })
}

/// `--exclude`, defaults and task options, `--no-requeue`, `--wckey`
fn slurm_args<K>(spec: &TaskSpec<K>, params: &DispatcherParams) -> Vec<String> {
    let requested = spec.slurm_args();
    let mut args = Vec::with_capacity(requested.len() + 3);
    if params.workload_manager == WorkloadManager::Slurm && !params.disabled_nodes.is_empty() {
        args.push(format!("--exclude={}", params.disabled_nodes.join(",")));
    }
    args.extend(requested);
    args.push("--no-requeue".to_string());
    if let Some(label) = job_label(params) {
        args.push(format!("--wckey={label}"));
    }
    args
}

/// Defaults and task options, then `-P <label>`
fn pbs_args<K>(spec: &TaskSpec<K>, params: &DispatcherParams) -> Vec<String> {
    let mut args = spec.pbs_args();
    if let Some(label) = job_label(params) {
        args.push(format!("-P {label}"));
    }
    args
}

fn job_label(params: &DispatcherParams) -> Option<&str> {
    params.job_label.as_deref().filter(|label| !label.is_empty())
}

/// Without trackable resources the launcher can only count GPUs through
/// nodes, so every slot becomes a node.
fn resource_requirements(params: &DispatcherParams) -> ResourceRequirements {
    let slots = i32::try_from(params.slots).unwrap_or(i32::MAX);
    let instances = if params.tres_supported || slots == 0 {
        BTreeMap::from([("per-node".to_string(), 1)])
    } else {
        BTreeMap::from([("nodes".to_string(), slots), ("total".to_string(), slots)])
    };

    if params.slot_type.is_gpu() {
        ResourceRequirements {
            instances,
            gpus: Some(BTreeMap::from([("total".to_string(), slots)])),
            cores: None,
        }
    } else {
        ResourceRequirements {
            instances,
            gpus: None,
            cores: Some(BTreeMap::from([("total".to_string(), slots.max(1) as f32)])),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use marshal_archive::{Archive, Item, ItemKind, RunArchive};
    use marshal_common::{
        AgentUserGroup, DeviceMapping, EnvironmentImage, ResourcesConfig, SlurmConfig,
    };

    #[derive(Debug, Clone, Default)]
    struct StubKind {
        description: String,
        mounts: Vec<BindMount>,
        archives: Vec<RunArchive>,
        devices: Vec<DeviceMapping>,
    }

    impl TaskKind for StubKind {
        fn archives(&self, _owner: &AgentUserGroup, _work_dir: &str) -> Vec<RunArchive> {
            self.archives.clone()
        }

        fn description(&self) -> String {
            self.description.clone()
        }

        fn entrypoint(&self) -> Vec<String> {
            vec!["/run/determined/command-entrypoint.sh".to_string(), "python".to_string()]
        }

        fn environment(&self, base: &EnvironmentConfig) -> EnvironmentConfig {
            base.merged(&EnvironmentConfig {
                image: EnvironmentImage::PerDevice {
                    cpu: "img:cpu".to_string(),
                    cuda: "img:cuda".to_string(),
                    rocm: "img:rocm".to_string(),
                },
                ports: BTreeMap::from([
                    ("podman-jupyter".to_string(), 8888),
                    ("tensorboard".to_string(), 6006),
                ]),
                ..Default::default()
            })
        }

        fn env_vars(&self, base: &BTreeMap<String, String>) -> BTreeMap<String, String> {
            base.clone()
        }

        fn mounts(&self) -> Vec<BindMount> {
            self.mounts.clone()
        }

        fn shm_size(&self) -> i64 {
            0
        }

        fn use_fluent_logging(&self) -> bool {
            false
        }

        fn use_host_mode(&self) -> bool {
            false
        }

        fn resources_config(&self) -> ResourcesConfig {
            ResourcesConfig {
                devices: self.devices.clone(),
                ..Default::default()
            }
        }

        fn logging_fields(&self) -> BTreeMap<String, String> {
            BTreeMap::new()
        }
    }

    fn params() -> DispatcherParams {
        DispatcherParams::new("master", 8080, 4)
    }

    fn launch(spec: &TaskSpec<StubKind>, params: &DispatcherParams) -> LaunchParameters {
        let output = to_dispatcher_manifest(spec, params).unwrap();
        output.manifest.payloads[0].launch_parameters.clone()
    }

    #[test]
    fn payload_names_drop_unsafe_characters() {
        assert_eq!(payload_name("abc_#123-&"), "ai_abc_123-");
        assert_eq!(payload_name("   zyx-123 "), "ai_zyx-123");
        assert_eq!(payload_name("#sky , limit: ."), "ai_skylimit");
        assert_eq!(payload_name("!!"), "ai");
    }

    #[test]
    fn manifest_shape() {
        let mut spec = TaskSpec::new(StubKind {
            description: "cmd-1".to_string(),
            ..Default::default()
        });
        spec.owner = AgentUserGroup::new(1001, 1001, "alice", "staff");

        let output = to_dispatcher_manifest(&spec, &params()).unwrap();
        assert_eq!(output.impersonated_user, "alice");
        assert_eq!(output.payload_name, "ai_cmd-1");

        let manifest = &output.manifest;
        assert_eq!(manifest.version, "v1");
        assert_eq!(manifest.client_metadata.name, "det");
        assert!(Uuid::parse_str(&manifest.warehouse_metadata.version).is_ok());

        let payload = &manifest.payloads[0];
        assert_eq!(payload.id, PAYLOAD_ID);
        assert_eq!(payload.version, "latest");
        assert_eq!(payload.carriers, [params().carrier()]);

        let launch = &payload.launch_parameters;
        assert_eq!(launch.mode, "batch");
        assert_eq!(
            launch.arguments,
            [
                "/determined_local_fs/dispatcher-wrapper.sh",
                "/run/determined/command-entrypoint.sh",
                "python"
            ]
        );
        assert_eq!(launch.images["default"], "img:cpu");
        assert_eq!(launch.configuration["workingDir"], "/var/tmp");
        assert_eq!(launch.configuration["enableWritableTmpFs"], "true");
        assert!(!launch.custom.contains_key("ports"));
    }

    #[test]
    fn custom_work_dir_is_kept() {
        let mut spec = TaskSpec::new(StubKind::default());
        spec.work_dir = "/home/alice".to_string();
        assert_eq!(launch(&spec, &params()).configuration["workingDir"], "/home/alice");
    }

    #[test]
    fn each_manifest_gets_a_fresh_warehouse_version() {
        let spec = TaskSpec::new(StubKind::default());
        let a = to_dispatcher_manifest(&spec, &params()).unwrap();
        let b = to_dispatcher_manifest(&spec, &params()).unwrap();
        assert_ne!(
            a.manifest.warehouse_metadata.version,
            b.manifest.warehouse_metadata.version
        );
    }

    #[test]
    fn data_volumes_are_numbered_and_tmp_is_detected() {
        let spec = TaskSpec::new(StubKind {
            mounts: vec![
                BindMount::new("/scratch", "/data").read_only(),
                BindMount::new("/local/tmp", "/tmp/"),
            ],
            ..Default::default()
        });
        let launch = launch(&spec, &params());

        assert_eq!(launch.data.len(), 2);
        assert_eq!(launch.data[0].name, "ds0");
        assert!(launch.data[0].read_only);
        assert_eq!(launch.data[1].name, "ds1");
        assert!(!launch.environment.contains_key("DET_CONTAINER_LOCAL_TMP"));
    }

    #[test]
    fn run_dir_mount_is_rejected() {
        let spec = TaskSpec::new(StubKind {
            mounts: vec![BindMount::new("/scratch", "/run/determined/x")],
            ..Default::default()
        });
        let err = to_dispatcher_manifest(&spec, &params()).unwrap_err();
        assert!(matches!(err, DispatchError::RunDirMount { .. }));
    }

    #[test]
    fn gpu_configuration() {
        let mut spec = TaskSpec::new(StubKind::default());
        spec.slurm = SlurmConfig {
            gpu_type: Some("a100".to_string()),
            ..Default::default()
        };
        let mut params = params();
        params.slot_type = DeviceType::Cuda;
        params.partition = "gpus".to_string();

        let cuda = launch(&spec, &params);
        assert_eq!(cuda.configuration["enableNvidia"], "true");
        assert_eq!(cuda.configuration["gpuType"], "a100");
        assert_eq!(cuda.configuration["queue"], "gpus");
        assert_eq!(cuda.images["default"], "img:cuda");
        assert_eq!(cuda.environment["DET_SLOT_TYPE"], "cuda");

        params.slot_type = DeviceType::Rocm;
        let rocm = launch(&spec, &params);
        assert_eq!(rocm.configuration["enableROCM"], "true");
        assert!(!rocm.configuration.contains_key("enableNvidia"));
    }

    #[test]
    fn podman_uses_host_network_and_ports() {
        let spec = TaskSpec::new(StubKind::default());
        let mut params = params();
        params.container_runtime = ContainerRuntime::Podman;

        let launch = launch(&spec, &params);
        assert_eq!(launch.configuration["networkMode"], "host");
        assert_eq!(launch.custom["ports"], ["8888"]);
    }

    #[test]
    fn capabilities_and_devices() {
        let mut spec = TaskSpec::new(StubKind {
            devices: vec!["/dev/fuse".parse().unwrap()],
            ..Default::default()
        });
        spec.base_environment.force_pull_image = true;
        spec.base_environment.add_capabilities = vec!["SYS_ADMIN".to_string(), "NET_ADMIN".to_string()];
        spec.base_environment.drop_capabilities = vec!["MKNOD".to_string()];

        let config = launch(&spec, &params()).configuration;
        assert_eq!(config["disableImageCache"], "true");
        assert_eq!(config["addCapabilities"], "SYS_ADMIN,NET_ADMIN");
        assert_eq!(config["dropCapabilities"], "MKNOD");
        assert_eq!(config["devices"], "/dev/fuse:/dev/fuse:mrw");
    }

    #[test]
    fn slurm_args_are_wrapped() {
        let mut spec = TaskSpec::new(StubKind::default());
        spec.task_container_defaults.slurm.sbatch_args = vec!["--mem=8G".to_string()];
        spec.slurm.sbatch_args = vec!["--time=1:00:00".to_string()];
        let mut params = params();
        params.disabled_nodes = vec!["node1".to_string(), "node2".to_string()];
        params.job_label = Some("team-a".to_string());

        let launch = launch(&spec, &params);
        assert_eq!(
            launch.custom["slurmArgs"],
            [
                "--exclude=node1,node2",
                "--mem=8G",
                "--time=1:00:00",
                "--no-requeue",
                "--wckey=team-a"
            ]
        );
        assert_eq!(launch.custom["pbsArgs"], ["-P team-a"]);
    }

    #[test]
    fn pbs_cluster_does_not_exclude_slurm_nodes() {
        let spec = TaskSpec::new(StubKind::default());
        let mut params = params();
        params.workload_manager = WorkloadManager::Pbs;
        params.disabled_nodes = vec!["node1".to_string()];

        let launch = launch(&spec, &params);
        assert_eq!(launch.custom["slurmArgs"], ["--no-requeue"]);
        assert!(launch.custom["pbsArgs"].is_empty());
    }

    #[test]
    fn forbidden_options_are_reported_together() {
        let mut spec = TaskSpec::new(StubKind::default());
        spec.slurm.sbatch_args = vec![
            "--no-requeue".to_string(),
            "--gpus=2".to_string(),
            "--mem=8G".to_string(),
        ];
        let err = to_dispatcher_manifest(&spec, &params()).unwrap_err();
        match err {
            DispatchError::ForbiddenOptions { errors } => assert_eq!(errors.len(), 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn forbidden_pbs_option() {
        let mut spec = TaskSpec::new(StubKind::default());
        spec.pbs.pbsbatch_args = vec!["-r n".to_string()];
        let err = to_dispatcher_manifest(&spec, &params()).unwrap_err();
        assert!(err.to_string().contains("PBS option -r"));
    }

    #[test]
    fn resources_without_tres_count_nodes() {
        let mut params = params();
        params.slot_type = DeviceType::Cuda;
        let resources = resource_requirements(&params);
        assert_eq!(resources.instances["nodes"], 4);
        assert_eq!(resources.instances["total"], 4);
        assert_eq!(resources.gpus.unwrap()["total"], 4);
        assert!(resources.cores.is_none());
    }

    #[test]
    fn resources_with_tres_or_no_slots_use_one_per_node() {
        let mut params = params();
        params.tres_supported = true;
        let resources = resource_requirements(&params);
        assert_eq!(resources.instances, BTreeMap::from([("per-node".to_string(), 1)]));
        assert_eq!(resources.cores.unwrap()["total"], 4.0);

        params.tres_supported = false;
        params.slots = 0;
        let resources = resource_requirements(&params);
        assert_eq!(resources.instances, BTreeMap::from([("per-node".to_string(), 1)]));
        assert_eq!(resources.cores.unwrap()["total"], 1.0);
    }

    #[test]
    fn local_archives_are_linked() {
        let spec = TaskSpec::new(StubKind {
            archives: vec![Archive::new(vec![Item::root_owned(
                "train/model_def.py",
                ItemKind::file("print()"),
                0o644,
            )])
            .mounted_at("/run/determined")],
            ..Default::default()
        });
        let launch = launch(&spec, &params());

        let archives = &launch.custom["Archives"];
        assert_eq!(archives.len(), spec.archives().len() + 1);

        let bytes = STANDARD.decode(&archives[0]).unwrap();
        let dispatcher = Archive::from_tar_gz(&bytes).unwrap();
        let link = dispatcher
            .iter()
            .find(|item| item.path == "/run/determined/train")
            .unwrap();
        assert_eq!(link.kind, ItemKind::symlink("/determined/train"));
    }
}
