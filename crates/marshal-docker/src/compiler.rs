//! Container spec compilation from resolved task specs
//!
//! Maps the task contract onto Docker pull/run specs. Works against any
//! `TaskKind`, so the compiled spec never depends on which variant is inside.

use std::collections::BTreeMap;

use marshal_common::{BindMount, Device, DeviceType, ResourcesConfig, HOST_NETWORK_MODE};
use marshal_tasks::{TaskKind, TaskSpec};
use tracing::debug;

use crate::types::{
    BindOptions, ContainerConfig, ContainerSpec, DeviceRequest, EmptyObject, HostConfig,
    HostDevice, Mount, PullSpec, RunSpec,
};

const ROCM_DEVICES: [&str; 2] = ["/dev/kfd", "/dev/dri"];

/// Compile a resolved task spec into a Docker container spec.
///
/// Environment entries are the task's merged variables as `KEY=VALUE` in key
/// order, followed by the experiment's entries for the task's device type,
/// verbatim. The host network is used only when the task kind asks for it.
pub fn to_container_spec<K: TaskKind>(spec: &TaskSpec<K>) -> ContainerSpec {
    let device_type = spec.device_type();
    let environment = spec.environment();
    let host_mode = spec.use_host_mode();

    let env: Vec<String> = spec
        .env_vars()
        .into_iter()
        .map(|(key, value)| format!("{key}={value}"))
        .chain(environment.env_vars_for(device_type).iter().cloned())
        .collect();

    let exposed_ports = environment
        .ports
        .values()
        .map(|port| (format!("{port}/tcp"), EmptyObject::default()))
        .collect();

    let network_mode = if host_mode {
        HOST_NETWORK_MODE.to_string()
    } else {
        spec.task_container_defaults.network_mode.clone()
    };

    let mut host_config = HostConfig {
        network_mode,
        mounts: spec.mounts().iter().map(compile_mount).collect(),
        publish_all_ports: !host_mode,
        shm_size: spec.shm_size(),
        cap_add: environment.add_capabilities.clone(),
        cap_drop: environment.drop_capabilities.clone(),
        devices: host_devices(&spec.resources_config()),
        device_requests: Vec::new(),
        group_add: Vec::new(),
        security_opt: Vec::new(),
    };
    attach_gpus(&mut host_config, device_type, &spec.devices);

    let fields = spec.logging_fields();
    debug!(
        ?fields,
        image = environment.image_for(device_type),
        network_mode = %host_config.network_mode,
        "compiled container spec"
    );

    ContainerSpec {
        pull_spec: PullSpec {
            registry: environment.registry_auth.clone(),
            force_pull: environment.force_pull_image,
        },
        run_spec: RunSpec {
            container_config: ContainerConfig {
                user: spec.owner.ownership(),
                exposed_ports,
                env,
                cmd: spec.entrypoint(),
                image: environment.image_for(device_type).to_string(),
                working_dir: spec.work_dir.clone(),
            },
            host_config,
            archives: spec.archives(),
            use_fluent_logging: spec.use_fluent_logging(),
        },
    }
}

fn compile_mount(mount: &BindMount) -> Mount {
    Mount {
        mount_type: "bind".to_string(),
        source: mount.host_path.clone(),
        target: mount.container_path.clone(),
        read_only: mount.read_only,
        bind_options: BindOptions {
            propagation: mount.propagation.clone(),
        },
    }
}

fn host_devices(resources: &ResourcesConfig) -> Vec<HostDevice> {
    resources
        .devices
        .iter()
        .map(|d| HostDevice {
            path_on_host: d.host_path.clone(),
            path_in_container: d.container_path.clone(),
            cgroup_permissions: d.mode.clone(),
        })
        .collect()
}

fn attach_gpus(host: &mut HostConfig, device_type: DeviceType, devices: &[Device]) {
    let uuids: Vec<String> = devices
        .iter()
        .filter(|d| d.device_type == device_type)
        .map(|d| d.uuid.clone())
        .collect();
    if uuids.is_empty() {
        return;
    }

    match device_type {
        DeviceType::Cuda => host.device_requests.push(DeviceRequest {
            driver: "nvidia".to_string(),
            device_ids: uuids,
            capabilities: vec![vec![
                "gpu".to_string(),
                "compute".to_string(),
                "utility".to_string(),
            ]],
        }),
        DeviceType::Rocm => {
            // Card-level confinement needs host sysfs lookups; the driver narrows /dev/dri.
            host.devices.extend(ROCM_DEVICES.iter().map(|path| HostDevice {
                path_on_host: path.to_string(),
                path_in_container: path.to_string(),
                cgroup_permissions: "rwm".to_string(),
            }));
            host.group_add.push("video".to_string());
            host.security_opt.push("seccomp=unconfined".to_string());
        }
        DeviceType::Cpu => {}
    }
}
