//! Launcher environment assembly

use std::collections::BTreeMap;

use marshal_common::environment::parse_env_var;
use marshal_common::EnvironmentConfig;
use marshal_tasks::{TaskKind, TaskSpec};
use tracing::warn;

use crate::archives::LOCAL_TMP;
use crate::config::DispatcherParams;
use crate::error::DispatchError;

/// Identity the harness reports when no agent launched the container
const LAUNCHER_AGENT_ID: &str = "launcher";

const DEFAULT_MPI_TYPE: &str = "pmi2";

/// Variables the job runs with.
///
/// The task's variables come first, then the experiment's entries for the
/// slot type, then the runtime block, which always wins.
pub(crate) fn launcher_env<K: TaskKind>(
    spec: &TaskSpec<K>,
    params: &DispatcherParams,
    environment: &EnvironmentConfig,
    binds_tmp: bool,
) -> Result<BTreeMap<String, String>, DispatchError> {
    let mut env = spec.env_vars();
    for entry in environment.env_vars_for(params.slot_type) {
        let (key, value) = parse_env_var(entry)?;
        env.insert(key, value);
    }
    env.entry("SLURM_MPI_TYPE".to_string())
        .or_insert_with(|| DEFAULT_MPI_TYPE.to_string());

    env.extend(runtime_env(spec, params, binds_tmp));
    env.extend(registry_env(environment));
    Ok(env)
}

fn runtime_env<K>(
    spec: &TaskSpec<K>,
    params: &DispatcherParams,
    binds_tmp: bool,
) -> Vec<(String, String)> {
    let host = &params.master_host;
    let port = params.master_port.to_string();

    let mut vars = vec![
        ("DET_MASTER", format!("{host}:{port}")),
        ("DET_MASTER_HOST", host.clone()),
        ("DET_MASTER_IP", host.clone()),
        ("DET_MASTER_PORT", port),
        ("DET_CLUSTER_ID", spec.cluster_id.clone()),
        ("DET_CONTAINER_ID", spec.container_id.clone()),
        ("SLURM_KILL_BAD_EXIT", "1".to_string()),
        ("DET_SLOT_TYPE", params.slot_type.as_str().to_string()),
        ("DET_AGENT_ID", LAUNCHER_AGENT_ID.to_string()),
        ("DET_LOCALTMP", LOCAL_TMP.to_string()),
    ];
    if !params.certificate_name.is_empty() {
        vars.push(("DET_MASTER_CERT_NAME", params.certificate_name.clone()));
    }
    if !binds_tmp {
        vars.push(("DET_CONTAINER_LOCAL_TMP", "1".to_string()));
    }

    vars.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

/// Registry credentials for singularity/apptainer image pulls
fn registry_env(environment: &EnvironmentConfig) -> Vec<(String, String)> {
    let Some(auth) = &environment.registry_auth else {
        return Vec::new();
    };
    if !auth.server_address.is_empty() {
        warn!(server_address = %auth.server_address, "registry_auth.serveraddress is not supported");
    }
    if !auth.email.is_empty() {
        warn!("registry_auth.email is not supported");
    }

    ["SINGULARITY", "APPTAINER"]
        .into_iter()
        .flat_map(|runtime| {
            [
                (format!("{runtime}_DOCKER_USERNAME"), auth.username.clone()),
                (format!("{runtime}_DOCKER_PASSWORD"), auth.password.clone()),
            ]
        })
        .collect()
}
