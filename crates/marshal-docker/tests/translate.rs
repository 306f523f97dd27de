//! Trial and checkpoint GC tasks compiled side by side through the Docker compiler

use std::collections::BTreeSet;

use marshal_archive::{Archive, Item, ItemKind};
use marshal_common::{
    AgentUserGroup, BindMount, EnvironmentConfig, EnvironmentImage, ResourcesConfig,
};
use marshal_docker::{to_container_spec, ContainerSpec};
use marshal_tasks::{
    CheckpointGcTask, CheckpointStorage, SshKeys, TaskSpec, TaskVariant, TrialTask,
};
use serde_json::json;
use uuid::Uuid;

fn storage() -> CheckpointStorage {
    CheckpointStorage::SharedFs {
        host_path: "/mnt/checkpoints".to_string(),
        storage_path: None,
        propagation: "rprivate".to_string(),
    }
}

fn base_spec(kind: TaskVariant) -> TaskSpec {
    let mut spec = TaskSpec::new(kind);
    spec.task_id = "task-1".to_string();
    spec.allocation_id = "task-1.alloc".to_string();
    spec.cluster_id = "cluster".to_string();
    spec.container_id = "c-1".to_string();
    spec.owner = AgentUserGroup::new(1000, 1000, "alice", "research");
    spec.base_environment = EnvironmentConfig {
        image: EnvironmentImage::Shared("determinedai/environments:py-3.9".to_string()),
        ..Default::default()
    };
    spec
}

fn trial_spec() -> TaskSpec {
    let trial = TrialTask {
        experiment_id: 7,
        trial_id: 21,
        trial_run_id: 0,
        trial_seed: 1234,
        hparams: json!({"lr": 0.1}),
        latest_checkpoint: None,
        steps_completed: 0,
        is_multi_agent: true,
        ssh_keys: SshKeys {
            private_key: "-----BEGIN KEY-----".to_string(),
            public_key: "ssh-rsa AAAA".to_string(),
        },
        model_definition: Archive::new(vec![Item::user_owned(
            "model_def.py",
            ItemKind::file("import torch\n"),
            0o644,
            1000,
            1000,
        )]),
        environment: EnvironmentConfig::default(),
        resources: ResourcesConfig {
            slots: 2,
            ..Default::default()
        },
        bind_mounts: vec![BindMount::new("/datasets", "/data").read_only()],
        checkpoint_storage: storage(),
    };
    base_spec(trial.into())
}

fn gc_spec() -> TaskSpec {
    let gc = CheckpointGcTask::new(7, storage(), vec![Uuid::new_v4()])
        .unwrap()
        .with_globs(vec!["*.pt".to_string()]);
    base_spec(gc.into())
}

fn env_keys(container: &ContainerSpec) -> BTreeSet<String> {
    container
        .run_spec
        .container_config
        .env
        .iter()
        .filter_map(|e| e.split_once('=').map(|(k, _)| k.to_string()))
        .collect()
}

fn env_value(container: &ContainerSpec, key: &str) -> Option<String> {
    container
        .run_spec
        .container_config
        .env
        .iter()
        .find_map(|e| e.strip_prefix(&format!("{key}=")).map(str::to_string))
}

#[test]
fn trial_and_gc_differ_only_by_their_kind() {
    let trial = to_container_spec(&trial_spec());
    let gc = to_container_spec(&gc_spec());

    assert_eq!(
        trial.run_spec.container_config.cmd,
        ["/run/determined/train/entrypoint.sh"]
    );
    assert_eq!(
        gc.run_spec.container_config.cmd[0],
        "/run/determined/checkpoint_gc/gc-checkpoints-entrypoint.sh"
    );
    assert!(gc.run_spec.container_config.cmd.contains(&"*.pt".to_string()));

    assert_eq!(env_value(&trial, "DET_TASK_TYPE").as_deref(), Some("TRIAL"));
    assert_eq!(env_value(&gc, "DET_TASK_TYPE").as_deref(), Some("CHECKPOINT_GC"));
    assert!(env_keys(&trial).contains("DET_TRIAL_ID"));
    assert!(!env_keys(&gc).contains("DET_TRIAL_ID"));
    assert!(!env_keys(&gc).contains("DET_HPARAMS"));
    for shared in ["DET_CLUSTER_ID", "DET_TASK_ID", "DET_CONTAINER_ID", "DET_USER"] {
        assert!(env_keys(&trial).contains(shared));
        assert!(env_keys(&gc).contains(shared));
    }

    let targets = |c: &ContainerSpec| -> Vec<String> {
        c.run_spec
            .host_config
            .mounts
            .iter()
            .map(|m| m.target.clone())
            .collect()
    };
    assert_eq!(targets(&trial), ["/data", "/determined_shared_fs"]);
    assert_eq!(targets(&gc), ["/determined_shared_fs"]);

    assert_eq!(trial.run_spec.host_config.network_mode, "host");
    assert_eq!(gc.run_spec.host_config.network_mode, "bridge");
    assert_eq!(trial.run_spec.container_config.user, "1000:1000");
    assert_eq!(
        trial.run_spec.container_config.image,
        gc.run_spec.container_config.image
    );
}

#[test]
fn archives_keep_base_content_ahead_of_kind_content() {
    let trial = to_container_spec(&trial_spec());
    let gc = to_container_spec(&gc_spec());

    let trial_roots: Vec<_> = trial.run_spec.archives.iter().map(|a| a.path.as_str()).collect();
    assert_eq!(
        trial_roots,
        ["/", "/run/determined", "/", "/", "/run/determined/workdir"]
    );
    assert!(trial.run_spec.archives[2]
        .archive
        .contains_file_prefix("/run/determined/ssh"));

    let gc_roots: Vec<_> = gc.run_spec.archives.iter().map(|a| a.path.as_str()).collect();
    assert_eq!(gc_roots, ["/", "/run/determined", "/run/determined/checkpoint_gc"]);
    assert!(gc
        .run_spec
        .archives
        .iter()
        .all(|a| !a.archive.contains_file_prefix("/run/determined/ssh")));
}

#[test]
fn user_files_follow_a_custom_work_dir() {
    let mut spec = trial_spec();
    spec.work_dir = "/home/alice".to_string();
    let trial = to_container_spec(&spec);

    assert_eq!(trial.run_spec.container_config.working_dir, "/home/alice");
    assert_eq!(env_value(&trial, "DET_WORKDIR").as_deref(), Some("/home/alice"));
    assert!(trial.run_spec.archives[0].archive.contains_path("/home/alice"));

    let model = trial
        .run_spec
        .archives
        .iter()
        .find(|a| a.archive.contains_path("model_def.py"))
        .unwrap();
    assert_eq!(model.path, "/home/alice");
    assert!(trial
        .run_spec
        .archives
        .iter()
        .all(|a| a.path != "/run/determined/workdir"));
}

#[test]
fn concurrent_compilation_matches_sequential() {
    let expected_trial = to_container_spec(&trial_spec());
    let expected_gc = to_container_spec(&gc_spec());
    let trial = trial_spec();
    let gc = gc_spec();

    std::thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let spec = if i % 2 == 0 { &trial } else { &gc };
                s.spawn(move || (i, to_container_spec(spec)))
            })
            .collect();

        for handle in handles {
            let (i, container) = handle.join().unwrap();
            let expected = if i % 2 == 0 { &expected_trial } else { &expected_gc };
            assert_eq!(
                container.run_spec.container_config.env,
                expected.run_spec.container_config.env
            );
            assert_eq!(
                container.run_spec.container_config.cmd,
                expected.run_spec.container_config.cmd
            );
        }
    });
}
