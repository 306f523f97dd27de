//! Archive placement for multi-process HPC jobs
//!
//! The launcher has no per-container filesystem to copy archives into, so
//! every archive travels in the manifest as a base64 tarball. Archives that
//! each process must own privately are unpacked under [`LOCAL_FS`]; the
//! wrapper script copies them into a per-process directory and the links
//! generated here make `/run/determined/<name>` resolve to that copy.

use std::collections::BTreeSet;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use marshal_archive::{path, Archive, ItemKind, RunArchive};
use marshal_common::{AgentUserGroup, DEFAULT_WORK_DIR, RUN_DIR, SSH_DIR};
use marshal_tasks::assets::Script;
use tracing::{debug, error};

use crate::error::DispatchError;

/// Staging root for per-process archives, managed by the wrapper script
pub const LOCAL_FS: &str = "/determined_local_fs";

/// Container-private directory the run directory links point under
pub(crate) const LOCAL_TMP: &str = "/";

const PRIVATE_DIR: &str = "determined";
const WRAPPER_NAME: &str = "dispatcher-wrapper.sh";
const WRAPPER_MODE: u32 = 0o700;
const WRAPPER: &[u8] = include_bytes!("../assets/dispatcher-wrapper.sh");

/// Path of the wrapper that runs ahead of the task entrypoint
pub fn wrapper_path() -> String {
    path::join(LOCAL_FS, WRAPPER_NAME)
}

/// Returns true when the archive must be private to each process.
///
/// The SSH directory is shared since sshd refuses to follow links. The logging
/// setup script and the command and shell entrypoints are read-only and stay
/// shared too. Otherwise anything rooted at, or carrying content under, the
/// run directory or the default work directory is local.
pub fn is_local_volume(run: &RunArchive) -> bool {
    let archive = &run.archive;
    let always_shared = [
        SSH_DIR.to_string(),
        Script::TaskLoggingSetup.name().to_string(),
        path::join(RUN_DIR, Script::CommandEntrypoint.name()),
        path::join(RUN_DIR, Script::ShellEntrypoint.name()),
    ];
    if always_shared
        .iter()
        .any(|prefix| archive.contains_file_prefix(prefix))
    {
        return false;
    }

    let root = path::trim_trailing(&run.path);
    if root == RUN_DIR || root == DEFAULT_WORK_DIR {
        return true;
    }
    archive.contains_file_prefix(RUN_DIR) || archive.contains_file_prefix(DEFAULT_WORK_DIR)
}

/// Names directly below the run directory that local archives populate.
///
/// A file nested deeper contributes the name of its top-level directory.
pub fn run_dir_link_names(archives: &[RunArchive]) -> BTreeSet<String> {
    archives
        .iter()
        .filter(|run| is_local_volume(run))
        .flat_map(|run| run.resolved_paths())
        .filter_map(|resolved| path::first_segment_below(RUN_DIR, &resolved).map(str::to_string))
        .collect()
}

/// The wrapper script, an empty run directory, and one link per name
pub fn dispatcher_archive(owner: &AgentUserGroup, links: &BTreeSet<String>) -> RunArchive {
    let mut items = vec![
        owner.owned_item(wrapper_path(), ItemKind::file(WRAPPER), WRAPPER_MODE),
        owner.owned_item(RUN_DIR, ItemKind::Directory, 0o700),
    ];
    items.extend(links.iter().map(|name| {
        let target = path::join(LOCAL_TMP, &path::join(PRIVATE_DIR, name));
        owner.owned_item(path::join(RUN_DIR, name), ItemKind::symlink(target), 0o700)
    }));

    Archive::new(items).mounted_at("/")
}

/// Encode the dispatcher archive followed by `archives` as base64 tarballs.
///
/// Item paths are made absolute against each mount path; local archives are
/// additionally moved under [`LOCAL_FS`]. The dispatcher archive is never moved.
pub fn encode_archives(
    dispatcher: &RunArchive,
    archives: &[RunArchive],
) -> Result<Vec<String>, DispatchError> {
    std::iter::once((dispatcher, false))
        .chain(archives.iter().map(|run| (run, is_local_volume(run))))
        .map(|(run, local)| {
            let staging = if local { LOCAL_FS } else { "" };
            let root = format!("{staging}{}/", run.path);
            debug!(mount = %run.path, local, items = run.archive.len(), "encoding archive");

            let bytes = run.archive.to_relocated_tar_gz(&root).map_err(|source| {
                error!(mount = %run.path, error = %source, "failed to encode archive");
                DispatchError::archive(&run.path, source)
            })?;
            Ok(STANDARD.encode(bytes))
        })
        .collect()
}
