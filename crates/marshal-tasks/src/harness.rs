//! Harness wheel archive

use std::fs;
use std::path::Path;

use marshal_archive::{Archive, Item, ItemKind, RunArchive};
use marshal_common::HARNESS_WHEEL_DIR;
use tracing::debug;

use crate::error::TaskError;

/// The Python harness wheels every task container installs.
///
/// Loaded once at startup and shared read-only by every launch. A broken
/// deployment (missing directory, no wheels) is reported by [`load`](Self::load)
/// and should stop the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessArchive {
    archive: Archive,
}

impl HarnessArchive {
    /// Read every `*.whl` file in `dir`, sorted by name.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, TaskError> {
        let dir = dir.as_ref();
        let entries = fs::read_dir(dir).map_err(|e| TaskError::harness_read(dir, e))?;

        let mut wheels = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| TaskError::harness_read(dir, e))?.path();
            if path.extension().is_some_and(|ext| ext == "whl") && path.is_file() {
                wheels.push(path);
            }
        }
        if wheels.is_empty() {
            return Err(TaskError::NoHarnessWheels {
                path: dir.to_path_buf(),
            });
        }
        wheels.sort();

        let mut items = Vec::with_capacity(wheels.len());
        for path in &wheels {
            let content = fs::read(path).map_err(|e| TaskError::harness_read(path, e))?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            items.push(Item::root_owned(name, ItemKind::file(content), 0o644));
        }

        debug!(dir = %dir.display(), wheels = items.len(), "loaded harness wheels");
        Ok(Self {
            archive: Archive::new(items),
        })
    }

    /// Wrap an already built archive of wheels
    pub fn from_archive(archive: Archive) -> Self {
        Self { archive }
    }

    /// The wheel items, named relative to the wheel directory
    pub fn archive(&self) -> &Archive {
        &self.archive
    }

    /// The wheels mounted at the harness wheel directory
    pub fn run_archive(&self) -> RunArchive {
        self.archive.clone().mounted_at(HARNESS_WHEEL_DIR)
    }
}
