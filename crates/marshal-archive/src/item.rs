//! Archive items: one file, directory, or symlink with ownership and mode

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ArchiveError;
use crate::path;

/// Default modification time stamped by the item builders.
///
/// A fixed value keeps archives built by separate invocations byte-for-byte
/// comparable.
pub const EPOCH: DateTime<Utc> = DateTime::<Utc>::UNIX_EPOCH;

/// Tar type flag for regular files
const TYPE_REGULAR: u8 = b'0';
/// Tar type flag for symbolic links
const TYPE_SYMLINK: u8 = b'2';
/// Tar type flag for directories
const TYPE_DIRECTORY: u8 = b'5';

/// What an item is, along with the payload that kind carries
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemKind {
    /// Regular file with its exact byte content
    Regular(Vec<u8>),
    /// Directory (never carries content)
    Directory,
    /// Symbolic link with its target
    Symlink(String),
}

impl ItemKind {
    /// Regular file from anything convertible to bytes
    pub fn file(content: impl Into<Vec<u8>>) -> Self {
        Self::Regular(content.into())
    }

    /// Symlink pointing at `target`
    pub fn symlink(target: impl Into<String>) -> Self {
        Self::Symlink(target.into())
    }

    /// The tar type flag byte for this kind
    pub fn type_flag(&self) -> u8 {
        match self {
            Self::Regular(_) => TYPE_REGULAR,
            Self::Directory => TYPE_DIRECTORY,
            Self::Symlink(_) => TYPE_SYMLINK,
        }
    }

    /// Raw content bytes: file data, link target, or nothing for directories
    pub fn content(&self) -> &[u8] {
        match self {
            Self::Regular(data) => data,
            Self::Directory => &[],
            Self::Symlink(target) => target.as_bytes(),
        }
    }
}

/// A single filesystem entry inside an [`Archive`](crate::Archive)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ItemRepr", into = "ItemRepr")]
pub struct Item {
    /// Location of the entry. Directories never end in a separator.
    pub path: String,
    /// Entry kind and payload
    pub kind: ItemKind,
    /// Permission bits
    pub mode: u32,
    /// Modification time. Only whole seconds survive serialization.
    pub modified: DateTime<Utc>,
    /// Owning user id
    pub uid: u32,
    /// Owning group id
    pub gid: u32,
}

impl Item {
    /// Item owned by `uid:gid`, stamped with [`EPOCH`].
    pub fn user_owned(
        path: impl Into<String>,
        kind: ItemKind,
        mode: u32,
        uid: u32,
        gid: u32,
    ) -> Self {
        let path = path.into();
        Self {
            path: path::trim_trailing(&path).to_string(),
            kind,
            mode,
            modified: EPOCH,
            uid,
            gid,
        }
    }

    /// Item owned by root, for system files the task must not modify.
    pub fn root_owned(path: impl Into<String>, kind: ItemKind, mode: u32) -> Self {
        Self::user_owned(path, kind, mode, 0, 0)
    }

    /// Replace the modification time
    pub fn with_modified(mut self, modified: DateTime<Utc>) -> Self {
        self.modified = modified;
        self
    }

    /// Returns true for directory items
    pub fn is_dir(&self) -> bool {
        matches!(self.kind, ItemKind::Directory)
    }

    /// Returns true if both ids are zero
    pub fn is_root_owned(&self) -> bool {
        self.uid == 0 && self.gid == 0
    }

    /// Raw content bytes (see [`ItemKind::content`])
    pub fn content(&self) -> &[u8] {
        self.kind.content()
    }

    /// Modification time as whole Unix seconds, truncating sub-second parts.
    pub(crate) fn modified_secs(&self) -> i64 {
        self.modified.timestamp()
    }
}

// =============================================================================
// JSON representation
// =============================================================================

/// Persisted form of an item: base64 content and Unix-second mtime
#[derive(Serialize, Deserialize)]
struct ItemRepr {
    path: String,
    #[serde(rename = "type")]
    type_flag: u8,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    content: String,
    mode: u32,
    mtime: i64,
    uid: u32,
    gid: u32,
}

impl From<Item> for ItemRepr {
    fn from(item: Item) -> Self {
        Self {
            type_flag: item.kind.type_flag(),
            content: STANDARD.encode(item.content()),
            mtime: item.modified_secs(),
            path: item.path,
            mode: item.mode,
            uid: item.uid,
            gid: item.gid,
        }
    }
}

impl TryFrom<ItemRepr> for Item {
    type Error = ArchiveError;

    fn try_from(repr: ItemRepr) -> Result<Self, Self::Error> {
        let content = STANDARD
            .decode(repr.content.as_bytes())
            .map_err(|e| ArchiveError::invalid_entry(&repr.path, format!("content: {e}")))?;

        let kind = match repr.type_flag {
            TYPE_REGULAR | 0 => ItemKind::Regular(content),
            TYPE_DIRECTORY => ItemKind::Directory,
            TYPE_SYMLINK => ItemKind::Symlink(String::from_utf8(content).map_err(|_| {
                ArchiveError::invalid_entry(&repr.path, "symlink target is not valid UTF-8")
            })?),
            other => {
                return Err(ArchiveError::UnsupportedEntryType {
                    path: repr.path,
                    entry_type: format!("{:?}", other as char),
                })
            }
        };

        let modified = DateTime::from_timestamp(repr.mtime, 0).ok_or_else(|| {
            ArchiveError::invalid_entry(&repr.path, format!("mtime {} out of range", repr.mtime))
        })?;

        Ok(Item::user_owned(repr.path, kind, repr.mode, repr.uid, repr.gid).with_modified(modified))
    }
}
