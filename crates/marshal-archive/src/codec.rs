//! Gzip+tar codec
//!
//! Paths are written verbatim, absolute ones included, since archives describe
//! container filesystem content rather than something to unpack on the host.
//! Names and link targets longer than a tar header slot are carried in GNU
//! long-name entries.

use std::io::Read;

use chrono::DateTime;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tar::{EntryType, Header};

use crate::error::ArchiveError;
use crate::item::{Item, ItemKind};
use crate::Result;

/// Width of the name and linkname fields in a tar header
const NAME_FIELD_LEN: usize = 100;

/// Name used for GNU long-name and long-link pseudo entries
const LONG_LINK_NAME: &[u8] = b"././@LongLink";

type TarWriter = tar::Builder<GzEncoder<Vec<u8>>>;

/// Serialize items, in order, into a gzip-compressed tar stream.
pub(crate) fn encode(items: &[Item]) -> Result<Vec<u8>> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));

    for item in items {
        append_item(&mut builder, item)?;
    }

    builder
        .into_inner()
        .map_err(ArchiveError::Finish)?
        .finish()
        .map_err(ArchiveError::Finish)
}

fn append_item(builder: &mut TarWriter, item: &Item) -> Result<()> {
    let mtime = u64::try_from(item.modified_secs()).map_err(|_| {
        ArchiveError::TimestampBeforeEpoch {
            path: item.path.clone(),
        }
    })?;
    let encode_err = |source| ArchiveError::Encode {
        path: item.path.clone(),
        source,
    };

    let name = item.path.as_bytes();
    if name.len() > NAME_FIELD_LEN {
        append_long_field(builder, EntryType::GNULongName, name).map_err(encode_err)?;
    }

    let mut header = Header::new_gnu();
    write_field(&mut header.as_old_mut().name, name);
    header.set_entry_type(entry_type(&item.kind));
    header.set_mode(item.mode);
    header.set_uid(u64::from(item.uid));
    header.set_gid(u64::from(item.gid));
    header.set_mtime(mtime);

    let data: &[u8] = match &item.kind {
        ItemKind::Regular(content) => content,
        ItemKind::Directory => &[],
        ItemKind::Symlink(target) => {
            let target = target.as_bytes();
            if target.len() > NAME_FIELD_LEN {
                append_long_field(builder, EntryType::GNULongLink, target).map_err(encode_err)?;
            }
            write_field(&mut header.as_old_mut().linkname, target);
            &[]
        }
    };
    header.set_size(data.len() as u64);
    header.set_cksum();

    builder.append(&header, data).map_err(encode_err)
}

/// Write a GNU `L`/`K` pseudo entry carrying a NUL-terminated long value
fn append_long_field(builder: &mut TarWriter, kind: EntryType, value: &[u8]) -> std::io::Result<()> {
    let mut data = Vec::with_capacity(value.len() + 1);
    data.extend_from_slice(value);
    data.push(0);

    let mut header = Header::new_gnu();
    write_field(&mut header.as_old_mut().name, LONG_LINK_NAME);
    header.set_entry_type(kind);
    header.set_mode(0o644);
    header.set_uid(0);
    header.set_gid(0);
    header.set_mtime(0);
    header.set_size(data.len() as u64);
    header.set_cksum();

    builder.append(&header, data.as_slice())
}

fn write_field(slot: &mut [u8], value: &[u8]) {
    let len = value.len().min(slot.len());
    slot[..len].copy_from_slice(&value[..len]);
}

fn entry_type(kind: &ItemKind) -> EntryType {
    match kind {
        ItemKind::Regular(_) => EntryType::Regular,
        ItemKind::Directory => EntryType::Directory,
        ItemKind::Symlink(_) => EntryType::Symlink,
    }
}

/// Parse a gzip-compressed tar stream back into items.
///
/// Any error discards everything decoded so far.
pub(crate) fn decode(bytes: &[u8]) -> Result<Vec<Item>> {
    let mut archive = tar::Archive::new(GzDecoder::new(bytes));
    let mut items = Vec::new();

    for entry in archive.entries().map_err(ArchiveError::Decode)? {
        let mut entry = entry.map_err(ArchiveError::Decode)?;

        let raw_path = entry.path_bytes().into_owned();
        let path = String::from_utf8(raw_path).map_err(|e| {
            ArchiveError::invalid_entry(
                String::from_utf8_lossy(e.as_bytes()),
                "path is not valid UTF-8",
            )
        })?;

        let header = entry.header();
        let mut kind = match header.entry_type() {
            EntryType::Regular | EntryType::Continuous => ItemKind::Regular(Vec::new()),
            EntryType::Directory => ItemKind::Directory,
            EntryType::Symlink => ItemKind::Symlink(String::new()),
            other => {
                return Err(ArchiveError::UnsupportedEntryType {
                    path,
                    entry_type: format!("{other:?}"),
                })
            }
        };

        let mode = header.mode().map_err(ArchiveError::Decode)? & 0o7777;
        let uid = id_field(&path, "uid", header.uid().map_err(ArchiveError::Decode)?)?;
        let gid = id_field(&path, "gid", header.gid().map_err(ArchiveError::Decode)?)?;
        let mtime = header.mtime().map_err(ArchiveError::Decode)?;

        let modified = i64::try_from(mtime)
            .ok()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .ok_or_else(|| ArchiveError::invalid_entry(&path, format!("mtime {mtime} out of range")))?;

        match &mut kind {
            ItemKind::Regular(content) => {
                entry.read_to_end(content).map_err(ArchiveError::Decode)?;
            }
            ItemKind::Symlink(target) => {
                let raw = entry
                    .link_name_bytes()
                    .map(|bytes| bytes.into_owned())
                    .unwrap_or_default();
                *target = String::from_utf8(raw).map_err(|_| {
                    ArchiveError::invalid_entry(&path, "link target is not valid UTF-8")
                })?;
            }
            ItemKind::Directory => {}
        }

        items.push(Item::user_owned(path, kind, mode, uid, gid).with_modified(modified));
    }

    Ok(items)
}

fn id_field(path: &str, field: &str, value: u64) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| ArchiveError::invalid_entry(path, format!("{field} {value} out of range")))
}
