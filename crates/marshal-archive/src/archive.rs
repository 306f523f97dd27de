//! Archive and RunArchive

use std::io::Cursor;

use serde::{Deserialize, Serialize};

use crate::codec;
use crate::item::Item;
use crate::path;
use crate::Result;

/// Ordered virtual filesystem content.
///
/// Order is insertion order and duplicate paths are kept as-is. An archive is
/// never modified after construction; composition produces a new archive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Archive {
    items: Vec<Item>,
}

impl Archive {
    /// Create an archive from items in order
    pub fn new(items: Vec<Item>) -> Self {
        Self { items }
    }

    /// The items, in order
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    /// Iterate over the items in order
    pub fn iter(&self) -> std::slice::Iter<'_, Item> {
        self.items.iter()
    }

    /// Number of items
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if the archive has no items
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns true if some item's path is exactly `path`.
    pub fn contains_path(&self, path: &str) -> bool {
        let path = path::trim_trailing(path);
        self.items.iter().any(|item| item.path == path)
    }

    /// Returns true if some item is `prefix` itself or nested below it.
    ///
    /// Matching is per path segment, so `/ab` does not fall under `/a`.
    pub fn contains_file_prefix(&self, prefix: &str) -> bool {
        self.items
            .iter()
            .any(|item| path::is_within(prefix, &item.path))
    }

    /// A new archive with these items followed by `other`'s
    pub fn concat(&self, other: &Archive) -> Archive {
        self.items.iter().chain(other.items.iter()).cloned().collect()
    }

    /// A copy with every item path nested under `prefix`
    pub fn relocated(&self, prefix: &str) -> Archive {
        self.items
            .iter()
            .map(|item| Item {
                path: path::join(prefix, &item.path),
                ..item.clone()
            })
            .collect()
    }

    /// Encode as a gzip-compressed tar stream
    pub fn to_tar_gz(&self) -> Result<Vec<u8>> {
        codec::encode(&self.items)
    }

    /// Encode with every item path nested under `prefix`
    pub fn to_relocated_tar_gz(&self, prefix: &str) -> Result<Vec<u8>> {
        self.relocated(prefix).to_tar_gz()
    }

    /// Decode a gzip-compressed tar stream. No partial archive is returned on error.
    pub fn from_tar_gz(bytes: &[u8]) -> Result<Archive> {
        codec::decode(bytes).map(Archive::new)
    }

    /// The encoded stream as a reader, for consumers that copy from `Read`.
    pub fn to_reader(&self) -> Result<Cursor<Vec<u8>>> {
        self.to_tar_gz().map(Cursor::new)
    }

    /// Pair this archive with the path it is materialized at
    pub fn mounted_at(self, path: impl Into<String>) -> RunArchive {
        RunArchive::new(path, self)
    }
}

impl FromIterator<Item> for Archive {
    fn from_iter<I: IntoIterator<Item = Item>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl IntoIterator for Archive {
    type Item = Item;
    type IntoIter = std::vec::IntoIter<Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a Archive {
    type Item = &'a Item;
    type IntoIter = std::slice::Iter<'a, Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl From<Vec<Item>> for Archive {
    fn from(items: Vec<Item>) -> Self {
        Self::new(items)
    }
}

/// An archive plus the path inside the task filesystem where its root lands
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunArchive {
    /// Mount path of the archive root
    pub path: String,
    /// Content
    pub archive: Archive,
}

impl RunArchive {
    /// Create a run archive rooted at `path`
    pub fn new(path: impl Into<String>, archive: Archive) -> Self {
        Self {
            path: path.into(),
            archive,
        }
    }

    /// Each item's path resolved against the mount path, in order
    pub fn resolved_paths(&self) -> impl Iterator<Item = String> + '_ {
        self.archive
            .iter()
            .map(|item| path::join(&self.path, &item.path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::ItemKind;
    use crate::EPOCH;
    use chrono::{TimeZone, Utc};

    fn sample() -> Archive {
        Archive::new(vec![
            Item::root_owned("/run/determined", ItemKind::Directory, 0o755),
            Item::user_owned(
                "/run/determined/train/model.py",
                ItemKind::file("import torch\n"),
                0o644,
                1000,
                1001,
            ),
            Item::root_owned("/run/determined/link", ItemKind::symlink("/determined/link"), 0o777),
            Item::root_owned("/run/determined/empty", ItemKind::file(Vec::new()), 0o600),
        ])
    }

    #[test]
    fn tar_gz_round_trip_preserves_items() {
        let archive = sample();
        let bytes = archive.to_tar_gz().unwrap();
        assert_eq!(Archive::from_tar_gz(&bytes).unwrap(), archive);
    }

    #[test]
    fn round_trip_truncates_sub_second_mtime() {
        let archive = Archive::new(vec![Item::root_owned("/f", ItemKind::file("x"), 0o644)
            .with_modified(Utc.timestamp_opt(10, 900_000_000).unwrap())]);

        let decoded = Archive::from_tar_gz(&archive.to_tar_gz().unwrap()).unwrap();
        assert_eq!(decoded.items()[0].modified, Utc.timestamp_opt(10, 0).unwrap());
    }

    #[test]
    fn round_trip_keeps_ownership_and_mode() {
        let decoded = Archive::from_tar_gz(&sample().to_tar_gz().unwrap()).unwrap();
        let model = &decoded.items()[1];
        assert_eq!((model.uid, model.gid, model.mode), (1000, 1001, 0o644));
        assert_eq!(model.modified, EPOCH);
    }

    #[test]
    fn duplicate_paths_are_kept_in_order() {
        let archive = Archive::new(vec![
            Item::root_owned("/a", ItemKind::file("first"), 0o644),
            Item::root_owned("/a", ItemKind::file("second"), 0o644),
        ]);

        let decoded = Archive::from_tar_gz(&archive.to_tar_gz().unwrap()).unwrap();
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded.items()[1].content(), b"second");
    }

    #[test]
    fn reader_yields_same_bytes() {
        use std::io::Read;

        let archive = sample();
        let mut streamed = Vec::new();
        archive.to_reader().unwrap().read_to_end(&mut streamed).unwrap();
        assert_eq!(Archive::from_tar_gz(&streamed).unwrap(), archive);
    }

    #[test]
    fn containment_by_exact_path_and_ancestors() {
        let archive = sample();
        assert!(archive.contains_path("/run/determined/train/model.py"));
        assert!(!archive.contains_path("/run/determined/train"));

        for ancestor in ["/", "/run", "/run/determined", "/run/determined/train"] {
            assert!(archive.contains_file_prefix(ancestor), "{ancestor}");
        }
        assert!(!archive.contains_file_prefix("/run/determined/tr"));
        assert!(!archive.contains_file_prefix("/opt"));
    }

    #[test]
    fn prefix_containment_respects_segment_boundaries() {
        let archive = Archive::new(vec![Item::root_owned("/ab", ItemKind::file(""), 0o644)]);
        assert!(!archive.contains_file_prefix("/a"));
        assert!(archive.contains_file_prefix("/ab"));
    }

    #[test]
    fn relocated_nests_items_and_leaves_original_untouched() {
        let archive = Archive::new(vec![
            Item::root_owned("/run/determined/train", ItemKind::Directory, 0o755),
            Item::root_owned("model.py", ItemKind::file(""), 0o644),
        ]);

        let moved = archive.relocated("/determined_local_fs/run/determined/workdir/");
        assert_eq!(
            moved.items()[0].path,
            "/determined_local_fs/run/determined/workdir/run/determined/train"
        );
        assert_eq!(moved.items()[1].path, "/determined_local_fs/run/determined/workdir/model.py");
        assert_eq!(archive.items()[0].path, "/run/determined/train");
    }

    #[test]
    fn concat_preserves_order() {
        let a = Archive::new(vec![Item::root_owned("/1", ItemKind::Directory, 0o755)]);
        let b = Archive::new(vec![Item::root_owned("/2", ItemKind::Directory, 0o755)]);

        let joined = a.concat(&b);
        let paths: Vec<_> = joined.iter().map(|i| i.path.as_str()).collect();
        assert_eq!(paths, ["/1", "/2"]);
        assert_eq!(a.len(), 1);
    }

    #[test]
    fn run_archive_resolves_item_paths_against_mount() {
        let run = Archive::new(vec![
            Item::root_owned("task-logging-setup.sh", ItemKind::file(""), 0o755),
            Item::root_owned("/abs", ItemKind::file(""), 0o755),
        ])
        .mounted_at("/run/determined");

        let resolved: Vec<_> = run.resolved_paths().collect();
        assert_eq!(resolved, ["/run/determined/task-logging-setup.sh", "/run/determined/abs"]);
    }

    #[test]
    fn archive_json_is_an_item_list() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json.as_array().map(Vec::len), Some(4));
    }
}
