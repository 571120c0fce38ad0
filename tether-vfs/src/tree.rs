//! Arena/index view of a device's files.
//!
//! `BlobEntry` values live in one arena; the index maps each normalized
//! directory to arena positions. Entries never reference each other, so
//! the whole structure is rebuilt from the manifest on every load.

use crate::manifest::decode_manifest;
use crate::path::{child_path, manifest_name, normalize_dir};
use std::collections::BTreeMap;
use tether_core::{BlobEntry, Container, DecodeResult};
use tether_storage::{GatewayResult, StorageGateway};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileTree {
    entries: Vec<BlobEntry>,
    index: BTreeMap<String, Vec<usize>>,
}

impl FileTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a tree from a manifest body. Empty bodies give an empty tree.
    pub fn from_manifest(bytes: &[u8]) -> DecodeResult<Self> {
        let mut tree = Self::new();
        for (dir, entries) in decode_manifest(bytes)? {
            tree.index.entry(dir.clone()).or_default();
            for entry in entries {
                tree.insert(&dir, entry);
            }
        }
        Ok(tree)
    }

    /// Add `entry` under directory `dir`.
    pub fn insert(&mut self, dir: &str, entry: BlobEntry) {
        let slot = self.entries.len();
        self.entries.push(entry);
        self.index.entry(normalize_dir(dir)).or_default().push(slot);
    }

    /// Entries listed directly under `dir`, in manifest order.
    pub fn children<'a>(&'a self, dir: &str) -> impl Iterator<Item = &'a BlobEntry> + 'a {
        self.index
            .get(&normalize_dir(dir))
            .into_iter()
            .flatten()
            .filter_map(move |slot| self.entries.get(*slot))
    }

    pub fn contains_dir(&self, dir: &str) -> bool {
        self.index.contains_key(&normalize_dir(dir))
    }

    /// Every indexed directory, sorted.
    pub fn directories(&self) -> impl Iterator<Item = &str> {
        self.index.keys().map(String::as_str)
    }

    /// Look up a leaf by its object key.
    pub fn find(&self, path: &str) -> Option<&BlobEntry> {
        self.entries
            .iter()
            .find(|entry| !entry.is_directory() && entry.path == path)
    }

    /// Number of entries across all directories.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.index.is_empty()
    }
}

/// Children of `path`; empty when the directory is not in the tree.
pub fn children_of(tree: &FileTree, path: &str) -> Vec<BlobEntry> {
    tree.children(path).cloned().collect()
}

/// What selecting an entry in directory `current` leads to.
#[derive(Debug, Clone, PartialEq)]
pub enum Traversal<'a> {
    /// Navigate into this directory path.
    Descend(String),
    /// A leaf object, addressable for download or delete.
    Leaf(&'a BlobEntry),
}

pub fn traverse<'a>(current: &str, entry: &'a BlobEntry) -> Traversal<'a> {
    if entry.is_directory() {
        Traversal::Descend(child_path(current, &entry.name))
    } else {
        Traversal::Leaf(entry)
    }
}

/// Load a device's tree, failing only when the store could not be read.
///
/// An absent manifest is an empty tree. A manifest that does not parse is
/// logged and also yields an empty tree.
pub async fn fetch_tree(gateway: &StorageGateway, device_id: &str) -> GatewayResult<FileTree> {
    let name = manifest_name(device_id);
    let bytes = match gateway.try_download_object(Container::Files, &name).await {
        Ok(bytes) => bytes,
        Err(err) if err.is_not_found() => {
            tracing::debug!(device_id, "no manifest uploaded yet");
            return Ok(FileTree::new());
        }
        Err(err) => return Err(err),
    };
    match FileTree::from_manifest(&bytes) {
        Ok(tree) => Ok(tree),
        Err(err) => {
            tracing::warn!(device_id, manifest = %name, error = %err, "unreadable manifest");
            Ok(FileTree::new())
        }
    }
}

/// Load a device's tree; empty on absence, parse error or store failure.
pub async fn load_tree(gateway: &StorageGateway, device_id: &str) -> FileTree {
    match fetch_tree(gateway, device_id).await {
        Ok(tree) => tree,
        Err(err) => {
            tracing::warn!(device_id, error = %err, "file tree unavailable");
            FileTree::new()
        }
    }
}
