//! Tether VFS - Virtual Filesystem Index
//!
//! The `files` bucket is flat. Hierarchy comes only from the per-device
//! manifest `{deviceId}-filetree.json`, which maps normalized directory
//! paths to the entries they contain. The manifest is advisory: entries are
//! never fabricated from raw listings, and the index is rebuilt from
//! scratch on every load rather than patched after uploads or deletes.

pub mod manifest;
pub mod path;
pub mod tree;

pub use manifest::decode_manifest;
pub use path::{ascend, child_path, manifest_name, normalize_dir, upload_path, ROOT};
pub use tree::{children_of, fetch_tree, load_tree, traverse, FileTree, Traversal};
