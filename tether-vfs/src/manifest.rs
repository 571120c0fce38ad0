//! Decoding of the per-device manifest blob.
//!
//! Body shape: `{"/": [entry, ...], "/DCIM/": [entry, ...]}` where each
//! entry is `{name, path, size, type, lastModified}`. Everything but `name`
//! is optional; unknown keys are ignored.

use crate::path::normalize_dir;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tether_core::{timestamp_from_millis, BlobEntry, Container, DecodeError, DecodeResult, EntryKind};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManifestEntry {
    name: String,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    size: Option<u64>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    last_modified: Option<i64>,
}

impl ManifestEntry {
    fn into_blob(self) -> BlobEntry {
        let kind = match self.kind.as_deref() {
            Some("dir") | Some("directory") => EntryKind::Directory,
            _ => EntryKind::Object,
        };
        let path = match self.path {
            Some(path) if !path.is_empty() => path,
            _ => self.name.clone(),
        };
        BlobEntry {
            name: self.name,
            path,
            size_bytes: self.size.unwrap_or(0),
            container: Container::Files,
            kind,
            last_modified: self
                .last_modified
                .filter(|millis| *millis > 0)
                .and_then(timestamp_from_millis),
        }
    }
}

/// Decode a manifest body into `(normalized directory, entries)` pairs.
///
/// An empty or whitespace-only body is an empty manifest. Keys that
/// normalize to the same directory are merged in document order.
pub fn decode_manifest(bytes: &[u8]) -> DecodeResult<Vec<(String, Vec<BlobEntry>)>> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    let document: Value = serde_json::from_slice(bytes)?;
    if !document.is_object() {
        return Err(DecodeError::NotAnObject);
    }
    let raw: BTreeMap<String, Vec<ManifestEntry>> = serde_json::from_value(document)?;

    let mut merged: BTreeMap<String, Vec<BlobEntry>> = BTreeMap::new();
    for (dir, entries) in raw {
        merged
            .entry(normalize_dir(&dir))
            .or_default()
            .extend(entries.into_iter().map(ManifestEntry::into_blob));
    }
    Ok(merged.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_full_entries() {
        let body = br#"{
            "/": [
                {"name": "DCIM", "path": "/storage/emulated/0/DCIM", "size": 0, "type": "dir", "lastModified": 1700000000000},
                {"name": "notes.txt", "path": "notes.txt", "size": 12, "type": "file", "lastModified": 1700000001000}
            ],
            "/DCIM/": []
        }"#;
        let dirs = decode_manifest(body).unwrap();
        assert_eq!(dirs.len(), 2);
        let (root, entries) = &dirs[0];
        assert_eq!(root, "/");
        assert!(entries[0].is_directory());
        assert_eq!(entries[1].kind, EntryKind::Object);
        assert_eq!(entries[1].size_bytes, 12);
        assert_eq!(
            entries[1].last_modified.map(|t| t.timestamp_millis()),
            Some(1_700_000_001_000)
        );
    }

    #[test]
    fn test_missing_optional_fields_default() {
        let body = br#"{"/": [{"name": "a.bin", "owner": "ignored"}]}"#;
        let dirs = decode_manifest(body).unwrap();
        let entry = &dirs[0].1[0];
        assert_eq!(entry.path, "a.bin");
        assert_eq!(entry.size_bytes, 0);
        assert_eq!(entry.kind, EntryKind::Object);
        assert!(entry.last_modified.is_none());
        assert_eq!(entry.container, Container::Files);
    }

    #[test]
    fn test_keys_are_normalized_and_merged() {
        let body = br#"{"/a": [{"name": "x"}], "/a/": [{"name": "y"}]}"#;
        let dirs = decode_manifest(body).unwrap();
        assert_eq!(dirs.len(), 1);
        assert_eq!(dirs[0].0, "/a/");
        assert_eq!(dirs[0].1.len(), 2);
    }

    #[test]
    fn test_empty_body_is_empty_manifest() {
        assert!(decode_manifest(b"").unwrap().is_empty());
        assert!(decode_manifest(b"  \n").unwrap().is_empty());
    }

    #[test]
    fn test_structural_errors() {
        assert!(matches!(decode_manifest(b"[1,2]"), Err(DecodeError::NotAnObject)));
        assert!(matches!(decode_manifest(b"{not json"), Err(DecodeError::Malformed(_))));
        assert!(matches!(
            decode_manifest(br#"{"/": "nope"}"#),
            Err(DecodeError::Malformed(_))
        ));
    }
}
