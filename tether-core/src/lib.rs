//! Tether Core - Entity Types
//!
//! Plain data shared by every other crate: devices, commands, blob entries
//! and decoded telemetry. Hierarchy over blobs is never stored here; it is
//! derived by `tether-vfs`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod command;
pub mod error;

pub use command::{CameraFacing, Command, CommandKind};
pub use error::{DecodeError, DecodeResult};

// ============================================================================
// IDENTITY TYPES
// ============================================================================

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Opaque device identifier assigned by the agent on first check-in.
pub type DeviceId = String;

/// Convert a millisecond Unix epoch into a timestamp, if representable.
pub fn timestamp_from_millis(millis: i64) -> Option<Timestamp> {
    DateTime::<Utc>::from_timestamp_millis(millis)
}

// ============================================================================
// STORE NAMESPACES
// ============================================================================

/// Blob container ("bucket") in the backing store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Container {
    /// Virtual filesystem manifests and arbitrary uploads.
    Files,
    /// Photos and videos.
    Media,
    Audio,
    /// One JSON object per location ping.
    Location,
    /// One text object per log.
    Logs,
}

impl Container {
    pub fn as_str(&self) -> &'static str {
        match self {
            Container::Files => "files",
            Container::Media => "media",
            Container::Audio => "audio",
            Container::Location => "location",
            Container::Logs => "logs",
        }
    }

    pub fn all() -> &'static [Container] {
        &[
            Container::Files,
            Container::Media,
            Container::Audio,
            Container::Location,
            Container::Logs,
        ]
    }
}

impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relational table in the backing store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Table {
    /// `android_id, device_name, last_seen`; read-only for the controller.
    Devices,
    /// `device_id, type, options`; insert-only for the controller.
    Commands,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Devices => "devices",
            Table::Commands => "commands",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// ENTITIES
// ============================================================================

/// A remote agent known to the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    pub display_name: String,
    pub last_seen_at: Option<Timestamp>,
}

/// Whether a blob entry stands for a directory or a leaf object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Directory,
    Object,
}

/// One object in a flat blob namespace.
///
/// Entries never point at a parent or children; see `tether_vfs::FileTree`
/// for the derived hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobEntry {
    pub name: String,
    /// Object key inside `container`. Unique per container.
    pub path: String,
    pub size_bytes: u64,
    pub container: Container,
    pub kind: EntryKind,
    pub last_modified: Option<Timestamp>,
}

impl BlobEntry {
    /// Leaf object whose name equals its key, as produced by a flat listing.
    pub fn object(container: Container, path: impl Into<String>, size_bytes: u64) -> Self {
        let path = path.into();
        Self {
            name: path.clone(),
            path,
            size_bytes,
            container,
            kind: EntryKind::Object,
            last_modified: None,
        }
    }

    pub fn is_directory(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

/// A decoded location ping.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationEvent {
    pub lat: f64,
    pub lng: f64,
    pub timestamp_millis: i64,
}

impl LocationEvent {
    pub fn new(lat: f64, lng: f64, timestamp_millis: i64) -> Self {
        Self {
            lat,
            lng,
            timestamp_millis,
        }
    }

    pub fn recorded_at(&self) -> Option<Timestamp> {
        timestamp_from_millis(self.timestamp_millis)
    }

    /// True for the `(0, 0, 0)` record produced by defaulting every field.
    pub fn is_origin(&self) -> bool {
        self.lat == 0.0 && self.lng == 0.0 && self.timestamp_millis == 0
    }
}
