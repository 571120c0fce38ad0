//! Tether Test Utilities
//!
//! Shared test infrastructure for the Tether workspace:
//! - In-memory store fixtures wired to a gateway with a fast retry policy
//! - Builders for manifest and location payloads
//! - Proptest generators for paths, locations and commands

pub use tether_storage::{MemoryBackend, Operation};

use proptest::prelude::*;
use serde_json::{json, Value};
use std::sync::Arc;
use tether_core::{CameraFacing, CommandKind, Container, LocationEvent, Table};
use tether_storage::{RetryPolicy, StorageGateway};

// ============================================================================
// STORE FIXTURES
// ============================================================================

/// Retry policy with millisecond delays, so retry tests stay fast.
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        initial_ms: 1,
        max_ms: 4,
        multiplier: 2.0,
        jitter_ms: 0,
    }
}

pub fn memory_store() -> Arc<MemoryBackend> {
    Arc::new(MemoryBackend::new())
}

/// Gateway over `backend` using [`fast_retry`].
pub fn gateway_with(backend: &Arc<MemoryBackend>) -> Arc<StorageGateway> {
    Arc::new(StorageGateway::new(backend.clone()).with_retry(fast_retry()))
}

/// Row as the agent writes it to the `devices` table.
pub fn device_row(id: &str, name: &str, last_seen: &str) -> Value {
    json!({"android_id": id, "device_name": name, "last_seen": last_seen})
}

pub fn seed_device(backend: &MemoryBackend, id: &str, name: &str) {
    backend.push_row(Table::Devices, device_row(id, name, "2024-11-02T10:15:00+00:00"));
}

/// Location ping body with numeric fields.
pub fn location_json(lat: f64, lng: f64, timestamp_millis: i64) -> Vec<u8> {
    json!({"lat": lat, "lng": lng, "timestamp": timestamp_millis})
        .to_string()
        .into_bytes()
}

pub fn seed_location(backend: &MemoryBackend, path: &str, event: LocationEvent) {
    backend.put_object(
        Container::Location,
        path,
        location_json(event.lat, event.lng, event.timestamp_millis),
    );
}

// ============================================================================
// MANIFEST BUILDER
// ============================================================================

/// Builds a `{deviceId}-filetree.json` body.
///
/// ```
/// use tether_test_utils::ManifestBuilder;
///
/// let body = ManifestBuilder::new()
///     .dir("/", "DCIM")
///     .file("/", "notes.txt", "notes.txt", 12)
///     .empty_dir("/DCIM/")
///     .build();
/// assert!(!body.is_empty());
/// ```
#[derive(Debug, Default, Clone)]
pub struct ManifestBuilder {
    dirs: serde_json::Map<String, Value>,
}

impl ManifestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(mut self, dir: &str, entry: Value) -> Self {
        let slot = self
            .dirs
            .entry(dir.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        if let Value::Array(entries) = slot {
            entries.push(entry);
        }
        self
    }

    /// Subdirectory entry `name` listed under `parent`.
    pub fn dir(self, parent: &str, name: &str) -> Self {
        let entry = json!({"name": name, "path": name, "size": 0, "type": "dir"});
        self.push(parent, entry)
    }

    /// Leaf entry listed under `parent`, stored at object key `path`.
    pub fn file(self, parent: &str, name: &str, path: &str, size: u64) -> Self {
        let entry = json!({
            "name": name,
            "path": path,
            "size": size,
            "type": "file",
            "lastModified": 1_700_000_000_000_i64
        });
        self.push(parent, entry)
    }

    pub fn empty_dir(mut self, dir: &str) -> Self {
        self.dirs
            .entry(dir.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        self
    }

    pub fn build(self) -> Vec<u8> {
        Value::Object(self.dirs).to_string().into_bytes()
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

/// Normalized directory paths: `/`, `/a/`, `/a/b/`, ...
pub fn arb_normalized_dir() -> impl Strategy<Value = String> {
    prop::collection::vec("[a-zA-Z0-9_-]{1,10}", 0..5).prop_map(|segments| {
        if segments.is_empty() {
            "/".to_string()
        } else {
            format!("/{}/", segments.join("/"))
        }
    })
}

pub fn arb_location_event() -> impl Strategy<Value = LocationEvent> {
    (-90.0f64..90.0, -180.0f64..180.0, 0i64..4_102_444_800_000)
        .prop_map(|(lat, lng, ts)| LocationEvent::new(lat, lng, ts))
}

pub fn arb_camera() -> impl Strategy<Value = CameraFacing> {
    prop_oneof![Just(CameraFacing::Rear), Just(CameraFacing::Front)]
}

pub fn arb_command_kind() -> impl Strategy<Value = CommandKind> {
    prop_oneof![
        (arb_camera(), any::<bool>())
            .prop_map(|(camera, flash)| CommandKind::CapturePhoto { camera, flash }),
        (arb_camera(), 1u32..600).prop_map(|(camera, duration_secs)| {
            CommandKind::RecordVideo {
                camera,
                duration_secs,
            }
        }),
        (1u32..600).prop_map(|duration_secs| CommandKind::RecordAudio { duration_secs }),
        Just(CommandKind::GetLocation {}),
        Just(CommandKind::RefreshFileTree {}),
        "/[a-zA-Z0-9/_.-]{1,40}".prop_map(|path| CommandKind::UploadFile { path }),
        Just(CommandKind::CollectLogs {}),
    ]
}
