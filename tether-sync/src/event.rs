//! Messages from background refresh tasks to the foreground.

use std::fmt;
use tether_core::{BlobEntry, Container, Device, DeviceId};
use tether_telemetry::LocationFix;
use tether_vfs::FileTree;

/// A collection owned by the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Devices,
    /// Manifest tree of the selected device.
    Tree,
    Media,
    Audio,
    Locations,
    Logs,
}

impl Collection {
    /// Collection that must be reread after a mutation in `container`.
    pub fn for_container(container: Container) -> Self {
        match container {
            Container::Files => Collection::Tree,
            Container::Media => Collection::Media,
            Container::Audio => Collection::Audio,
            Container::Location => Collection::Locations,
            Container::Logs => Collection::Logs,
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Collection::Devices => "devices",
            Collection::Tree => "tree",
            Collection::Media => "media",
            Collection::Audio => "audio",
            Collection::Locations => "locations",
            Collection::Logs => "logs",
        };
        f.write_str(name)
    }
}

/// Freshly fetched contents of one collection.
#[derive(Debug, Clone)]
pub enum Snapshot {
    Devices(Vec<Device>),
    Tree { device_id: DeviceId, tree: FileTree },
    Listing {
        collection: Collection,
        entries: Vec<BlobEntry>,
    },
    Locations(Vec<LocationFix>),
}

impl Snapshot {
    pub fn collection(&self) -> Collection {
        match self {
            Snapshot::Devices(_) => Collection::Devices,
            Snapshot::Tree { .. } => Collection::Tree,
            Snapshot::Listing { collection, .. } => *collection,
            Snapshot::Locations(_) => Collection::Locations,
        }
    }
}

/// Result of one background refresh.
///
/// `generation` identifies the refresh that produced the event; the
/// coordinator only applies events from the refresh it is waiting on.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    Loaded {
        generation: u64,
        snapshot: Snapshot,
    },
    Failed {
        generation: u64,
        collection: Collection,
        /// Device whose tree was being fetched, for tree refreshes.
        device_id: Option<DeviceId>,
        reason: String,
    },
}

impl SyncEvent {
    pub fn collection(&self) -> Collection {
        match self {
            SyncEvent::Loaded { snapshot, .. } => snapshot.collection(),
            SyncEvent::Failed { collection, .. } => *collection,
        }
    }

    pub fn generation(&self) -> u64 {
        match self {
            SyncEvent::Loaded { generation, .. } | SyncEvent::Failed { generation, .. } => *generation,
        }
    }
}
