//! The sync coordinator.
//!
//! Owns the cached collections behind the presentation layer and the
//! refresh cycles that repopulate them. Refreshes run inline or on a
//! spawned task that reports back through an `mpsc` channel; the
//! foreground applies results with [`SyncCoordinator::apply`].

use crate::cache::{Cached, LoadState};
use crate::event::{Collection, Snapshot, SyncEvent};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tether_commands::CommandChannel;
use tether_core::{BlobEntry, Command, Container, Device, DeviceId, Table};
use tether_storage::{GatewayResult, StorageGateway};
use tether_telemetry::{decode_devices, decode_located, decode_log, CoercionPolicy, LocationFix};
use tether_vfs::{ascend, children_of, fetch_tree, traverse, upload_path, FileTree, Traversal, ROOT};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Successful commands kept in the command log.
pub const COMMAND_LOG_CAPACITY: usize = 20;

/// What a refresh of one collection has to fetch.
#[derive(Debug, Clone)]
enum FetchRequest {
    Devices,
    Tree(DeviceId),
    Listing(Collection, Container),
    Locations,
}

impl FetchRequest {
    fn device_id(&self) -> Option<DeviceId> {
        match self {
            FetchRequest::Tree(device_id) => Some(device_id.clone()),
            _ => None,
        }
    }
}

/// The refresh a collection is waiting on.
#[derive(Debug)]
struct Pending {
    generation: u64,
    /// Set for background refreshes only.
    handle: Option<JoinHandle<()>>,
}

async fn fetch(
    gateway: Arc<StorageGateway>,
    policy: CoercionPolicy,
    request: FetchRequest,
) -> GatewayResult<Snapshot> {
    match request {
        FetchRequest::Devices => {
            let rows = gateway.try_select_rows(Table::Devices).await?;
            Ok(Snapshot::Devices(decode_devices(&rows)))
        }
        FetchRequest::Tree(device_id) => {
            let tree = fetch_tree(&gateway, &device_id).await?;
            Ok(Snapshot::Tree { device_id, tree })
        }
        FetchRequest::Listing(collection, container) => {
            let entries = gateway.try_list_objects(container).await?;
            Ok(Snapshot::Listing {
                collection,
                entries,
            })
        }
        FetchRequest::Locations => {
            // Listing happens-before the per-entry downloads.
            let entries = gateway.try_list_objects(Container::Location).await?;
            let fixes = decode_located(&entries, &*gateway, policy).await;
            Ok(Snapshot::Locations(fixes))
        }
    }
}

pub struct SyncCoordinator {
    gateway: Arc<StorageGateway>,
    channel: CommandChannel,
    policy: CoercionPolicy,
    devices: Cached<Vec<Device>>,
    tree: Cached<FileTree>,
    tree_device: Option<DeviceId>,
    current_path: String,
    media: Cached<Vec<BlobEntry>>,
    audio: Cached<Vec<BlobEntry>>,
    locations: Cached<Vec<LocationFix>>,
    logs: Cached<Vec<BlobEntry>>,
    command_log: VecDeque<Command>,
    pending: HashMap<Collection, Pending>,
    next_generation: u64,
}

impl SyncCoordinator {
    pub fn new(gateway: Arc<StorageGateway>) -> Self {
        Self {
            channel: CommandChannel::new(gateway.clone()),
            gateway,
            policy: CoercionPolicy::default(),
            devices: Cached::new(),
            tree: Cached::new(),
            tree_device: None,
            current_path: ROOT.to_string(),
            media: Cached::new(),
            audio: Cached::new(),
            locations: Cached::new(),
            logs: Cached::new(),
            command_log: VecDeque::with_capacity(COMMAND_LOG_CAPACITY),
            pending: HashMap::new(),
            next_generation: 0,
        }
    }

    /// Coercion policy for location pings.
    pub fn with_location_policy(mut self, policy: CoercionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn gateway(&self) -> &Arc<StorageGateway> {
        &self.gateway
    }

    // ------------------------------------------------------------------------
    // Cached state
    // ------------------------------------------------------------------------

    pub fn devices(&self) -> &Cached<Vec<Device>> {
        &self.devices
    }

    pub fn tree(&self) -> &Cached<FileTree> {
        &self.tree
    }

    pub fn media(&self) -> &Cached<Vec<BlobEntry>> {
        &self.media
    }

    pub fn audio(&self) -> &Cached<Vec<BlobEntry>> {
        &self.audio
    }

    pub fn locations(&self) -> &Cached<Vec<LocationFix>> {
        &self.locations
    }

    pub fn logs(&self) -> &Cached<Vec<BlobEntry>> {
        &self.logs
    }

    pub fn state(&self, collection: Collection) -> LoadState {
        match collection {
            Collection::Devices => self.devices.state(),
            Collection::Tree => self.tree.state(),
            Collection::Media => self.media.state(),
            Collection::Audio => self.audio.state(),
            Collection::Locations => self.locations.state(),
            Collection::Logs => self.logs.state(),
        }
    }

    /// Successful commands, newest first.
    pub fn command_log(&self) -> impl Iterator<Item = &Command> {
        self.command_log.iter()
    }

    fn begin(&mut self, collection: Collection) -> bool {
        match collection {
            Collection::Devices => self.devices.begin(),
            Collection::Tree => self.tree.begin(),
            Collection::Media => self.media.begin(),
            Collection::Audio => self.audio.begin(),
            Collection::Locations => self.locations.begin(),
            Collection::Logs => self.logs.begin(),
        }
    }

    fn settle(&mut self, collection: Collection) {
        match collection {
            Collection::Devices => self.devices.settle(),
            Collection::Tree => self.tree.settle(),
            Collection::Media => self.media.settle(),
            Collection::Audio => self.audio.settle(),
            Collection::Locations => self.locations.settle(),
            Collection::Logs => self.logs.settle(),
        }
    }

    // ------------------------------------------------------------------------
    // Refresh
    // ------------------------------------------------------------------------

    fn request_for(&self, collection: Collection) -> Option<FetchRequest> {
        match collection {
            Collection::Devices => Some(FetchRequest::Devices),
            Collection::Tree => self.tree_device.clone().map(FetchRequest::Tree),
            Collection::Media => Some(FetchRequest::Listing(collection, Container::Media)),
            Collection::Audio => Some(FetchRequest::Listing(collection, Container::Audio)),
            Collection::Locations => Some(FetchRequest::Locations),
            Collection::Logs => Some(FetchRequest::Listing(collection, Container::Logs)),
        }
    }

    /// Check preconditions, enter `Loading` and register a new generation.
    fn start(&mut self, collection: Collection) -> Option<(u64, FetchRequest)> {
        let Some(request) = self.request_for(collection) else {
            tracing::warn!(%collection, "no device selected, nothing to refresh");
            return None;
        };
        if !self.begin(collection) {
            tracing::debug!(%collection, "refresh already outstanding");
            return None;
        }
        self.next_generation += 1;
        let generation = self.next_generation;
        self.pending.insert(
            collection,
            Pending {
                generation,
                handle: None,
            },
        );
        Some((generation, request))
    }

    /// Refresh `collection` in place. Returns `true` when fresh data was
    /// stored; on failure the previous value is kept.
    pub async fn refresh(&mut self, collection: Collection) -> bool {
        let Some((generation, request)) = self.start(collection) else {
            return false;
        };
        let device_id = request.device_id();
        let outcome = fetch(self.gateway.clone(), self.policy, request).await;
        self.apply(into_event(generation, collection, device_id, outcome))
    }

    /// Refresh on a background task; the result arrives on `sender` as a
    /// [`SyncEvent`]. Returns `false` if the refresh was not started.
    pub fn spawn_refresh(&mut self, collection: Collection, sender: mpsc::Sender<SyncEvent>) -> bool {
        let Some((generation, request)) = self.start(collection) else {
            return false;
        };
        let gateway = self.gateway.clone();
        let policy = self.policy;
        let handle = tokio::spawn(async move {
            let device_id = request.device_id();
            let outcome = fetch(gateway, policy, request).await;
            let event = into_event(generation, collection, device_id, outcome);
            if sender.send(event).await.is_err() {
                tracing::debug!(%collection, "refresh result dropped, receiver closed");
            }
        });
        if let Some(pending) = self.pending.get_mut(&collection) {
            pending.handle = Some(handle);
        }
        true
    }

    /// Apply a refresh result. Only the result of the refresh the
    /// collection is currently waiting on is applied; results of canceled
    /// or superseded refreshes are discarded without touching state.
    /// Returns `true` when fresh data was stored.
    pub fn apply(&mut self, event: SyncEvent) -> bool {
        let collection = event.collection();
        let generation = event.generation();
        let awaited = self.pending.get(&collection).map(|pending| pending.generation);
        if awaited != Some(generation) {
            tracing::debug!(%collection, generation, ?awaited, "discarding result of superseded refresh");
            return false;
        }
        self.pending.remove(&collection);
        match event {
            SyncEvent::Loaded { snapshot, .. } => self.store(snapshot),
            SyncEvent::Failed {
                collection,
                device_id,
                reason,
                ..
            } => {
                tracing::warn!(
                    %collection,
                    device_id = device_id.as_deref().unwrap_or("-"),
                    reason = %reason,
                    "refresh failed, keeping last known state"
                );
                self.settle(collection);
                false
            }
        }
    }

    fn store(&mut self, snapshot: Snapshot) -> bool {
        match snapshot {
            Snapshot::Devices(devices) => self.devices.complete(devices),
            Snapshot::Tree { device_id, tree } => {
                if self.tree_device.as_deref() != Some(device_id.as_str()) {
                    self.tree.settle();
                    return false;
                }
                self.tree.complete(tree);
                if !self.current_path_exists() {
                    self.current_path = ROOT.to_string();
                }
            }
            Snapshot::Listing {
                collection,
                entries,
            } => match collection {
                Collection::Media => self.media.complete(entries),
                Collection::Audio => self.audio.complete(entries),
                Collection::Logs => self.logs.complete(entries),
                other => {
                    tracing::warn!(collection = %other, "listing for a non-listing collection");
                    self.settle(other);
                    return false;
                }
            },
            Snapshot::Locations(fixes) => self.locations.complete(fixes),
        }
        true
    }

    /// Abort every outstanding background refresh. A canceled mutation may
    /// still have reached the store; the next refresh is authoritative.
    pub fn cancel_all(&mut self) {
        let outstanding: Vec<Collection> = self.pending.keys().copied().collect();
        for collection in outstanding {
            self.cancel(collection);
        }
    }

    fn cancel(&mut self, collection: Collection) {
        if let Some(pending) = self.pending.remove(&collection) {
            if let Some(handle) = pending.handle {
                handle.abort();
            }
            self.settle(collection);
            tracing::debug!(%collection, "refresh canceled");
        }
    }

    // ------------------------------------------------------------------------
    // Mutations: write, then reread on success
    // ------------------------------------------------------------------------

    async fn reread(&mut self, collection: Collection) {
        self.cancel(collection);
        self.refresh(collection).await;
    }

    /// Enqueue a command. Not retried; successful commands are logged.
    pub async fn send_command(&mut self, command: Command) -> bool {
        if !self.channel.send(&command).await {
            return false;
        }
        self.command_log.push_front(command);
        self.command_log.truncate(COMMAND_LOG_CAPACITY);
        true
    }

    /// Upload `bytes` as `file_name` into directory `dir` of the selected
    /// device's files, replacing any existing object, then reload the tree.
    pub async fn upload_file(&mut self, dir: &str, file_name: &str, bytes: &[u8]) -> bool {
        let path = upload_path(dir, file_name);
        if !self.gateway.upload_object(Container::Files, &path, bytes, true).await {
            return false;
        }
        tracing::info!(path = %path, size = bytes.len(), "uploaded file");
        if self.tree_device.is_some() {
            self.reread(Collection::Tree).await;
        }
        true
    }

    /// Delete a listed object and reread the collection it belongs to.
    /// On failure cached state is left untouched.
    pub async fn delete_file(&mut self, entry: &BlobEntry) -> bool {
        if entry.is_directory() {
            tracing::warn!(path = %entry.path, "refusing to delete a directory entry");
            return false;
        }
        if !self.gateway.delete_object(entry.container, &entry.path).await {
            return false;
        }
        tracing::info!(container = %entry.container, path = %entry.path, "deleted object");
        let collection = Collection::for_container(entry.container);
        if collection != Collection::Tree || self.tree_device.is_some() {
            self.reread(collection).await;
        }
        true
    }

    pub async fn delete_location(&mut self, fix: &LocationFix) -> bool {
        self.delete_file(&fix.source).await
    }

    pub async fn delete_log(&mut self, entry: &BlobEntry) -> bool {
        if entry.container != Container::Logs {
            tracing::warn!(container = %entry.container, path = %entry.path, "not a log entry");
            return false;
        }
        self.delete_file(entry).await
    }

    /// Download and decode one log body; `None` when empty, unavailable,
    /// or not a log entry.
    pub async fn read_log(&self, entry: &BlobEntry) -> Option<String> {
        if entry.container != Container::Logs {
            tracing::warn!(container = %entry.container, path = %entry.path, "not a log entry");
            return None;
        }
        let bytes = self.gateway.download_object(entry.container, &entry.path).await;
        decode_log(&bytes)
    }

    // ------------------------------------------------------------------------
    // Directory navigation
    // ------------------------------------------------------------------------

    pub fn selected_device(&self) -> Option<&str> {
        self.tree_device.as_deref()
    }

    /// Switch the file view to `device_id`. Switching device drops the
    /// previous tree and returns to the root.
    pub fn select_device(&mut self, device_id: impl Into<DeviceId>) {
        let device_id = device_id.into();
        if self.tree_device.as_deref() == Some(device_id.as_str()) {
            return;
        }
        self.cancel(Collection::Tree);
        self.tree = Cached::new();
        self.tree_device = Some(device_id);
        self.current_path = ROOT.to_string();
    }

    pub fn current_path(&self) -> &str {
        &self.current_path
    }

    /// Children of the current directory in the last loaded tree.
    pub fn current_listing(&self) -> Vec<BlobEntry> {
        self.tree
            .value()
            .map(|tree| children_of(tree, &self.current_path))
            .unwrap_or_default()
    }

    /// Navigate into `entry` if it is a directory. Returns `false` for
    /// leaf objects.
    pub fn enter(&mut self, entry: &BlobEntry) -> bool {
        match traverse(&self.current_path, entry) {
            Traversal::Descend(path) => {
                self.current_path = path;
                true
            }
            Traversal::Leaf(_) => false,
        }
    }

    pub fn go_up(&mut self) {
        self.current_path = ascend(&self.current_path);
    }

    fn current_path_exists(&self) -> bool {
        self.current_path == ROOT
            || self
                .tree
                .value()
                .is_some_and(|tree| tree.contains_dir(&self.current_path))
    }
}

impl Drop for SyncCoordinator {
    fn drop(&mut self) {
        for handle in self.pending.drain().filter_map(|(_, pending)| pending.handle) {
            handle.abort();
        }
    }
}

impl std::fmt::Debug for SyncCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncCoordinator")
            .field("gateway", &self.gateway)
            .field("policy", &self.policy)
            .field("tree_device", &self.tree_device)
            .field("current_path", &self.current_path)
            .field("outstanding", &self.pending.len())
            .finish()
    }
}

fn into_event(
    generation: u64,
    collection: Collection,
    device_id: Option<DeviceId>,
    outcome: GatewayResult<Snapshot>,
) -> SyncEvent {
    match outcome {
        Ok(snapshot) => SyncEvent::Loaded {
            generation,
            snapshot,
        },
        Err(err) => SyncEvent::Failed {
            generation,
            collection,
            device_id,
            reason: err.to_string(),
        },
    }
}
