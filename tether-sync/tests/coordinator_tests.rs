//! End-to-end behavior of the coordinator over the in-memory store.

use tether_core::{BlobEntry, CameraFacing, Command, CommandKind, Container, LocationEvent};
use tether_sync::{Collection, LoadState, SyncCoordinator, SyncEvent, COMMAND_LOG_CAPACITY};
use tether_test_utils::{
    gateway_with, memory_store, seed_device, seed_location, ManifestBuilder, MemoryBackend,
    Operation,
};
use tether_vfs::{children_of, manifest_name};
use tokio::sync::mpsc;

fn coordinator(backend: &std::sync::Arc<MemoryBackend>) -> SyncCoordinator {
    SyncCoordinator::new(gateway_with(backend))
}

fn seed_tree(backend: &MemoryBackend) {
    let manifest = ManifestBuilder::new()
        .dir("/", "DCIM")
        .file("/", "notes.txt", "notes.txt", 5)
        .file("/DCIM/", "IMG_001.jpg", "DCIM/IMG_001.jpg", 3)
        .build();
    backend.put_object(Container::Files, manifest_name("d1"), manifest);
    backend.put_object(Container::Files, "notes.txt", b"hello".to_vec());
    backend.put_object(Container::Files, "DCIM/IMG_001.jpg", b"jpg".to_vec());
}

fn names(entries: &[BlobEntry]) -> Vec<&str> {
    entries.iter().map(|e| e.name.as_str()).collect()
}

fn photo(device: &str) -> Command {
    Command::new(
        device,
        CommandKind::CapturePhoto {
            camera: CameraFacing::Rear,
            flash: true,
        },
    )
}

// ============================================================================
// REFRESH STATE MACHINE
// ============================================================================

#[tokio::test]
async fn test_devices_refresh_populates() {
    let backend = memory_store();
    seed_device(&backend, "d1", "Pixel 7");
    seed_device(&backend, "d2", "Galaxy");
    let mut sync = coordinator(&backend);

    assert_eq!(sync.state(Collection::Devices), LoadState::Empty);
    assert!(sync.refresh(Collection::Devices).await);
    assert_eq!(sync.state(Collection::Devices), LoadState::Populated);
    let devices = sync.devices().value().unwrap();
    assert_eq!(devices.len(), 2);
    assert_eq!(devices[0].display_name, "Pixel 7");
}

#[tokio::test]
async fn test_failed_first_load_stays_empty() {
    let backend = memory_store();
    backend.fail(Operation::Select, true);
    let mut sync = coordinator(&backend);

    assert!(!sync.refresh(Collection::Devices).await);
    assert_eq!(sync.state(Collection::Devices), LoadState::Empty);
    assert!(sync.devices().value().is_none());
}

#[tokio::test]
async fn test_failed_refresh_keeps_stale_value() {
    let backend = memory_store();
    seed_device(&backend, "d1", "Pixel 7");
    let mut sync = coordinator(&backend);
    assert!(sync.refresh(Collection::Devices).await);

    seed_device(&backend, "d2", "Galaxy");
    backend.fail(Operation::Select, true);
    assert!(!sync.refresh(Collection::Devices).await);

    assert_eq!(sync.state(Collection::Devices), LoadState::Populated);
    assert_eq!(sync.devices().value().unwrap().len(), 1);
}

#[tokio::test]
async fn test_empty_store_is_populated_not_failed() {
    let backend = memory_store();
    let mut sync = coordinator(&backend);

    assert!(sync.refresh(Collection::Media).await);
    assert_eq!(sync.state(Collection::Media), LoadState::Populated);
    assert!(sync.media().value().unwrap().is_empty());
}

#[tokio::test]
async fn test_tree_refresh_requires_selected_device() {
    let backend = memory_store();
    let mut sync = coordinator(&backend);
    assert!(!sync.refresh(Collection::Tree).await);
    assert_eq!(sync.state(Collection::Tree), LoadState::Empty);
}

// ============================================================================
// BACKGROUND REFRESH
// ============================================================================

#[tokio::test]
async fn test_spawned_refresh_reports_through_channel() {
    let backend = memory_store();
    backend.put_object(Container::Audio, "rec-1.m4a", b"aac".to_vec());
    let mut sync = coordinator(&backend);
    let (tx, mut rx) = mpsc::channel(8);

    assert!(sync.spawn_refresh(Collection::Audio, tx.clone()));
    assert_eq!(sync.state(Collection::Audio), LoadState::Loading);
    assert!(!sync.spawn_refresh(Collection::Audio, tx));

    let event = rx.recv().await.unwrap();
    assert!(matches!(event, SyncEvent::Loaded { .. }));
    assert!(sync.apply(event));
    assert_eq!(sync.state(Collection::Audio), LoadState::Populated);
    assert_eq!(names(sync.audio().value().unwrap()), vec!["rec-1.m4a"]);
}

#[tokio::test]
async fn test_spawned_refresh_failure_is_reported() {
    let backend = memory_store();
    backend.fail(Operation::List, true);
    let mut sync = coordinator(&backend);
    let (tx, mut rx) = mpsc::channel(8);

    assert!(sync.spawn_refresh(Collection::Logs, tx));
    let event = rx.recv().await.unwrap();
    assert!(matches!(event, SyncEvent::Failed { collection: Collection::Logs, .. }));
    assert!(!sync.apply(event));
    assert_eq!(sync.state(Collection::Logs), LoadState::Empty);
}

#[tokio::test]
async fn test_cancel_all_abandons_outstanding_refreshes() {
    let backend = memory_store();
    let mut sync = coordinator(&backend);
    let (tx, mut rx) = mpsc::channel(8);

    assert!(sync.spawn_refresh(Collection::Media, tx.clone()));
    assert!(sync.spawn_refresh(Collection::Audio, tx));
    sync.cancel_all();

    assert_eq!(sync.state(Collection::Media), LoadState::Empty);
    assert_eq!(sync.state(Collection::Audio), LoadState::Empty);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_result_of_abandoned_refresh_is_discarded() {
    let backend = memory_store();
    backend.put_object(Container::Media, "IMG_1.jpg", b"jpg".to_vec());
    let mut sync = coordinator(&backend);
    let (tx, mut rx) = mpsc::channel(8);

    assert!(sync.spawn_refresh(Collection::Media, tx));
    let event = rx.recv().await.unwrap();
    sync.cancel_all();

    assert!(!sync.apply(event));
    assert_eq!(sync.state(Collection::Media), LoadState::Empty);
}

#[tokio::test]
async fn test_listing_from_before_delete_does_not_restore_object() {
    let backend = memory_store();
    backend.put_object(Container::Media, "IMG_1.jpg", b"jpg".to_vec());
    let mut sync = coordinator(&backend);
    let (tx, mut rx) = mpsc::channel(8);

    assert!(sync.spawn_refresh(Collection::Media, tx.clone()));
    let before_delete = rx.recv().await.unwrap();

    let target = BlobEntry::object(Container::Media, "IMG_1.jpg", 3);
    assert!(sync.delete_file(&target).await);
    assert!(sync.media().value().unwrap().is_empty());

    assert!(sync.spawn_refresh(Collection::Media, tx));
    let after_delete = rx.recv().await.unwrap();
    assert!(before_delete.generation() < after_delete.generation());

    assert!(!sync.apply(before_delete));
    assert_eq!(sync.state(Collection::Media), LoadState::Loading);
    assert!(sync.apply(after_delete));
    assert_eq!(sync.state(Collection::Media), LoadState::Populated);
    assert!(sync.media().value().unwrap().is_empty());
    assert!(backend.object(Container::Media, "IMG_1.jpg").is_none());
}

#[tokio::test]
async fn test_tree_of_previous_device_does_not_end_new_load() {
    let backend = memory_store();
    seed_tree(&backend);
    backend.put_object(
        Container::Files,
        manifest_name("d2"),
        ManifestBuilder::new().file("/", "d2.txt", "d2.txt", 2).build(),
    );
    let mut sync = coordinator(&backend);
    let (tx, mut rx) = mpsc::channel(8);

    sync.select_device("d1");
    assert!(sync.spawn_refresh(Collection::Tree, tx.clone()));
    let stale = rx.recv().await.unwrap();

    sync.select_device("d2");
    assert!(sync.spawn_refresh(Collection::Tree, tx));
    let fresh = rx.recv().await.unwrap();

    assert!(!sync.apply(stale));
    assert_eq!(sync.state(Collection::Tree), LoadState::Loading);
    assert!(sync.apply(fresh));
    assert_eq!(names(&sync.current_listing()), vec!["d2.txt"]);
}

#[tokio::test]
async fn test_failed_tree_refresh_names_device() {
    let backend = memory_store();
    backend.fail(Operation::Download, true);
    let mut sync = coordinator(&backend);
    let (tx, mut rx) = mpsc::channel(8);

    sync.select_device("d1");
    assert!(sync.spawn_refresh(Collection::Tree, tx));
    let event = rx.recv().await.unwrap();
    match &event {
        SyncEvent::Failed { device_id, .. } => assert_eq!(device_id.as_deref(), Some("d1")),
        other => panic!("expected failure, got {:?}", other),
    }
    assert!(!sync.apply(event));
    assert_eq!(sync.state(Collection::Tree), LoadState::Empty);
}

// ============================================================================
// FILE TREE AND NAVIGATION
// ============================================================================

#[tokio::test]
async fn test_tree_navigation() {
    let backend = memory_store();
    seed_tree(&backend);
    let mut sync = coordinator(&backend);
    sync.select_device("d1");
    assert!(sync.refresh(Collection::Tree).await);

    let root = sync.current_listing();
    assert_eq!(names(&root), vec!["DCIM", "notes.txt"]);
    assert!(!sync.enter(&root[1]));
    assert!(sync.enter(&root[0]));
    assert_eq!(sync.current_path(), "/DCIM/");
    assert_eq!(names(&sync.current_listing()), vec!["IMG_001.jpg"]);

    sync.go_up();
    assert_eq!(sync.current_path(), "/");
    sync.go_up();
    assert_eq!(sync.current_path(), "/");
}

#[tokio::test]
async fn test_switching_device_resets_view() {
    let backend = memory_store();
    seed_tree(&backend);
    let mut sync = coordinator(&backend);
    sync.select_device("d1");
    sync.refresh(Collection::Tree).await;
    let root = sync.current_listing();
    sync.enter(&root[0]);

    sync.select_device("d2");
    assert_eq!(sync.current_path(), "/");
    assert_eq!(sync.state(Collection::Tree), LoadState::Empty);
    assert!(sync.refresh(Collection::Tree).await);
    assert!(sync.current_listing().is_empty());
}

#[tokio::test]
async fn test_failed_delete_leaves_listing_unchanged() {
    let backend = memory_store();
    seed_tree(&backend);
    let mut sync = coordinator(&backend);
    sync.select_device("d1");
    sync.refresh(Collection::Tree).await;
    let before = children_of(sync.tree().value().unwrap(), "/");

    backend.fail(Operation::Delete, true);
    assert!(!sync.delete_file(&before[1]).await);

    let after = children_of(sync.tree().value().unwrap(), "/");
    assert_eq!(before, after);
    assert!(backend.object(Container::Files, "notes.txt").is_some());
    assert_eq!(backend.calls(Operation::Delete), 1);
}

#[tokio::test]
async fn test_successful_delete_rereads_manifest() {
    let backend = memory_store();
    seed_tree(&backend);
    let mut sync = coordinator(&backend);
    sync.select_device("d1");
    sync.refresh(Collection::Tree).await;
    let target = sync.current_listing()[1].clone();

    // The agent republishes its manifest without the file.
    backend.put_object(
        Container::Files,
        manifest_name("d1"),
        ManifestBuilder::new().dir("/", "DCIM").build(),
    );
    assert!(sync.delete_file(&target).await);

    assert!(backend.object(Container::Files, "notes.txt").is_none());
    assert_eq!(names(&sync.current_listing()), vec!["DCIM"]);
}

#[tokio::test]
async fn test_directory_entries_are_not_deleted() {
    let backend = memory_store();
    seed_tree(&backend);
    let mut sync = coordinator(&backend);
    sync.select_device("d1");
    sync.refresh(Collection::Tree).await;
    let dir = sync.current_listing()[0].clone();

    assert!(!sync.delete_file(&dir).await);
    assert_eq!(backend.calls(Operation::Delete), 0);
}

#[tokio::test]
async fn test_upload_writes_into_current_directory_and_rereads() {
    let backend = memory_store();
    seed_tree(&backend);
    let mut sync = coordinator(&backend);
    sync.select_device("d1");
    sync.refresh(Collection::Tree).await;
    let manifest_reads = backend.calls(Operation::Download);

    assert!(sync.upload_file("/DCIM/", "IMG_002.jpg", b"new").await);
    assert_eq!(backend.object(Container::Files, "DCIM/IMG_002.jpg"), Some(b"new".to_vec()));
    assert_eq!(backend.calls(Operation::Download), manifest_reads + 1);

    // Upload replaces an existing object.
    assert!(sync.upload_file("/DCIM/", "IMG_002.jpg", b"newer").await);
    assert_eq!(backend.object(Container::Files, "DCIM/IMG_002.jpg"), Some(b"newer".to_vec()));
}

#[tokio::test]
async fn test_failed_upload_does_not_reread() {
    let backend = memory_store();
    seed_tree(&backend);
    let mut sync = coordinator(&backend);
    sync.select_device("d1");
    sync.refresh(Collection::Tree).await;
    let manifest_reads = backend.calls(Operation::Download);

    backend.fail(Operation::Upload, true);
    assert!(!sync.upload_file("/", "x.bin", b"x").await);
    assert_eq!(backend.calls(Operation::Download), manifest_reads);
    assert_eq!(backend.calls(Operation::Upload), 1);
}

// ============================================================================
// TELEMETRY
// ============================================================================

#[tokio::test]
async fn test_locations_sorted_newest_first_and_malformed_dropped() {
    let backend = memory_store();
    seed_location(&backend, "ping-1.json", LocationEvent::new(1.0, 1.0, 1_000));
    seed_location(&backend, "ping-3.json", LocationEvent::new(3.0, 3.0, 3_000));
    backend.put_object(Container::Location, "ping-2.json", b"{broken".to_vec());
    let mut sync = coordinator(&backend);

    assert!(sync.refresh(Collection::Locations).await);
    let fixes = sync.locations().value().unwrap();
    let stamps: Vec<i64> = fixes.iter().map(|f| f.event.timestamp_millis).collect();
    assert_eq!(stamps, vec![3_000, 1_000]);
    assert_eq!(fixes[0].source.path, "ping-3.json");
}

#[tokio::test]
async fn test_strict_policy_drops_defaulted_pings() {
    let backend = memory_store();
    seed_location(&backend, "ping-1.json", LocationEvent::new(1.0, 1.0, 1_000));
    backend.put_object(Container::Location, "ping-0.json", b"{}".to_vec());
    let mut sync = SyncCoordinator::new(gateway_with(&backend))
        .with_location_policy(tether_telemetry::CoercionPolicy::StrictDrop);

    sync.refresh(Collection::Locations).await;
    assert_eq!(sync.locations().value().unwrap().len(), 1);
}

#[tokio::test]
async fn test_delete_location_rereads() {
    let backend = memory_store();
    seed_location(&backend, "ping-1.json", LocationEvent::new(1.0, 1.0, 1_000));
    seed_location(&backend, "ping-2.json", LocationEvent::new(2.0, 2.0, 2_000));
    let mut sync = coordinator(&backend);
    sync.refresh(Collection::Locations).await;

    let newest = sync.locations().value().unwrap()[0].clone();
    assert!(sync.delete_location(&newest).await);
    let remaining = sync.locations().value().unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].event.timestamp_millis, 1_000);
}

#[tokio::test]
async fn test_read_and_delete_log() {
    let backend = memory_store();
    backend.put_object(Container::Logs, "boot.log", b"started\n".to_vec());
    backend.put_object(Container::Logs, "empty.log", Vec::new());
    let mut sync = coordinator(&backend);
    sync.refresh(Collection::Logs).await;

    let logs = sync.logs().value().unwrap().clone();
    assert_eq!(sync.read_log(&logs[0]).await.as_deref(), Some("started\n"));
    assert_eq!(sync.read_log(&logs[1]).await, None);

    assert!(sync.delete_log(&logs[0]).await);
    assert_eq!(names(sync.logs().value().unwrap()), vec!["empty.log"]);

    let media = BlobEntry::object(Container::Media, "IMG_1.jpg", 1);
    assert!(!sync.delete_log(&media).await);
}

#[tokio::test]
async fn test_read_log_rejects_other_containers() {
    let backend = memory_store();
    backend.put_object(Container::Media, "boot.log", b"not a log".to_vec());
    let sync = coordinator(&backend);

    let entry = BlobEntry::object(Container::Media, "boot.log", 9);
    assert_eq!(sync.read_log(&entry).await, None);
    assert_eq!(backend.calls(Operation::Download), 0);
}

// ============================================================================
// COMMANDS
// ============================================================================

#[tokio::test]
async fn test_command_log_is_bounded_newest_first() {
    let backend = memory_store();
    let mut sync = coordinator(&backend);

    for i in 0..(COMMAND_LOG_CAPACITY + 5) {
        assert!(sync.send_command(photo(&format!("d{}", i))).await);
    }
    let log: Vec<&str> = sync.command_log().map(|c| c.device_id.as_str()).collect();
    assert_eq!(log.len(), COMMAND_LOG_CAPACITY);
    assert_eq!(log[0], "d24");
    assert_eq!(log[COMMAND_LOG_CAPACITY - 1], "d5");
}

#[tokio::test]
async fn test_failed_command_is_not_logged_or_retried() {
    let backend = memory_store();
    backend.fail(Operation::Insert, true);
    let mut sync = coordinator(&backend);

    assert!(!sync.send_command(photo("d1")).await);
    assert_eq!(sync.command_log().count(), 0);
    assert_eq!(backend.calls(Operation::Insert), 1);
}
