//! Subcommand execution over a [`SyncCoordinator`].
//!
//! Every function returns `Ok(true)` on success and `Ok(false)` when a
//! mutation was not confirmed by the store, which maps to exit code 1.

use crate::cli::{CliCommand, SendKind};
use crate::error::CliError;
use serde_json::{json, Value};
use std::io::Write;
use std::path::Path;
use tether_core::{BlobEntry, Command, Container, Device, EntryKind};
use tether_sync::{Collection, SyncCoordinator};
use tether_telemetry::LocationFix;
use tether_vfs::{children_of, normalize_dir};

pub async fn execute<W: Write>(
    command: &CliCommand,
    sync: &mut SyncCoordinator,
    out: &mut W,
    json: bool,
) -> Result<bool, CliError> {
    match command {
        CliCommand::Devices => devices(sync, out, json).await,
        CliCommand::Send { device, kind } => send(sync, out, json, device, kind.clone()).await,
        CliCommand::Ls { device, path } => ls(sync, out, json, device, path).await,
        CliCommand::Get {
            path,
            target,
            output,
        } => get(sync, out, path, target.container.into(), output.as_deref()).await,
        CliCommand::Put {
            device,
            dir,
            local_file,
        } => put(sync, out, json, device, dir, local_file).await,
        CliCommand::Rm {
            path,
            target,
            device,
        } => rm(sync, out, json, path, target.container.into(), device.as_deref()).await,
        CliCommand::Media => listing(sync, out, json, Collection::Media).await,
        CliCommand::Audio => listing(sync, out, json, Collection::Audio).await,
        CliCommand::Locations => locations(sync, out, json).await,
        CliCommand::Logs { show: None } => listing(sync, out, json, Collection::Logs).await,
        CliCommand::Logs { show: Some(name) } => show_log(sync, out, name).await,
    }
}

fn print_json<W: Write>(out: &mut W, value: &Value) -> Result<(), CliError> {
    writeln!(out, "{}", serde_json::to_string_pretty(value)?)?;
    Ok(())
}

fn print_status<W: Write>(out: &mut W, json: bool, ok: bool, message: &str) -> Result<bool, CliError> {
    if json {
        print_json(out, &json!({"ok": ok, "message": message}))?;
    } else {
        writeln!(out, "{}", message)?;
    }
    Ok(ok)
}

async fn devices<W: Write>(sync: &mut SyncCoordinator, out: &mut W, json: bool) -> Result<bool, CliError> {
    sync.refresh(Collection::Devices).await;
    let devices: &[Device] = sync.devices().value().map(Vec::as_slice).unwrap_or_default();
    if json {
        print_json(out, &serde_json::to_value(devices)?)?;
        return Ok(true);
    }
    for device in devices {
        let seen = device
            .last_seen_at
            .map(|at| at.to_rfc3339())
            .unwrap_or_else(|| "never".to_string());
        writeln!(out, "{}\t{}\t{}", device.id, device.display_name, seen)?;
    }
    Ok(true)
}

async fn send<W: Write>(
    sync: &mut SyncCoordinator,
    out: &mut W,
    json: bool,
    device: &str,
    kind: SendKind,
) -> Result<bool, CliError> {
    let command = Command::new(device, kind.into());
    let tag = command.kind.type_tag();
    if sync.send_command(command).await {
        print_status(out, json, true, &format!("sent {} to {}", tag, device))
    } else {
        print_status(out, json, false, &format!("failed to send {} to {}", tag, device))
    }
}

fn entry_line(entry: &BlobEntry) -> String {
    match entry.kind {
        EntryKind::Directory => format!("d\t-\t{}/", entry.name),
        EntryKind::Object => format!("-\t{}\t{}", entry.size_bytes, entry.name),
    }
}

fn print_entries<W: Write>(out: &mut W, json: bool, entries: &[BlobEntry]) -> Result<bool, CliError> {
    if json {
        print_json(out, &serde_json::to_value(entries)?)?;
        return Ok(true);
    }
    for entry in entries {
        writeln!(out, "{}", entry_line(entry))?;
    }
    Ok(true)
}

async fn ls<W: Write>(
    sync: &mut SyncCoordinator,
    out: &mut W,
    json: bool,
    device: &str,
    path: &str,
) -> Result<bool, CliError> {
    sync.select_device(device);
    sync.refresh(Collection::Tree).await;
    let entries = sync
        .tree()
        .value()
        .map(|tree| children_of(tree, &normalize_dir(path)))
        .unwrap_or_default();
    print_entries(out, json, &entries)
}

async fn get<W: Write>(
    sync: &mut SyncCoordinator,
    out: &mut W,
    path: &str,
    container: Container,
    output: Option<&Path>,
) -> Result<bool, CliError> {
    let bytes = sync.gateway().download_object(container, path).await;
    if bytes.is_empty() {
        tracing::warn!(container = %container, path, "nothing downloaded");
        return Ok(false);
    }
    match output {
        Some(file) => std::fs::write(file, &bytes)?,
        None => out.write_all(&bytes)?,
    }
    Ok(true)
}

async fn put<W: Write>(
    sync: &mut SyncCoordinator,
    out: &mut W,
    json: bool,
    device: &str,
    dir: &str,
    local_file: &Path,
) -> Result<bool, CliError> {
    let file_name = local_file
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| CliError::Usage(format!("{} has no file name", local_file.display())))?;
    let bytes = std::fs::read(local_file)?;
    sync.select_device(device);
    if sync.upload_file(dir, file_name, &bytes).await {
        print_status(out, json, true, &format!("uploaded {}", file_name))
    } else {
        print_status(out, json, false, &format!("failed to upload {}", file_name))
    }
}

async fn rm<W: Write>(
    sync: &mut SyncCoordinator,
    out: &mut W,
    json: bool,
    path: &str,
    container: Container,
    device: Option<&str>,
) -> Result<bool, CliError> {
    if let Some(device) = device {
        sync.select_device(device);
    }
    let entry = BlobEntry::object(container, path, 0);
    if sync.delete_file(&entry).await {
        print_status(out, json, true, &format!("deleted {}/{}", container, path))
    } else {
        print_status(out, json, false, &format!("failed to delete {}/{}", container, path))
    }
}

async fn listing<W: Write>(
    sync: &mut SyncCoordinator,
    out: &mut W,
    json: bool,
    collection: Collection,
) -> Result<bool, CliError> {
    sync.refresh(collection).await;
    let cached = match collection {
        Collection::Media => sync.media(),
        Collection::Audio => sync.audio(),
        _ => sync.logs(),
    };
    let entries = cached.value().cloned().unwrap_or_default();
    print_entries(out, json, &entries)
}

fn fix_json(fix: &LocationFix) -> Value {
    json!({
        "lat": fix.event.lat,
        "lng": fix.event.lng,
        "timestamp": fix.event.timestamp_millis,
        "source": fix.source.path,
    })
}

async fn locations<W: Write>(sync: &mut SyncCoordinator, out: &mut W, json: bool) -> Result<bool, CliError> {
    sync.refresh(Collection::Locations).await;
    let fixes: &[LocationFix] = sync.locations().value().map(Vec::as_slice).unwrap_or_default();
    if json {
        print_json(out, &Value::Array(fixes.iter().map(fix_json).collect()))?;
        return Ok(true);
    }
    for fix in fixes {
        let at = fix
            .event
            .recorded_at()
            .map(|at| at.to_rfc3339())
            .unwrap_or_else(|| fix.event.timestamp_millis.to_string());
        writeln!(
            out,
            "{}\t{:.6}\t{:.6}\t{}",
            at, fix.event.lat, fix.event.lng, fix.source.path
        )?;
    }
    Ok(true)
}

async fn show_log<W: Write>(sync: &mut SyncCoordinator, out: &mut W, name: &str) -> Result<bool, CliError> {
    let entry = BlobEntry::object(Container::Logs, name, 0);
    match sync.read_log(&entry).await {
        Some(text) => {
            write!(out, "{}", text)?;
            if !text.ends_with('\n') {
                writeln!(out)?;
            }
            Ok(true)
        }
        None => {
            writeln!(out, "Failed to load log.")?;
            Ok(false)
        }
    }
}
