//! Device rows from the `devices` table.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;
use tether_core::{Device, Timestamp};

/// Decode one `devices` row.
///
/// Rows without a non-blank `android_id` are rejected. A missing
/// `device_name` falls back to the id.
pub fn decode_device_row(row: &Value) -> Option<Device> {
    let id = row.get("android_id")?.as_str()?.trim();
    if id.is_empty() {
        return None;
    }
    let display_name = row
        .get("device_name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(id)
        .to_string();
    let last_seen_at = row
        .get("last_seen")
        .and_then(Value::as_str)
        .and_then(parse_timestamp);
    Some(Device {
        id: id.to_string(),
        display_name,
        last_seen_at,
    })
}

/// Decode every usable row, keeping table order.
pub fn decode_devices(rows: &[Value]) -> Vec<Device> {
    let devices: Vec<Device> = rows.iter().filter_map(decode_device_row).collect();
    if devices.len() < rows.len() {
        tracing::debug!(
            dropped = rows.len() - devices.len(),
            "ignoring device rows without an id"
        );
    }
    devices
}

fn parse_timestamp(raw: &str) -> Option<Timestamp> {
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(at.with_timezone(&Utc));
    }
    // Timestamp columns without a zone come back as naive values in UTC.
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc())
}
