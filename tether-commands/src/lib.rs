//! Tether Commands - Command Channel
//!
//! Commands are appended to the `commands` table and never read back.
//! A `true` from [`CommandChannel::send`] means the store accepted the row,
//! not that the agent has acted on it.

use serde_json::{json, Value};
use std::sync::Arc;
use tether_core::{Command, Table};
use tether_storage::StorageGateway;

/// Encode a command into the generic `{device_id, type, options}` row.
///
/// This is the only place the typed options turn into an untyped mapping.
pub fn command_row(command: &Command) -> Value {
    let mut row = match serde_json::to_value(&command.kind) {
        Ok(Value::Object(map)) => map,
        _ => serde_json::Map::new(),
    };
    row.entry("options").or_insert_with(|| json!({}));
    row.insert("device_id".to_string(), Value::String(command.device_id.clone()));
    Value::Object(row)
}

/// Enqueue side of the command table.
#[derive(Debug, Clone)]
pub struct CommandChannel {
    gateway: Arc<StorageGateway>,
}

impl CommandChannel {
    pub fn new(gateway: Arc<StorageGateway>) -> Self {
        Self { gateway }
    }

    /// Insert `command` as a row. Attempted once; no retry on failure.
    pub async fn send(&self, command: &Command) -> bool {
        if command.device_id.trim().is_empty() {
            tracing::warn!(kind = command.kind.type_tag(), "refusing command without a device id");
            return false;
        }
        let row = command_row(command);
        let accepted = self.gateway.insert_row(Table::Commands, &row).await;
        if accepted {
            tracing::info!(
                device_id = %command.device_id,
                kind = command.kind.type_tag(),
                "command enqueued"
            );
        }
        accepted
    }
}
