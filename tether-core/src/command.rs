//! Command records sent to agents.
//!
//! Each command type carries its own typed options. The generic
//! `{type, options}` shape only appears when the command channel turns a
//! command into a table row.

use crate::{DeviceId, Timestamp};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Which camera an agent should use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraFacing {
    #[default]
    Rear,
    Front,
}

/// Instruction for an agent, tagged by command type.
///
/// Serializes as `{"type": "<tag>", "options": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "options",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum CommandKind {
    CapturePhoto { camera: CameraFacing, flash: bool },
    RecordVideo { camera: CameraFacing, duration_secs: u32 },
    RecordAudio { duration_secs: u32 },
    GetLocation {},
    /// Ask the agent to re-upload its file tree manifest.
    RefreshFileTree {},
    /// Ask the agent to upload a file from its local storage.
    UploadFile { path: String },
    CollectLogs {},
}

impl CommandKind {
    /// Wire tag stored in the `type` column.
    pub fn type_tag(&self) -> &'static str {
        match self {
            CommandKind::CapturePhoto { .. } => "capturePhoto",
            CommandKind::RecordVideo { .. } => "recordVideo",
            CommandKind::RecordAudio { .. } => "recordAudio",
            CommandKind::GetLocation {} => "getLocation",
            CommandKind::RefreshFileTree {} => "refreshFileTree",
            CommandKind::UploadFile { .. } => "uploadFile",
            CommandKind::CollectLogs {} => "collectLogs",
        }
    }
}

/// A command addressed to one device. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub device_id: DeviceId,
    pub kind: CommandKind,
    pub created_at: Timestamp,
}

impl Command {
    pub fn new(device_id: impl Into<DeviceId>, kind: CommandKind) -> Self {
        Self {
            device_id: device_id.into(),
            kind,
            created_at: Utc::now(),
        }
    }
}
