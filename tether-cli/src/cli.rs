//! Command-line surface.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tether_core::{CameraFacing, CommandKind, Container};

#[derive(Parser, Debug)]
#[command(author, version, about = "Controller for remote Tether agents")]
pub struct Cli {
    #[arg(long, env = "TETHER_CONFIG", global = true, help = "Path to the TOML config file")]
    pub config: Option<PathBuf>,
    #[arg(long, global = true, help = "Emit JSON instead of text")]
    pub json: bool,
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Subcommand, Debug)]
pub enum CliCommand {
    /// List devices that have checked in.
    Devices,
    /// Send a command to a device.
    Send {
        device: String,
        #[command(subcommand)]
        kind: SendKind,
    },
    /// List a directory of a device's file tree.
    Ls {
        device: String,
        #[arg(default_value = "/")]
        path: String,
    },
    /// Download an object.
    Get {
        path: String,
        #[command(flatten)]
        target: ContainerArg,
        #[arg(short, long, help = "Write to this file instead of stdout")]
        output: Option<PathBuf>,
    },
    /// Upload a local file into a device directory.
    Put {
        device: String,
        dir: String,
        local_file: PathBuf,
    },
    /// Delete an object.
    Rm {
        path: String,
        #[command(flatten)]
        target: ContainerArg,
        #[arg(long, help = "Device whose file tree should be reloaded")]
        device: Option<String>,
    },
    /// List photos and videos.
    Media,
    /// List audio recordings.
    Audio,
    /// List location pings, newest first.
    Locations,
    /// List logs, or print one.
    Logs {
        #[arg(long, value_name = "NAME")]
        show: Option<String>,
    },
}

#[derive(Args, Debug, Clone, Copy)]
pub struct ContainerArg {
    #[arg(long, value_enum, default_value_t = BucketArg::Files)]
    pub container: BucketArg,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketArg {
    Files,
    Media,
    Audio,
    Location,
    Logs,
}

impl From<BucketArg> for Container {
    fn from(value: BucketArg) -> Self {
        match value {
            BucketArg::Files => Container::Files,
            BucketArg::Media => Container::Media,
            BucketArg::Audio => Container::Audio,
            BucketArg::Location => Container::Location,
            BucketArg::Logs => Container::Logs,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CameraArg {
    #[default]
    Rear,
    Front,
}

impl From<CameraArg> for CameraFacing {
    fn from(value: CameraArg) -> Self {
        match value {
            CameraArg::Rear => CameraFacing::Rear,
            CameraArg::Front => CameraFacing::Front,
        }
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum SendKind {
    /// Take a photo.
    Photo {
        #[arg(long, value_enum, default_value_t = CameraArg::Rear)]
        camera: CameraArg,
        #[arg(long)]
        flash: bool,
    },
    /// Record a video.
    Video {
        #[arg(long, value_enum, default_value_t = CameraArg::Rear)]
        camera: CameraArg,
        #[arg(long, default_value_t = 10)]
        duration: u32,
    },
    /// Record audio.
    Audio {
        #[arg(long, default_value_t = 10)]
        duration: u32,
    },
    /// Report the current location.
    Location,
    /// Re-upload the file tree manifest.
    RefreshTree,
    /// Upload a file from the device.
    Upload { path: String },
    /// Upload recent logs.
    CollectLogs,
}

impl From<SendKind> for CommandKind {
    fn from(value: SendKind) -> Self {
        match value {
            SendKind::Photo { camera, flash } => CommandKind::CapturePhoto {
                camera: camera.into(),
                flash,
            },
            SendKind::Video { camera, duration } => CommandKind::RecordVideo {
                camera: camera.into(),
                duration_secs: duration,
            },
            SendKind::Audio { duration } => CommandKind::RecordAudio {
                duration_secs: duration,
            },
            SendKind::Location => CommandKind::GetLocation {},
            SendKind::RefreshTree => CommandKind::RefreshFileTree {},
            SendKind::Upload { path } => CommandKind::UploadFile { path },
            SendKind::CollectLogs => CommandKind::CollectLogs {},
        }
    }
}
