//! Tether CLI
//!
//! Thin presentation layer over the sync coordinator: one subcommand per
//! view, plain text or JSON on stdout, logs on stderr.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;

pub use cli::{Cli, CliCommand};
pub use commands::execute;
pub use config::{ConfigError, TetherConfig};
pub use error::CliError;
