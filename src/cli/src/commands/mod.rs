//! CLI command definitions and dispatch.

mod mounts;
mod users;
mod which;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use guestdisk_core::{InspectConfig, LogLevel};
use guestdisk_runtime::GuestSession;

/// guestdisk - inspect virtual machine disk images offline.
#[derive(Parser)]
#[command(name = "guestdisk", version, about)]
pub struct Cli {
    /// Log message verbosity (debug, info, warn)
    #[arg(short = 'l', long = "loglevel", global = true, default_value = "warn")]
    pub loglevel: LogLevel,

    /// YAML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Command {
    /// Show the root filesystem and the mounted partitions
    Mounts(mounts::MountsArgs),
    /// List human accounts in the guest
    Users(users::UsersArgs),
    /// Locate executables in the guest's binary directories
    Which(which::WhichArgs),
}

/// Load the configuration named on the command line, or the defaults.
pub(crate) fn load_config(path: Option<&Path>) -> Result<InspectConfig, Box<dyn std::error::Error>> {
    match path {
        Some(path) => Ok(InspectConfig::from_file(path)?),
        None => Ok(InspectConfig::default()),
    }
}

/// Open a session on `disk`, logging through the installed subscriber.
pub(crate) fn open_session(
    disk: &Path,
    config: InspectConfig,
) -> Result<GuestSession, Box<dyn std::error::Error>> {
    let dispatch = tracing::dispatcher::get_default(|current| current.clone());
    Ok(GuestSession::open(disk, config, dispatch)?)
}

/// Dispatch a parsed CLI to the appropriate command handler.
pub fn dispatch(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(cli.config.as_deref())?;
    tracing::debug!(loglevel = %cli.loglevel, ?config, "Parsed command line");

    match cli.command {
        Command::Mounts(args) => mounts::execute(args, config),
        Command::Users(args) => users::execute(args, config),
        Command::Which(args) => which::execute(args, config),
    }
}
