//! Command-line interface definitions for the `vmclone` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::{Args, Parser};

/// Top-level CLI for the `vmclone` binary.
#[derive(Debug, Parser)]
#[command(
    name = "vmclone",
    about = "Manage a vSphere virtual machine cloned from a template snapshot",
    arg_required_else_help = true
)]
pub(crate) enum Cli {
    /// Clone a virtual machine and record it in the state file.
    #[command(
        name = "create",
        about = "Clone a virtual machine and record it in the state file"
    )]
    Create(CreateCommand),
    /// Refresh the recorded virtual machine.
    #[command(name = "read", about = "Refresh the recorded virtual machine")]
    Read(StateArgs),
    /// Power off and destroy the recorded virtual machine.
    #[command(
        name = "delete",
        about = "Power off and destroy the recorded virtual machine"
    )]
    Delete(StateArgs),
    /// Print the resource schema as JSON.
    #[command(name = "schema", about = "Print the resource schema as JSON")]
    Schema,
}

/// Arguments for the `vmclone create` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct CreateCommand {
    /// Resource configuration file (JSON, or TOML when the name ends in `.toml`).
    #[arg(long, value_name = "PATH")]
    pub(crate) config: String,
    #[command(flatten)]
    pub(crate) state: StateArgs,
}

/// State file selection shared by every stateful subcommand.
#[derive(Debug, Args)]
pub(crate) struct StateArgs {
    /// File recording the managed virtual machine.
    #[arg(long, value_name = "PATH", default_value = "vmclone.state.json")]
    pub(crate) state: String,
}
