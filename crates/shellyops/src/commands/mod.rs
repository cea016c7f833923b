//! Command dispatch: bridges CLI args -> `SyncManager` -> output formatting.

pub mod config_cmd;
pub mod devices;
pub mod sync;

use shellyops_core::SyncManager;

use crate::cli::{Command, OutputFormat};
use crate::error::CliError;

/// Rendering settings shared by every handler.
#[derive(Debug, Clone, Copy)]
pub struct Render {
    pub format: OutputFormat,
    pub quiet: bool,
    pub color: bool,
}

/// Dispatch a repository-bound command to its handler.
pub async fn dispatch(cmd: Command, manager: &SyncManager, render: Render) -> Result<(), CliError> {
    match cmd {
        Command::Pull => sync::pull(manager, render).await,
        Command::Push(args) => sync::push(manager, args, render).await,
        Command::Devices(args) => devices::handle(manager, args, render).await,
        // Config and Completions are handled before the repository is opened
        Command::Config(_) | Command::Completions(_) => unreachable!(),
    }
}
