//! Command dispatch: bridges CLI args -> monitor operations -> output formatting.

pub mod config_cmd;
pub mod routers;
pub mod run;
pub mod subscribers;
pub mod util;

use pppwatch_core::Monitor;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a monitor-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    monitor: &Monitor,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Run => run::handle(monitor).await,
        Command::Routers(args) => routers::handle(monitor, args, global).await,
        Command::Subscribers(args) => subscribers::handle(monitor, args, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => unreachable!(),
    }
}
