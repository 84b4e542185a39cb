//! Command dispatch: bridges CLI args -> coordinator -> output formatting.

pub mod config_cmd;
pub mod control;
pub mod devices;
pub mod install;
pub mod util;
pub mod watch;

use std::sync::Arc;

use trackline_core::{Coordinator, CoordinatorConfig, DeviceLookup, DeviceSnapshot};

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a portal-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    cfg: CoordinatorConfig,
    profile_name: &str,
    global: &GlobalOpts,
    color: bool,
) -> Result<(), CliError> {
    match cmd {
        Command::Install(args) => install::handle(args, &cfg, profile_name, global).await,
        Command::Devices(args) => {
            let snapshot = fetch_snapshot(&cfg, global).await?;
            devices::handle(&snapshot, args, global, color)
        }
        Command::Watch(args) => watch::handle(args, cfg, global, color).await,
        cmd @ (Command::Locate { .. }
        | Command::PowerOff { .. }
        | Command::Message { .. }
        | Command::Command(_)) => control::handle(cmd, &cfg, global).await,
        Command::Config(_) | Command::Completions(_) => Err(CliError::Internal {
            message: "handled before dispatch".into(),
        }),
    }
}

/// Log in, load one snapshot, and close the session.
async fn fetch_snapshot(
    cfg: &CoordinatorConfig,
    global: &GlobalOpts,
) -> Result<Arc<DeviceSnapshot>, CliError> {
    let spin = util::spinner("Fetching devices", global.quiet);
    let result =
        Coordinator::oneshot(cfg.build_client()?, cfg.poll, |c| async move { Ok(c.snapshot()) })
            .await;
    spin.finish_and_clear();
    Ok(result?)
}
