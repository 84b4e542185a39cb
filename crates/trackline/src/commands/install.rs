//! `trackline install`: log in once and report the account id.

use serde::Serialize;

use trackline_core::{Coordinator, CoordinatorConfig};

use crate::cli::{GlobalOpts, InstallArgs};
use crate::config;
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Debug, Serialize)]
struct Installed {
    profile: String,
    username: String,
    account_id: String,
}

pub async fn handle(
    args: InstallArgs,
    cfg: &CoordinatorConfig,
    profile_name: &str,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let coordinator = Coordinator::from_config(cfg)?;

    let spin = util::spinner("Logging in to the portal", global.quiet);
    let result = coordinator.install().await;
    spin.finish_and_clear();
    coordinator.shutdown().await;
    let account_id = result?;

    if args.save {
        save_account_id(profile_name, &account_id)?;
        if !global.quiet {
            eprintln!("Saved account id to profile '{profile_name}'");
        }
    }

    let installed = Installed {
        profile: profile_name.to_owned(),
        username: cfg.username.clone(),
        account_id,
    };
    let rendered = output::render_single(
        &global.output,
        &installed,
        |i| {
            output::detail_block(&[
                ("Profile:", i.profile.clone()),
                ("Username:", i.username.clone()),
                ("Account:", i.account_id.clone()),
            ])
        },
        |i| i.account_id.clone(),
    )?;
    output::print_output(&rendered, global.quiet);
    Ok(())
}

fn save_account_id(profile_name: &str, account_id: &str) -> Result<(), CliError> {
    let mut cfg = config::load_config()?;
    cfg.profiles
        .entry(profile_name.to_owned())
        .or_default()
        .account_id = Some(account_id.to_owned());
    config::save_config(&cfg)?;
    Ok(())
}
