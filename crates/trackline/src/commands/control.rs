//! Device command handlers: locate, power-off, message, raw functions.

use serde::Serialize;

use trackline_core::{Command as CoreCommand, CommandResult, Coordinator, CoordinatorConfig};

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::util;

/// What the CLI reports after a command was sent.
#[derive(Debug, Serialize)]
struct Outcome {
    device: String,
    command: &'static str,
    code: Option<String>,
    accepted: bool,
}

/// Translate a CLI control subcommand into a core command.
fn to_core(cmd: Command) -> Option<CoreCommand> {
    Some(match cmd {
        Command::Locate { device } => CoreCommand::RefreshLocation { device_id: device },
        Command::PowerOff { device } => CoreCommand::PowerOff { device_id: device },
        Command::Message { device, text } => CoreCommand::SendMessage {
            device_id: device,
            message: text,
        },
        Command::Command(args) => CoreCommand::Function {
            device_id: args.device,
            code: args.code,
            value: args.value,
            value_param: args.param,
        },
        _ => return None,
    })
}

fn validate(cmd: &CoreCommand) -> Result<(), CliError> {
    match cmd {
        CoreCommand::SendMessage { message, .. } if message.trim().is_empty() => {
            Err(CliError::Validation {
                field: "text".into(),
                reason: "message must not be empty".into(),
            })
        }
        CoreCommand::Function { code, .. }
            if code.is_empty() || !code.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            Err(CliError::Validation {
                field: "code".into(),
                reason: format!("'{code}' is not a portal function code"),
            })
        }
        _ => Ok(()),
    }
}

pub async fn handle(
    cmd: Command,
    config: &CoordinatorConfig,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let Some(core_cmd) = to_core(cmd) else {
        return Err(CliError::Internal {
            message: "not a device command".into(),
        });
    };
    validate(&core_cmd)?;

    if let CoreCommand::PowerOff { ref device_id } = core_cmd {
        let prompt = format!("Switch off '{device_id}'? It can only be turned on at the watch.");
        if !util::confirm(&prompt, "power-off", global.yes)? {
            return Ok(());
        }
    }

    let label = core_cmd.label();
    let code = core_cmd.code().map(str::to_owned);

    let spin = util::spinner(&format!("Sending {label}"), global.quiet);
    let result = Coordinator::oneshot(config.build_client()?, config.poll, |c| async move {
        c.execute(core_cmd).await
    })
    .await;
    spin.finish_and_clear();

    let CommandResult {
        device_id,
        accepted,
    } = result?;
    if !accepted {
        return Err(CliError::CommandRejected {
            command: label.into(),
            device: device_id,
        });
    }

    let outcome = Outcome {
        device: device_id,
        command: label,
        code,
        accepted,
    };
    let rendered = output::render_single(
        &global.output,
        &outcome,
        |o| format!("{} sent to {}", o.command, o.device),
        |o| o.device.clone(),
    )?;
    output::print_output(&rendered, global.quiet);
    Ok(())
}
