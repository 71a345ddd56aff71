use std::process::Command;

use anyhow::{anyhow, Context, Result};

use crate::error::ApplyError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceAction {
    Stop,
    Start,
}

impl ServiceAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stop => "stop",
            Self::Start => "start",
        }
    }
}

/// Service manager operations. Both calls block until the manager reports completion.
pub trait ServiceControl {
    fn stop(&self, name: &str) -> Result<()>;
    fn start(&self, name: &str) -> Result<()>;
}

pub struct SystemServices;

impl ServiceControl for SystemServices {
    fn stop(&self, name: &str) -> Result<()> {
        control_service_with_runner(ServiceAction::Stop, name, run_command)
    }

    fn start(&self, name: &str) -> Result<()> {
        control_service_with_runner(ServiceAction::Start, name, run_command)
    }
}

pub(crate) fn control_service_with_runner<RunCommand>(
    action: ServiceAction,
    name: &str,
    mut run: RunCommand,
) -> Result<()>
where
    RunCommand: FnMut(&mut Command, &str) -> Result<()>,
{
    let mut command = build_service_command(action, name);
    let context_message = format!("failed to {} service '{}'", action.as_str(), name);
    run(&mut command, &context_message).context(ApplyError::ServiceControlFailed {
        service: name.to_string(),
        action: action.as_str(),
    })
}

pub(crate) fn build_service_command(action: ServiceAction, name: &str) -> Command {
    let mut command = if cfg!(windows) {
        Command::new("net")
    } else if cfg!(target_os = "macos") {
        Command::new("launchctl")
    } else {
        Command::new("systemctl")
    };
    command.arg(action.as_str()).arg(name);
    command
}

pub(crate) fn run_command(command: &mut Command, context_message: &str) -> Result<()> {
    let output = command
        .output()
        .with_context(|| format!("{context_message}: command failed to start"))?;
    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    Err(anyhow!(
        "{context_message}: status={} stdout='{}' stderr='{}'",
        output.status,
        stdout.trim(),
        stderr.trim()
    ))
}
