use anyhow::{Context, Result};
use swapover_core::UpdateJob;
use tracing::info;

use crate::error::is_user_cancelled;
use crate::processes::ProcessControl;
use crate::report::Reporter;
use crate::service::ServiceControl;

pub fn relaunch(
    job: &UpdateJob,
    processes: &dyn ProcessControl,
    services: &dyn ServiceControl,
    reporter: &mut Reporter<'_>,
) -> Result<()> {
    if let Some(service) = job.service_name() {
        reporter.note(format!("Starting service {service}"));
        services
            .start(service)
            .with_context(|| format!("failed to restart service '{service}'"))?;
        reporter.note(format!("Started service {service}"));
        return Ok(());
    }

    let target = job.launch_target();
    reporter.note(format!("Launching {}", target.display()));
    match processes.spawn(&target, job.arguments()) {
        Ok(()) => Ok(()),
        Err(err) if is_user_cancelled(&err) => {
            info!(path = %target.display(), "launch cancelled by the user");
            reporter.note(format!("Launch of {} cancelled by the user", target.display()));
            Ok(())
        }
        Err(err) => {
            Err(err).with_context(|| format!("failed to launch {}", target.display()))
        }
    }
}
