use anyhow::{Context, Result};
use swapover_core::UpdateJob;
use tracing::{debug, info};

use crate::processes::ProcessControl;
use crate::report::Reporter;
use crate::service::ServiceControl;

/// Blocks until nothing is running from the files about to be replaced.
///
/// A service stop failure is fatal. Process inspection is advisory: processes
/// whose image cannot be read are skipped.
pub fn quiesce(
    job: &UpdateJob,
    processes: &dyn ProcessControl,
    services: &dyn ServiceControl,
    reporter: &mut Reporter<'_>,
) -> Result<()> {
    if let Some(service) = job.service_name() {
        reporter.progress(0, format!("Stopping service {service}"));
        services
            .stop(service)
            .with_context(|| format!("failed to quiesce service '{service}'"))?;
        reporter.progress(0, format!("Stopped service {service}"));
        return Ok(());
    }

    let current_exe = job.current_exe();
    let Some(file_name) = current_exe.file_name().and_then(|name| name.to_str()) else {
        debug!(path = %current_exe.display(), "current executable has no usable file name");
        return Ok(());
    };

    let own_pid = std::process::id();
    for process in processes.processes_named(file_name) {
        if process.pid == own_pid {
            continue;
        }
        let Some(exe) = process.exe.as_deref() else {
            debug!(pid = process.pid, name = %process.name, "skipping process that cannot be inspected");
            continue;
        };
        if exe != current_exe {
            continue;
        }

        info!(pid = process.pid, "waiting for running instance to exit");
        reporter.note(format!(
            "Waiting for {} (pid {}) to exit",
            process.name, process.pid
        ));
        processes.wait_for_exit(process.pid);
        reporter.note(format!("Process {} exited", process.pid));
    }

    Ok(())
}
