mod render;
mod session;

use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use swapover_applier::{
    platform_lock_diagnostics, Collaborators, Orchestrator, SystemExtractIo, SystemProcesses,
    SystemServices,
};
use swapover_core::{ApplierSettings, CancelToken, JobOutcome, UpdateJob, UpdateLog, UpdateRequest};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use crate::render::{resolve_output_style, OutputStyle};
use crate::session::{drive_session, ChannelOperator, ChannelSink, TerminalView, UiMessage};

const EXIT_OK: i32 = 0;
const EXIT_FAILED: i32 = 1;
const EXIT_CANCELLED: i32 = 2;

#[derive(Parser, Debug)]
#[command(name = "swapover")]
#[command(about = "Applies a downloaded update package and relaunches the application", long_about = None)]
struct Cli {
    /// Update archive to apply.
    #[arg(long)]
    input: Option<PathBuf>,
    /// Destination root the archive is extracted into.
    #[arg(long)]
    output: Option<PathBuf>,
    #[arg(long = "current-exe")]
    current_exe: Option<PathBuf>,
    /// Executable to launch instead of current-exe, relative to output.
    #[arg(long = "updated-exe")]
    updated_exe: Option<PathBuf>,
    /// Delete everything under output before extracting.
    #[arg(long)]
    clear: bool,
    #[arg(long = "service-name")]
    service_name: Option<String>,
    /// Command line handed verbatim to the relaunched executable.
    #[arg(long, allow_hyphen_values = true)]
    args: Option<String>,
    #[arg(long)]
    settings: Option<PathBuf>,
    #[arg(long = "log-file", env = "SWAPOVER_LOG_FILE")]
    log_file: Option<PathBuf>,
    #[arg(long, value_enum)]
    style: Option<OutputStyle>,
}

impl Cli {
    fn update_request(&self) -> UpdateRequest {
        UpdateRequest {
            input: self.input.clone(),
            output: self.output.clone(),
            current_exe: self.current_exe.clone(),
            updated_exe: self.updated_exe.clone(),
            clear: self.clear,
            service_name: self.service_name.clone(),
            args: self.args.clone(),
        }
    }
}

fn main() {
    init_tracing();
    let raw_args = std::env::args_os().skip(1).collect::<Vec<_>>();
    let cli = match Cli::try_parse_from(known_arguments(std::env::args_os())) {
        Ok(cli) => cli,
        Err(err) if err.kind() == ErrorKind::DisplayHelp => err.exit(),
        Err(err) => {
            let _ = err.print();
            std::process::exit(EXIT_FAILED);
        }
    };

    std::process::exit(run(cli, &raw_args));
}

/// Keeps the program name, every recognised long option and its value, and
/// drops everything else. The parent application may pass options this
/// helper does not know; they must not hide the ones it does.
fn known_arguments(raw: impl IntoIterator<Item = OsString>) -> Vec<OsString> {
    let command = Cli::command();
    let mut raw = raw.into_iter();
    let mut kept = raw.next().into_iter().collect::<Vec<_>>();
    let mut value_pending = false;

    for arg in raw {
        if value_pending {
            value_pending = false;
            kept.push(arg);
            continue;
        }

        let text = arg.to_string_lossy().into_owned();
        if text == "-h" || text == "--help" {
            kept.push(arg);
            continue;
        }
        let Some(option) = text.strip_prefix("--") else {
            continue;
        };
        let (name, inline_value) = match option.split_once('=') {
            Some((name, _)) => (name, true),
            None => (option, false),
        };
        let Some(known) = command
            .get_arguments()
            .find(|candidate| candidate.get_long() == Some(name))
        else {
            debug!(argument = %text, "ignoring unrecognised argument");
            continue;
        };

        value_pending = known.get_action().takes_values() && !inline_value;
        kept.push(arg);
    }

    kept
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("SWAPOVER_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn run(cli: Cli, raw_args: &[OsString]) -> i32 {
    let mut log = startup_log(raw_args);
    let Some((settings, log_path)) = load_settings(&cli, &mut log) else {
        return EXIT_FAILED;
    };
    let style = resolve_output_style(
        cli.style,
        std::io::stdout().is_terminal(),
        std::env::var_os("NO_COLOR").is_some(),
    );
    let interactive = std::io::stdin().is_terminal() && std::io::stderr().is_terminal();

    let job = UpdateJob::from_request(&cli.update_request());
    let policy = settings.lock_retry.clone();
    let fallback = policy.non_interactive_choice;

    let cancel = CancelToken::new();
    let interrupt = cancel.clone();
    if let Err(err) = ctrlc::set_handler(move || interrupt.cancel()) {
        warn!(error = %err, "failed to install interrupt handler");
    }

    let (tx, rx) = mpsc::channel::<UiMessage>();
    let worker = thread::spawn(move || {
        let processes = SystemProcesses;
        let services = SystemServices;
        let diagnostics = platform_lock_diagnostics();
        let extract_io = SystemExtractIo;
        let operator = ChannelOperator::new(tx.clone(), fallback);
        let sink = ChannelSink::new(tx.clone());
        let env = Collaborators {
            processes: &processes,
            services: &services,
            diagnostics: diagnostics.as_ref(),
            extract_io: &extract_io,
            operator: &operator,
        };

        let report = Orchestrator::new(env, policy).run(job, &sink, log, &cancel);
        let _ = tx.send(UiMessage::Finished(report));
    });

    let mut view = TerminalView::new(style, interactive, fallback);
    let report = drive_session(rx, &mut view);
    if worker.join().is_err() {
        warn!("update worker panicked");
    }

    let (outcome, mut log) = match report {
        Some(report) => (report.outcome, report.log),
        None => {
            let reason = "update worker stopped without reporting".to_string();
            (Some(JobOutcome::Failed(reason)), startup_log(raw_args))
        }
    };
    view.into_progress().finish(outcome.as_ref());

    log.record(final_log_line(outcome.as_ref()));
    persist_log(log, &log_path);

    exit_code_for(outcome.as_ref())
}

/// Loads settings and resolves the log file. A settings failure ends the run,
/// but the startup lines and the failure still reach the log file.
fn load_settings(cli: &Cli, log: &mut UpdateLog) -> Option<(ApplierSettings, PathBuf)> {
    match ApplierSettings::load_optional(cli.settings.as_deref()) {
        Ok(settings) => {
            let log_path = settings.resolve_log_file(cli.log_file.as_deref());
            Some((settings, log_path))
        }
        Err(err) => {
            let reason = format!("{err:#}");
            eprintln!("error: {reason}");
            log.record(final_log_line(Some(&JobOutcome::Failed(reason))));
            let log_path = ApplierSettings::default().resolve_log_file(cli.log_file.as_deref());
            persist_log(std::mem::take(log), &log_path);
            None
        }
    }
}

fn persist_log(log: UpdateLog, path: &Path) {
    if let Err(err) = log.append_to_file(path) {
        warn!(error = %format!("{err:#}"), path = %path.display(), "failed to persist update log");
    }
}

fn startup_log(raw_args: &[OsString]) -> UpdateLog {
    let mut log = UpdateLog::new();
    log.record("Start update");
    for arg in raw_args {
        log.record(format!("Argument: {}", arg.to_string_lossy()));
    }
    log
}

fn final_log_line(outcome: Option<&JobOutcome>) -> String {
    match outcome {
        None => "No update task supplied; exiting".to_string(),
        Some(JobOutcome::Completed) => "Update completed; exiting".to_string(),
        Some(JobOutcome::Cancelled) => "Update cancelled; exiting".to_string(),
        Some(JobOutcome::Failed(reason)) => format!("Update failed: {reason}; exiting"),
    }
}

fn exit_code_for(outcome: Option<&JobOutcome>) -> i32 {
    match outcome {
        None | Some(JobOutcome::Completed) => EXIT_OK,
        Some(JobOutcome::Cancelled) => EXIT_CANCELLED,
        Some(JobOutcome::Failed(_)) => EXIT_FAILED,
    }
}
