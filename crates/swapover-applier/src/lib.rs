mod diagnostics;
mod engine;
mod error;
mod extract;
mod fs_utils;
mod operator;
mod processes;
mod quiesce;
mod relaunch;
mod report;
mod service;

pub use diagnostics::{
    platform_lock_diagnostics, LockDiagnostics, LockHolder, NoLockDiagnostics,
    ProcFdLockDiagnostics,
};
pub use engine::{Collaborators, Orchestrator, RunReport};
pub use error::{is_lock_violation, is_user_cancelled, ApplyError};
pub use extract::{
    clear_destination, extract, plan_extraction, resolve_entry_path, ExtractContext, ExtractIo,
    ExtractStatus, ExtractionPlan, PlannedEntry, SystemExtractIo,
};
pub use operator::{FixedChoiceOperator, Operator};
pub use processes::{split_command_line, ProcessControl, RunningProcess, SystemProcesses};
pub use quiesce::quiesce;
pub use relaunch::relaunch;
pub use report::{NullSink, ProgressSink, Reporter};
pub use service::{ServiceAction, ServiceControl, SystemServices};
