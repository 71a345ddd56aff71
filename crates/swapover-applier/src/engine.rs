use anyhow::Result;
use swapover_core::{CancelToken, JobOutcome, JobState, LockRetryPolicy, UpdateJob, UpdateLog};
use tracing::{debug, error};

use crate::diagnostics::LockDiagnostics;
use crate::extract::{extract, ExtractContext, ExtractIo, ExtractStatus};
use crate::operator::Operator;
use crate::processes::ProcessControl;
use crate::quiesce::quiesce;
use crate::relaunch::relaunch;
use crate::report::{ProgressSink, Reporter};
use crate::service::ServiceControl;

/// Everything the engine touches outside its own memory.
pub struct Collaborators<'a> {
    pub processes: &'a dyn ProcessControl,
    pub services: &'a dyn ServiceControl,
    pub diagnostics: &'a dyn LockDiagnostics,
    pub extract_io: &'a dyn ExtractIo,
    pub operator: &'a dyn Operator,
}

#[derive(Debug)]
pub struct RunReport {
    /// `None` when the job was malformed and nothing ran.
    pub outcome: Option<JobOutcome>,
    pub states: Vec<JobState>,
    pub log: UpdateLog,
}

pub struct Orchestrator<'a> {
    env: Collaborators<'a>,
    policy: LockRetryPolicy,
}

impl<'a> Orchestrator<'a> {
    pub fn new(env: Collaborators<'a>, policy: LockRetryPolicy) -> Self {
        Self { env, policy }
    }

    /// Drives quiesce, extraction and relaunch for one job.
    ///
    /// Any error becomes `Failed` after being logged and shown to the operator;
    /// the relauncher never runs after a cancellation or failure.
    pub fn run(
        &self,
        job: Option<UpdateJob>,
        sink: &dyn ProgressSink,
        log: UpdateLog,
        cancel: &CancelToken,
    ) -> RunReport {
        let mut reporter = Reporter::new(sink, log);
        let mut states = vec![JobState::Idle];

        let Some(job) = job else {
            debug!("no update task supplied");
            return RunReport {
                outcome: None,
                states,
                log: reporter.into_log(),
            };
        };

        let outcome = match self.drive(&job, &mut reporter, &mut states, cancel) {
            Ok(ExtractStatus::Completed) => {
                states.push(JobState::Completed);
                JobOutcome::Completed
            }
            Ok(ExtractStatus::Cancelled) => {
                states.push(JobState::Cancelled);
                JobOutcome::Cancelled
            }
            Err(err) => {
                let reason = format!("{err:#}");
                error!(error = %reason, "update failed");
                reporter.note(format!("Error: {reason}"));
                states.push(JobState::Failed);
                self.env.operator.on_failure(&reason);
                JobOutcome::Failed(reason)
            }
        };

        RunReport {
            outcome: Some(outcome),
            states,
            log: reporter.into_log(),
        }
    }

    fn drive(
        &self,
        job: &UpdateJob,
        reporter: &mut Reporter<'_>,
        states: &mut Vec<JobState>,
        cancel: &CancelToken,
    ) -> Result<ExtractStatus> {
        enter(states, JobState::Quiescing);
        quiesce(job, self.env.processes, self.env.services, reporter)?;

        let ctx = ExtractContext {
            io: self.env.extract_io,
            diagnostics: self.env.diagnostics,
            operator: self.env.operator,
            policy: &self.policy,
        };
        let status = extract(job, &ctx, reporter, cancel, |state| enter(states, state))?;
        if status == ExtractStatus::Cancelled {
            return Ok(ExtractStatus::Cancelled);
        }

        enter(states, JobState::Relaunching);
        relaunch(job, self.env.processes, self.env.services, reporter)?;
        Ok(ExtractStatus::Completed)
    }
}

fn enter(states: &mut Vec<JobState>, state: JobState) {
    debug!(state = state.as_str(), "entering state");
    states.push(state);
}
