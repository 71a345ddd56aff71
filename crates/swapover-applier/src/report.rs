use std::sync::mpsc::Sender;

use swapover_core::{ProgressEvent, UpdateLog};

/// Consumer side of the progress stream. Implementations must return quickly;
/// the worker is blocked while `emit` runs.
pub trait ProgressSink {
    fn emit(&self, event: ProgressEvent);
}

impl ProgressSink for Sender<ProgressEvent> {
    fn emit(&self, event: ProgressEvent) {
        let _ = self.send(event);
    }
}

pub struct NullSink;

impl ProgressSink for NullSink {
    fn emit(&self, _event: ProgressEvent) {}
}

/// Single writer for both the progress stream and the run log.
pub struct Reporter<'a> {
    sink: &'a dyn ProgressSink,
    log: UpdateLog,
    last_percent: u8,
}

impl<'a> Reporter<'a> {
    pub fn new(sink: &'a dyn ProgressSink, log: UpdateLog) -> Self {
        Self {
            sink,
            log,
            last_percent: 0,
        }
    }

    /// Emits a progress event and mirrors it into the log. Percent never moves backwards.
    pub fn progress(&mut self, percent: u8, message: impl Into<String>) {
        let message = message.into();
        let percent = percent.max(self.last_percent).min(100);
        self.last_percent = percent;
        self.log.record(format!("{message} ({percent}%)"));
        self.sink.emit(ProgressEvent::new(percent, message));
    }

    /// Log-only entry.
    pub fn note(&mut self, message: impl AsRef<str>) {
        self.log.record(message);
    }

    pub fn last_percent(&self) -> u8 {
        self.last_percent
    }

    pub fn into_log(self) -> UpdateLog {
        self.log
    }
}
