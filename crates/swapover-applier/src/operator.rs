use std::path::Path;

use swapover_core::LockChoice;

use crate::diagnostics::LockHolder;

/// The person (or policy) answering questions the engine cannot decide alone.
pub trait Operator {
    /// Called once per process found holding `path` open.
    fn on_locked_file(&self, path: &Path, holder: &LockHolder) -> LockChoice;

    /// Shows a fatal failure; returns once it has been acknowledged.
    fn on_failure(&self, message: &str);
}

/// Answers every lock prompt with the same choice and acknowledges failures silently.
pub struct FixedChoiceOperator {
    choice: LockChoice,
}

impl FixedChoiceOperator {
    pub fn new(choice: LockChoice) -> Self {
        Self { choice }
    }
}

impl Operator for FixedChoiceOperator {
    fn on_locked_file(&self, _path: &Path, _holder: &LockHolder) -> LockChoice {
        self.choice
    }

    fn on_failure(&self, _message: &str) {}
}
