mod cancel;
mod job;
mod manifest;
mod outcome;
mod progress;
mod settings;

pub use cancel::CancelToken;
pub use job::{UpdateJob, UpdateRequest};
pub use manifest::{UpdateManifest, UpdateMode};
pub use outcome::{JobOutcome, JobState};
pub use progress::{percent_complete, ProgressEvent, UpdateLog};
pub use settings::{
    default_log_path, ApplierSettings, LockChoice, LockRetryPolicy, DEFAULT_LOCK_BACKOFF_MS,
    DEFAULT_MAX_LOCK_RETRIES,
};
