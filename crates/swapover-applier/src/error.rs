use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[cfg(windows)]
const ERROR_SHARING_VIOLATION: i32 = 32;
#[cfg(windows)]
const ERROR_LOCK_VIOLATION: i32 = 33;
#[cfg(unix)]
const ETXTBSY: i32 = 26;
const ERROR_CANCELLED: i32 = 1223;

/// Failures the orchestrator and callers recognise by kind. They travel inside
/// `anyhow::Error` and are recovered with `downcast_ref`.
#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("archive entry '{entry}' resolves outside the destination root")]
    TraversalRejected { entry: String },
    #[error("'{}' is still locked after {attempts} attempts", .path.display())]
    LockRetriesExhausted { path: PathBuf, attempts: u32 },
    #[error("update aborted while '{}' was locked by {holder}", .path.display())]
    AbortedByOperator { path: PathBuf, holder: String },
    #[error("failed to {action} service '{service}'")]
    ServiceControlFailed {
        service: String,
        action: &'static str,
    },
    #[error("extraction target has no parent directory: {}", .path.display())]
    ParentDirectoryMissing { path: PathBuf },
}

/// Sharing or lock violation: another writer holds the destination. On Unix
/// that is a busy executable or a held exclusive file lock.
pub fn is_lock_violation(err: &io::Error) -> bool {
    let Some(code) = err.raw_os_error() else {
        return false;
    };

    #[cfg(windows)]
    {
        code == ERROR_SHARING_VIOLATION || code == ERROR_LOCK_VIOLATION
    }
    #[cfg(unix)]
    {
        code == ETXTBSY || err.kind() == io::ErrorKind::WouldBlock
    }
    #[cfg(not(any(windows, unix)))]
    {
        let _ = code;
        false
    }
}

/// The operator dismissed an elevation or launch prompt.
pub fn is_user_cancelled(err: &io::Error) -> bool {
    err.raw_os_error() == Some(ERROR_CANCELLED)
}
