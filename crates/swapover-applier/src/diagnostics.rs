use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockHolder {
    pub pid: u32,
    pub name: String,
}

impl fmt::Display for LockHolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (pid {})", self.name, self.pid)
    }
}

/// Best-effort lookup of the processes holding a file open.
///
/// An empty result means "unknown", never "confirmed unlocked"; failures are
/// swallowed by implementations.
pub trait LockDiagnostics {
    fn is_supported(&self) -> bool;
    fn who_is_locking(&self, path: &Path) -> Vec<LockHolder>;
}

pub struct NoLockDiagnostics;

impl LockDiagnostics for NoLockDiagnostics {
    fn is_supported(&self) -> bool {
        false
    }

    fn who_is_locking(&self, _path: &Path) -> Vec<LockHolder> {
        Vec::new()
    }
}

/// Scans `/proc/<pid>/fd` and `/proc/<pid>/exe` for links to the file.
pub struct ProcFdLockDiagnostics {
    proc_root: PathBuf,
}

impl ProcFdLockDiagnostics {
    pub fn new() -> Self {
        Self::with_proc_root("/proc")
    }

    pub fn with_proc_root(proc_root: impl Into<PathBuf>) -> Self {
        Self {
            proc_root: proc_root.into(),
        }
    }

    fn holder_for(&self, pid_dir: &Path, pid: u32, target: &Path) -> Option<LockHolder> {
        let exe_matches = fs::read_link(pid_dir.join("exe"))
            .map(|link| links_to(&link, target))
            .unwrap_or(false);
        let fd_matches = exe_matches
            || fs::read_dir(pid_dir.join("fd"))
                .map(|entries| {
                    entries.flatten().any(|entry| {
                        fs::read_link(entry.path())
                            .map(|link| links_to(&link, target))
                            .unwrap_or(false)
                    })
                })
                .unwrap_or(false);
        if !fd_matches {
            return None;
        }

        let name = fs::read_to_string(pid_dir.join("comm"))
            .map(|raw| raw.trim().to_string())
            .ok()
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| "unknown".to_string());
        Some(LockHolder { pid, name })
    }
}

impl Default for ProcFdLockDiagnostics {
    fn default() -> Self {
        Self::new()
    }
}

impl LockDiagnostics for ProcFdLockDiagnostics {
    fn is_supported(&self) -> bool {
        self.proc_root.is_dir()
    }

    fn who_is_locking(&self, path: &Path) -> Vec<LockHolder> {
        let target = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        let entries = match fs::read_dir(&self.proc_root) {
            Ok(entries) => entries,
            Err(err) => {
                debug!(error = %err, root = %self.proc_root.display(), "process table unavailable");
                return Vec::new();
            }
        };

        let mut holders = entries
            .flatten()
            .filter_map(|entry| {
                let pid = entry.file_name().to_str()?.parse::<u32>().ok()?;
                self.holder_for(&entry.path(), pid, &target)
            })
            .collect::<Vec<_>>();
        holders.sort_by_key(|holder| holder.pid);
        holders
    }
}

fn links_to(link: &Path, target: &Path) -> bool {
    link == target
        || fs::canonicalize(link)
            .map(|resolved| resolved == target)
            .unwrap_or(false)
}

pub fn platform_lock_diagnostics() -> Box<dyn LockDiagnostics + Send + Sync> {
    if cfg!(target_os = "linux") {
        Box::new(ProcFdLockDiagnostics::new())
    } else {
        Box::new(NoLockDiagnostics)
    }
}
