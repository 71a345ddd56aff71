use std::path::{Path, PathBuf};

/// Raw invocation parameters as handed over by the parent application.
///
/// Every field is optional here; [`UpdateJob::from_request`] decides whether the
/// request describes any work at all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateRequest {
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub current_exe: Option<PathBuf>,
    pub updated_exe: Option<PathBuf>,
    pub clear: bool,
    pub service_name: Option<String>,
    pub args: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateJob {
    archive_path: PathBuf,
    destination_root: PathBuf,
    current_exe: PathBuf,
    updated_exe: Option<PathBuf>,
    arguments: Option<String>,
    service_name: Option<String>,
    clear_destination: bool,
}

impl UpdateJob {
    /// Returns `None` when any required path is missing or blank; the helper
    /// was started without a task and must do nothing.
    pub fn from_request(request: &UpdateRequest) -> Option<Self> {
        let archive_path = non_empty_path(request.input.as_deref())?;
        let destination_root = non_empty_path(request.output.as_deref())?;
        let current_exe = non_empty_path(request.current_exe.as_deref())?;

        Some(Self {
            archive_path,
            destination_root,
            current_exe,
            updated_exe: non_empty_path(request.updated_exe.as_deref()),
            arguments: request
                .args
                .as_deref()
                .filter(|value| !value.trim().is_empty())
                .map(str::to_string),
            service_name: request
                .service_name
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string),
            clear_destination: request.clear,
        })
    }

    pub fn archive_path(&self) -> &Path {
        &self.archive_path
    }

    pub fn destination_root(&self) -> &Path {
        &self.destination_root
    }

    pub fn current_exe(&self) -> &Path {
        &self.current_exe
    }

    pub fn updated_exe(&self) -> Option<&Path> {
        self.updated_exe.as_deref()
    }

    pub fn arguments(&self) -> Option<&str> {
        self.arguments.as_deref()
    }

    pub fn service_name(&self) -> Option<&str> {
        self.service_name.as_deref()
    }

    pub fn clear_destination(&self) -> bool {
        self.clear_destination
    }

    /// Executable started after extraction: the updated executable resolved
    /// against the destination root when given, the current one otherwise.
    pub fn launch_target(&self) -> PathBuf {
        match &self.updated_exe {
            Some(updated) => self.destination_root.join(updated),
            None => self.current_exe.clone(),
        }
    }
}

fn non_empty_path(value: Option<&Path>) -> Option<PathBuf> {
    let value = value?;
    if value.as_os_str().to_string_lossy().trim().is_empty() {
        return None;
    }
    Some(value.to_path_buf())
}
