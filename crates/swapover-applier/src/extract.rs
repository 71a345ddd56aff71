use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate, TimeZone};
use filetime::FileTime;
use swapover_core::{
    percent_complete, CancelToken, JobState, LockChoice, LockRetryPolicy, UpdateJob,
};
use tracing::{debug, info, warn};
use zip::result::ZipError;
use zip::ZipArchive;

use crate::diagnostics::LockDiagnostics;
use crate::error::{is_lock_violation, ApplyError};
use crate::fs_utils::{normalize_absolute, remove_path};
use crate::operator::Operator;
use crate::report::Reporter;

/// File-system side effects of extraction that callers may substitute.
pub trait ExtractIo {
    /// Opens `path` for writing without truncating it and without sharing it
    /// with other writers. A held file reports an error that
    /// [`is_lock_violation`] recognises.
    fn open_for_write(&self, path: &Path) -> io::Result<File>;
    fn backoff(&self, duration: Duration);
}

pub struct SystemExtractIo;

impl ExtractIo for SystemExtractIo {
    fn open_for_write(&self, path: &Path) -> io::Result<File> {
        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(false);
        #[cfg(windows)]
        {
            use std::os::windows::fs::OpenOptionsExt;
            options.share_mode(0);
        }
        let file = options.open(path)?;
        #[cfg(unix)]
        fs2::FileExt::try_lock_exclusive(&file)?;
        Ok(file)
    }

    fn backoff(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

pub struct ExtractContext<'a> {
    pub io: &'a dyn ExtractIo,
    pub diagnostics: &'a dyn LockDiagnostics,
    pub operator: &'a dyn Operator,
    pub policy: &'a LockRetryPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractStatus {
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedEntry {
    pub index: usize,
    pub name: String,
    pub target: PathBuf,
    pub is_dir: bool,
    pub modified: Option<FileTime>,
    pub unix_mode: Option<u32>,
}

/// An opened archive whose entries have all been resolved inside the destination root.
///
/// The archive handle lives exactly as long as the plan; [`ExtractionPlan::run`]
/// consumes it, so every exit path closes the archive once.
pub struct ExtractionPlan {
    archive: ZipArchive<File>,
    root: PathBuf,
    entries: Vec<PlannedEntry>,
}

/// Plans, optionally clears the destination, then extracts. `enter_state` is
/// told when the clear and extract steps begin.
pub fn extract(
    job: &UpdateJob,
    ctx: &ExtractContext<'_>,
    reporter: &mut Reporter<'_>,
    cancel: &CancelToken,
    mut enter_state: impl FnMut(JobState),
) -> Result<ExtractStatus> {
    let plan = plan_extraction(job)?;
    reporter.note(format!(
        "Opened {} ({} entries)",
        job.archive_path().display(),
        plan.len()
    ));
    if job.clear_destination() {
        enter_state(JobState::ClearingDirectory);
        clear_destination(plan.root(), reporter)?;
    }

    enter_state(JobState::Extracting);
    plan.run(ctx, reporter, cancel)
}

pub fn plan_extraction(job: &UpdateJob) -> Result<ExtractionPlan> {
    let root = normalize_absolute(job.destination_root()).with_context(|| {
        format!(
            "failed to resolve destination root: {}",
            job.destination_root().display()
        )
    })?;

    let archive_path = job.archive_path();
    let file = File::open(archive_path)
        .with_context(|| format!("failed to open update archive: {}", archive_path.display()))?;
    let mut archive = ZipArchive::new(file)
        .with_context(|| format!("failed to read update archive: {}", archive_path.display()))?;

    let mut entries = Vec::with_capacity(archive.len());
    for index in 0..archive.len() {
        let entry = archive.by_index_raw(index).with_context(|| {
            format!(
                "failed to read entry #{index} of update archive: {}",
                archive_path.display()
            )
        })?;
        let name = entry.name().to_string();
        let is_dir = entry.is_dir();
        let modified = entry.last_modified().and_then(entry_modified_time);
        let unix_mode = entry.unix_mode();
        let target = resolve_entry_path(&root, &name, is_dir)?;

        entries.push(PlannedEntry {
            index,
            name,
            target,
            is_dir,
            modified,
            unix_mode,
        });
    }

    debug!(entries = entries.len(), root = %root.display(), "planned extraction");
    Ok(ExtractionPlan {
        archive,
        root,
        entries,
    })
}

impl ExtractionPlan {
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn entries(&self) -> &[PlannedEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Materializes entries in archive order. Cancellation is observed only
    /// between entries; an entry in flight always completes or fails.
    pub fn run(
        self,
        ctx: &ExtractContext<'_>,
        reporter: &mut Reporter<'_>,
        cancel: &CancelToken,
    ) -> Result<ExtractStatus> {
        let Self {
            mut archive,
            entries,
            ..
        } = self;
        let total = entries.len();

        for (position, entry) in entries.iter().enumerate() {
            if cancel.is_cancelled() {
                info!(done = position, total, "extraction cancelled");
                reporter.note(format!(
                    "Extraction cancelled after {position} of {total} entries"
                ));
                return Ok(ExtractStatus::Cancelled);
            }

            reporter.progress(
                percent_complete(position, total),
                format!("Extracting {}", entry.name),
            );
            if entry.is_dir {
                fs::create_dir_all(&entry.target).with_context(|| {
                    format!("failed to create directory: {}", entry.target.display())
                })?;
            } else {
                materialize_with_retry(&mut archive, entry, ctx, reporter)?;
            }
            reporter.progress(
                percent_complete(position + 1, total),
                format!("Extracted {}", entry.name),
            );
        }

        Ok(ExtractStatus::Completed)
    }
}

/// Deletes every file, then every directory tree, directly under `root`.
pub fn clear_destination(root: &Path, reporter: &mut Reporter<'_>) -> Result<()> {
    let listing = match fs::read_dir(root) {
        Ok(listing) => listing,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to list destination: {}", root.display()));
        }
    };

    let mut files = Vec::new();
    let mut directories = Vec::new();
    for entry in listing {
        let entry =
            entry.with_context(|| format!("failed to list destination: {}", root.display()))?;
        let file_type = entry
            .file_type()
            .with_context(|| format!("failed to inspect {}", entry.path().display()))?;
        if file_type.is_dir() {
            directories.push((entry.path(), file_type));
        } else {
            files.push((entry.path(), file_type));
        }
    }
    files.sort_by(|left, right| left.0.cmp(&right.0));
    directories.sort_by(|left, right| left.0.cmp(&right.0));

    for (path, file_type) in files {
        remove_path(&path, file_type)
            .with_context(|| format!("failed to remove file: {}", path.display()))?;
        reporter.progress(0, format!("Removed file {}", path.display()));
    }
    for (path, file_type) in directories {
        remove_path(&path, file_type)
            .with_context(|| format!("failed to remove directory: {}", path.display()))?;
        reporter.progress(0, format!("Removed directory {}", path.display()));
    }

    Ok(())
}

/// Resolves an archive entry name beneath `root`, rejecting anything that would
/// land outside it. Both separators are accepted in entry names.
pub fn resolve_entry_path(root: &Path, name: &str, is_dir: bool) -> Result<PathBuf, ApplyError> {
    let rejected = || ApplyError::TraversalRejected {
        entry: name.to_string(),
    };

    if name.starts_with('/') || name.starts_with('\\') {
        return Err(rejected());
    }

    let mut segments: Vec<&str> = Vec::new();
    for segment in name.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    return Err(rejected());
                }
            }
            // Drive letters, UNC and verbatim prefixes.
            other if cfg!(windows) && other.contains(':') => return Err(rejected()),
            other => segments.push(other),
        }
    }

    if segments.is_empty() && !is_dir {
        return Err(rejected());
    }

    let mut target = root.to_path_buf();
    for segment in &segments {
        target.push(segment);
    }

    // Component-wise containment: `/opt/app2` is not inside `/opt/app`.
    if !target.starts_with(root) || (!is_dir && target == root) {
        return Err(rejected());
    }
    Ok(target)
}

pub(crate) fn entry_modified_time(stamp: zip::DateTime) -> Option<FileTime> {
    let date = NaiveDate::from_ymd_opt(
        i32::from(stamp.year()),
        u32::from(stamp.month()),
        u32::from(stamp.day()),
    )?;
    let naive = date.and_hms_opt(
        u32::from(stamp.hour()),
        u32::from(stamp.minute()),
        u32::from(stamp.second()),
    )?;
    let local = Local.from_local_datetime(&naive).earliest()?;
    Some(FileTime::from_unix_time(local.timestamp(), 0))
}

fn materialize_with_retry(
    archive: &mut ZipArchive<File>,
    entry: &PlannedEntry,
    ctx: &ExtractContext<'_>,
    reporter: &mut Reporter<'_>,
) -> Result<()> {
    let parent = entry
        .target
        .parent()
        .ok_or_else(|| ApplyError::ParentDirectoryMissing {
            path: entry.target.clone(),
        })?;
    fs::create_dir_all(parent)
        .with_context(|| format!("failed to create directory: {}", parent.display()))?;

    let policy = ctx.policy;
    let mut retries = 0_u32;
    loop {
        let err = match write_entry(archive, entry, ctx.io) {
            Ok(copied) => {
                debug!(entry = %entry.name, bytes = copied, "entry written");
                return Ok(());
            }
            Err(err) if !is_lock_violation(&err) => {
                return Err(err).with_context(|| {
                    format!(
                        "failed to extract '{}' to {}",
                        entry.name,
                        entry.target.display()
                    )
                });
            }
            Err(err) => err,
        };

        retries += 1;
        if retries > policy.max_retries {
            return Err(anyhow::Error::new(err).context(ApplyError::LockRetriesExhausted {
                path: entry.target.clone(),
                attempts: retries,
            }));
        }

        warn!(path = %entry.target.display(), retry = retries, "destination file is locked");
        reporter.note(format!(
            "File {} is locked, retry {retries} of {}",
            entry.target.display(),
            policy.max_retries
        ));

        if retries == 2 && ctx.diagnostics.is_supported() {
            let holders = ctx.diagnostics.who_is_locking(&entry.target);
            if !holders.is_empty() {
                for holder in &holders {
                    reporter.note(format!(
                        "File {} is locked by {holder}",
                        entry.target.display()
                    ));
                    match ctx.operator.on_locked_file(&entry.target, holder) {
                        LockChoice::Retry => {}
                        LockChoice::Abort => {
                            return Err(anyhow::Error::new(err).context(
                                ApplyError::AbortedByOperator {
                                    path: entry.target.clone(),
                                    holder: holder.to_string(),
                                },
                            ));
                        }
                    }
                }
                if policy.prompt_resets_retries {
                    retries = 1;
                }
                continue;
            }
        }

        ctx.io.backoff(policy.backoff());
    }
}

fn write_entry(
    archive: &mut ZipArchive<File>,
    entry: &PlannedEntry,
    io: &dyn ExtractIo,
) -> io::Result<u64> {
    let mut source = archive.by_index(entry.index).map_err(zip_error_to_io)?;
    let mut destination = io.open_for_write(&entry.target)?;
    let copied = io::copy(&mut source, &mut destination)?;
    destination.set_len(copied)?;
    if let Some(modified) = entry.modified {
        filetime::set_file_handle_times(&destination, None, Some(modified))?;
    }
    drop(destination);

    apply_unix_mode(&entry.target, entry.unix_mode)?;
    Ok(copied)
}

#[cfg(unix)]
fn apply_unix_mode(path: &Path, mode: Option<u32>) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let Some(mode) = mode.map(|mode| mode & 0o777).filter(|mode| *mode != 0) else {
        return Ok(());
    };
    // Owner write stays set so the next update can replace the file.
    fs::set_permissions(path, fs::Permissions::from_mode(mode | 0o200))
}

#[cfg(not(unix))]
fn apply_unix_mode(_path: &Path, _mode: Option<u32>) -> io::Result<()> {
    Ok(())
}

fn zip_error_to_io(err: ZipError) -> io::Error {
    match err {
        ZipError::Io(err) => err,
        other => io::Error::new(io::ErrorKind::InvalidData, other),
    }
}
