use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressEvent {
    pub percent: u8,
    pub message: String,
}

impl ProgressEvent {
    pub fn new(percent: u8, message: impl Into<String>) -> Self {
        Self {
            percent: percent.min(100),
            message: message.into(),
        }
    }
}

/// `floor(done * 100 / total)`; an empty workload counts as complete.
pub fn percent_complete(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    let bounded = done.min(total) as u128;
    ((bounded * 100) / total as u128) as u8
}

const LOG_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Append-only run log, persisted once when the helper exits.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateLog {
    lines: Vec<String>,
}

impl UpdateLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, message: impl AsRef<str>) {
        self.record_at(Local::now(), message);
    }

    pub fn record_at(&mut self, at: DateTime<Local>, message: impl AsRef<str>) {
        self.lines.push(format!(
            "{} {}",
            at.format(LOG_TIMESTAMP_FORMAT),
            message.as_ref()
        ));
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn render(&self) -> String {
        let mut rendered = String::new();
        for line in &self.lines {
            rendered.push_str(line);
            rendered.push('\n');
        }
        rendered
    }

    pub fn append_to_file(self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create log directory: {}", parent.display()))?;
        }

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open log file: {}", path.display()))?;
        file.write_all(self.render().as_bytes())
            .with_context(|| format!("failed to write log file: {}", path.display()))?;
        file.flush()
            .with_context(|| format!("failed to flush log file: {}", path.display()))?;
        Ok(())
    }
}
