use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_LOCK_RETRIES: u32 = 2;
pub const DEFAULT_LOCK_BACKOFF_MS: u64 = 5_000;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LockChoice {
    Retry,
    Abort,
}

impl LockChoice {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Retry => "retry",
            Self::Abort => "abort",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct LockRetryPolicy {
    pub max_retries: u32,
    pub backoff_ms: u64,
    /// A retry chosen at the lock-holder prompt resets the attempt counter,
    /// letting the operator retry for as long as they like.
    pub prompt_resets_retries: bool,
    pub non_interactive_choice: LockChoice,
}

impl Default for LockRetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_LOCK_RETRIES,
            backoff_ms: DEFAULT_LOCK_BACKOFF_MS,
            prompt_resets_retries: false,
            non_interactive_choice: LockChoice::Abort,
        }
    }
}

impl LockRetryPolicy {
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ApplierSettings {
    pub log_file: Option<PathBuf>,
    pub lock_retry: LockRetryPolicy,
}

impl ApplierSettings {
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let settings: Self = toml::from_str(input).context("failed to parse swapover settings")?;
        if settings
            .log_file
            .as_ref()
            .is_some_and(|path| path.as_os_str().is_empty())
        {
            return Err(anyhow!("log_file must not be empty when set"));
        }
        Ok(settings)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file: {}", path.display()))?;
        Self::from_toml_str(&raw)
            .with_context(|| format!("failed to load settings file: {}", path.display()))
    }

    pub fn load_optional(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Log file location with the precedence explicit > settings > default.
    pub fn resolve_log_file(&self, explicit: Option<&Path>) -> PathBuf {
        explicit
            .map(Path::to_path_buf)
            .or_else(|| self.log_file.clone())
            .unwrap_or_else(default_log_path)
    }
}

pub fn default_log_path() -> PathBuf {
    std::env::temp_dir().join("swapover").join("swapover.log")
}
