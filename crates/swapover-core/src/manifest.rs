use serde::{Deserialize, Serialize};

/// Update mode selected by the `mode` attribute of the manifest's `mandatory` element.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum UpdateMode {
    Normal,
    Optional,
    ForcedDownload,
}

impl UpdateMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Optional => "optional",
            Self::ForcedDownload => "forced-download",
        }
    }

    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "0" | "normal" => Some(Self::Normal),
            "1" | "optional" => Some(Self::Optional),
            "2" | "forced-download" | "forceddownload" => Some(Self::ForcedDownload),
            _ => None,
        }
    }
}

/// Data contract produced by the update-check collaborator. Values reach
/// the applier only through invocation parameters; nothing here parses XML.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpdateManifest {
    pub version: String,
    pub url: String,
    #[serde(default)]
    pub mandatory: bool,
    pub mode: Option<UpdateMode>,
    pub service: Option<String>,
}

impl UpdateManifest {
    /// Dotted numeric version components; `None` when any component is not numeric.
    pub fn version_components(&self) -> Option<Vec<u64>> {
        let trimmed = self.version.trim();
        if trimmed.is_empty() {
            return None;
        }
        trimmed
            .split('.')
            .map(|part| part.parse::<u64>().ok())
            .collect()
    }

    pub fn is_newer_than(&self, installed: &str) -> bool {
        let Some(offered) = self.version_components() else {
            return false;
        };
        let Some(mut current) = installed
            .trim()
            .split('.')
            .map(|part| part.parse::<u64>().ok())
            .collect::<Option<Vec<_>>>()
        else {
            return true;
        };

        let mut offered = offered;
        let width = offered.len().max(current.len());
        offered.resize(width, 0);
        current.resize(width, 0);
        offered > current
    }

    pub fn is_forced(&self) -> bool {
        self.mandatory && self.mode == Some(UpdateMode::ForcedDownload)
    }

    pub fn service_name(&self) -> Option<&str> {
        self.service
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }
}
