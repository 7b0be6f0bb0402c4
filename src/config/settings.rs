use crate::boundary::version::VersionNumber;
use crate::config::types::{Result, TaskError};
/// Driver settings loading from isotask.json
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_SETTINGS_FILE: &str = "isotask.json";
pub const DEFAULT_HOST_VERSION: &str = "2.1";

/// Full isotask.json structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DriverSettings {
    /// Version of the running host, used to gate implementations
    #[serde(default = "default_host_version")]
    pub host_version: String,
    /// Name prefixes hidden from the caller environment by the catalog policy
    #[serde(default = "default_masked_prefixes")]
    pub masked_prefixes: Vec<String>,
    /// Parent directory for per-scope staging areas (none = no staging)
    #[serde(default)]
    pub staging_root: Option<PathBuf>,
    /// JSON-lines audit trail destination
    #[serde(default)]
    pub audit_log: Option<PathBuf>,
}

fn default_host_version() -> String {
    DEFAULT_HOST_VERSION.to_string()
}

fn default_masked_prefixes() -> Vec<String> {
    vec!["isotask.tasks.".to_string()]
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self {
            host_version: default_host_version(),
            masked_prefixes: default_masked_prefixes(),
            staging_root: None,
            audit_log: None,
        }
    }
}

impl DriverSettings {
    /// Load settings from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            TaskError::Config(format!(
                "Failed to read settings file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        let settings: DriverSettings = serde_json::from_str(&content)
            .map_err(|e| TaskError::Config(format!("Failed to parse settings JSON: {}", e)))?;

        settings.validate()?;
        Ok(settings)
    }

    /// Load ./isotask.json if present, defaults otherwise
    pub fn load_default() -> Result<Self> {
        let path = std::env::current_dir()
            .map_err(|e| TaskError::Config(format!("Failed to get current directory: {}", e)))?
            .join(DEFAULT_SETTINGS_FILE);

        if !path.exists() {
            log::debug!("{} not found, using default settings", path.display());
            return Ok(Self::default());
        }

        Self::load_from_file(path)
    }

    pub fn host_version(&self) -> Result<VersionNumber> {
        self.host_version.parse()
    }

    fn validate(&self) -> Result<()> {
        self.host_version()?;
        if self.masked_prefixes.iter().any(|p| p.trim().is_empty()) {
            return Err(TaskError::Config(
                "masked_prefixes must not contain empty entries".to_string(),
            ));
        }
        Ok(())
    }
}
