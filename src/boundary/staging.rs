/// Per-scope staging directory
/// Created while a boundary is assembled, removed when the owning scope is released.
use crate::boundary::scope::PinnedResource;
use crate::config::types::{Result, TaskError};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub struct StagingDir {
    path: PathBuf,
}

impl StagingDir {
    /// Create a fresh, uniquely named directory under `base`
    pub fn create(base: &Path, label: &str) -> Result<Self> {
        let safe_label: String = label
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        let path = base.join(format!("{}-{}", safe_label, Uuid::new_v4()));

        fs::create_dir_all(&path).map_err(|e| {
            TaskError::Resolution(format!(
                "Failed to create staging directory {}: {}",
                path.display(),
                e
            ))
        })?;

        log::debug!("Created staging directory {}", path.display());
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PinnedResource for StagingDir {
    fn describe(&self) -> String {
        format!("staging dir {}", self.path.display())
    }

    fn close(&mut self) -> std::io::Result<()> {
        if self.path.exists() {
            fs::remove_dir_all(&self.path)?;
        } else {
            log::debug!("Staging directory already removed: {}", self.path.display());
        }
        Ok(())
    }
}
