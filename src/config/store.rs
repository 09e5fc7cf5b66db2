//! Cluster document persistence
//!
//! The document lives in one YAML file (`cluster.yml` in the working directory
//! by default). It is read before every command that needs cluster state and
//! rewritten after every mutating command.
//!
//! Rewrites go to a sibling temporary file that is renamed over the target, so
//! a crash mid-write leaves the previous document intact.

use std::path::{Path, PathBuf};

use tracing::debug;

use super::document::ConfigDocument;
use crate::{Error, Result};

/// Reads and writes the cluster document at a fixed path
#[derive(Clone, Debug)]
pub struct DocumentStore {
    path: PathBuf,
}

impl DocumentStore {
    /// Store backed by the given file
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the document file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a document has been written
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load the document, returning `None` if it does not exist
    pub fn load(&self) -> Result<Option<ConfigDocument>> {
        if !self.exists() {
            return Ok(None);
        }
        let data = std::fs::read_to_string(&self.path)?;
        let document = serde_yaml::from_str(&data)?;
        Ok(Some(document))
    }

    /// Load the document, failing with `NotConfigured` if it does not exist
    pub fn load_required(&self) -> Result<ConfigDocument> {
        self.load()?.ok_or_else(|| {
            Error::not_configured(format!(
                "{} does not exist. Did you configure?",
                self.path.display()
            ))
        })
    }

    /// Write the document, replacing any previous version
    pub fn save(&self, document: &ConfigDocument) -> Result<()> {
        let data = serde_yaml::to_string(document)?;
        let tmp = self.temp_path();
        std::fs::write(&tmp, data)?;
        if let Err(e) = std::fs::rename(&tmp, &self.path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e.into());
        }
        debug!(path = %self.path.display(), "Saved cluster document");
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
