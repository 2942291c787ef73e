//! Durable page checkpoint.
//!
//! Epistemic foundation:
//! - K_i: The checkpoint is the last page whose rows are durably in the table
//! - K_i: State is persisted to disk atomically (write-then-rename)
//! - B_i: Checkpoint file may not exist, be empty, or be garbage → None

use crate::models::{FetchError, PageIndex, Result};
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Plain-text checkpoint holding a single page index.
///
/// Touches exactly one persistent location (plus a sibling temp file during commit).
/// Nothing is cached between calls.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    /// Path to the checkpoint file
    path: PathBuf,
    /// Path to the temp file used for atomic replace
    temp_path: PathBuf,
}

impl CheckpointStore {
    /// Create a store for the given file path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut temp_name = path.file_name().unwrap_or_default().to_os_string();
        temp_name.push(".tmp");
        let temp_path = path.with_file_name(temp_name);
        Self { path, temp_path }
    }

    /// Load the last committed page.
    ///
    /// Missing, empty, zero, or unparseable content is reported as `None`, never an error.
    pub fn load(&self) -> Option<PageIndex> {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Unreadable checkpoint, starting fresh");
                return None;
            }
        };

        match content.trim().parse::<PageIndex>() {
            Ok(0) => None,
            Ok(page) => Some(page),
            Err(_) => {
                warn!(path = %self.path.display(), "Corrupt checkpoint, starting fresh");
                None
            }
        }
    }

    /// Durably overwrite the stored page.
    pub fn commit(&self, page: PageIndex) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| FetchError::io("creating checkpoint dir", e))?;
        }

        {
            let mut file = File::create(&self.temp_path)
                .map_err(|e| FetchError::io("creating temp checkpoint", e))?;
            file.write_all(page.to_string().as_bytes())
                .map_err(|e| FetchError::io("writing temp checkpoint", e))?;
            file.sync_all()
                .map_err(|e| FetchError::io("syncing temp checkpoint", e))?;
        }

        // Atomic rename
        fs::rename(&self.temp_path, &self.path)
            .map_err(|e| FetchError::io("renaming checkpoint", e))?;

        debug!(page, "Checkpoint saved");
        Ok(())
    }

    /// Remove the checkpoint. Succeeds if it is already gone.
    pub fn clear(&self) -> Result<()> {
        for path in [&self.path, &self.temp_path] {
            match fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(FetchError::io("removing checkpoint", e)),
            }
        }
        debug!("Checkpoint cleared");
        Ok(())
    }

    /// Check if a checkpoint file exists (regardless of whether it parses).
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Get checkpoint path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}
