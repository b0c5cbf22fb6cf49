//! Staging directory for downloaded images.
//!
//! Layout: `<root>/image_<listing>_<position>.jpg`. Files for a listing are
//! removed once its report is persisted; the whole directory is removed at
//! the end of the run. Cleanup failures are logged and never fatal.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::types::ListingId;

#[derive(Debug, Clone)]
pub struct StagingArea {
    root: PathBuf,
}

impl StagingArea {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the staging directory if it does not exist.
    pub async fn ensure(&self) -> std::io::Result<()> {
        if tokio::fs::try_exists(&self.root).await.unwrap_or(false) {
            return Ok(());
        }
        tokio::fs::create_dir_all(&self.root).await?;
        info!(path = %self.root.display(), "Staging directory created");
        Ok(())
    }

    /// Deterministic staging path for one image of one listing.
    pub fn image_path(&self, listing_id: ListingId, position: usize) -> PathBuf {
        self.root
            .join(format!("{}{}.jpg", Self::listing_prefix(listing_id), position))
    }

    /// Remove every staged file belonging to `listing_id`.
    ///
    /// Returns how many files were removed.
    pub async fn clear_listing(&self, listing_id: ListingId) -> usize {
        let prefix = Self::listing_prefix(listing_id);

        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return 0,
            Err(e) => {
                error!(path = %self.root.display(), error = %e, "Failed to list staging directory");
                return 0;
            }
        };

        let mut removed = 0;
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    error!(path = %self.root.display(), error = %e, "Failed to read staging entry");
                    break;
                }
            };

            let name = entry.file_name();
            if !name.to_string_lossy().starts_with(&prefix) {
                continue;
            }

            let path = entry.path();
            match tokio::fs::remove_file(&path).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    error!(path = %path.display(), error = %e, "Failed to remove staged image");
                }
            }
        }

        removed
    }

    /// Remove the whole staging directory. Returns whether it is gone.
    pub async fn remove_all(&self) -> bool {
        match tokio::fs::remove_dir_all(&self.root).await {
            Ok(()) => {
                info!(path = %self.root.display(), "Staging directory removed");
                true
            }
            Err(e) if e.kind() == ErrorKind::NotFound => true,
            Err(e) => {
                warn!(path = %self.root.display(), error = %e, "Failed to remove staging directory");
                false
            }
        }
    }

    // Trailing underscore keeps listing 1 from matching listing 10's files.
    fn listing_prefix(listing_id: ListingId) -> String {
        format!("image_{}_", listing_id)
    }
}
