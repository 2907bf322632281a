//! Watchlist persistence.
//!
//! One canonical JSON record on disk, fully replaced by each save. Writes go
//! through a temp file in the target directory followed by an atomic rename,
//! so readers never observe a partial record. Writers serialize through an
//! internal mutex; overwrite semantics assume a single store instance owns
//! the path.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;
use tracing::{debug, info};

use crate::screener::Watchlist;

// ============================================================================
// Store Error
// ============================================================================

/// Persistence failures. Fatal to the run, unlike per-ticker errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("watchlist I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("watchlist serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

// ============================================================================
// Watchlist Store
// ============================================================================

/// File-backed store for the canonical watchlist record.
pub struct WatchlistStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl WatchlistStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Canonical record location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist the watchlist, replacing any prior record.
    ///
    /// The record is written to a sibling temp file and renamed into place;
    /// rename is atomic on the same filesystem.
    pub fn save(&self, watchlist: &Watchlist) -> Result<PathBuf, StoreError> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(watchlist)?;
        let tmp = self.temp_path();

        fs::write(&tmp, &json)?;
        if let Err(e) = fs::rename(&tmp, &self.path) {
            // Leave no orphan behind on a failed rename.
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }

        info!(
            path = %self.path.display(),
            stocks = watchlist.stocks.len(),
            "Saved watchlist"
        );
        Ok(self.path.clone())
    }

    /// Load the last-saved watchlist, or `None` if no record exists yet.
    pub fn load(&self) -> Result<Option<Watchlist>, StoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No watchlist record yet");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Some(serde_json::from_str(&raw)?))
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "watchlist.json".to_string());
        self.path.with_file_name(format!(".{name}.tmp"))
    }
}

// ============================================================================
// Tests
// ============================================================================
