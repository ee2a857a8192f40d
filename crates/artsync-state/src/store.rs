//! State store: remote inventory cache + history log.
//!
//! ## Design Decisions
//!
//! - **Atomic writes**: write-to-temp + rename in the same directory, so a
//!   crash mid-save never leaves a truncated document.
//! - **Forgiving loads**: a missing document means a fresh start; a corrupt
//!   document means a fresh start plus a [`LoadWarning`]. Loading happens
//!   before the logger is configured, so warnings are returned to the
//!   caller instead of being logged here.
//! - **In-memory mutation**: all update methods touch memory only;
//!   durability requires an explicit [`StateStore::save`].

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use artsync_core::domain::{HistoryEntry, RemoteAssetRecord};
use thiserror::Error;

/// Errors from persisting state to disk.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("state I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("state serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// A non-fatal problem found while loading a state document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadWarning {
    pub path: PathBuf,
    pub message: String,
}

/// Persistent sync state for one managed project.
#[derive(Debug)]
pub struct StateStore {
    cache_file: PathBuf,
    history_file: PathBuf,
    remote_state: BTreeMap<String, RemoteAssetRecord>,
    history: Vec<HistoryEntry>,
}

impl StateStore {
    /// Load both documents. Missing files yield empty state; unreadable or
    /// corrupt files yield empty state plus a warning for the caller to log
    /// once logging is up.
    pub fn load(cache_file: PathBuf, history_file: PathBuf) -> (Self, Vec<LoadWarning>) {
        let mut warnings = Vec::new();

        let remote_state = load_document(&cache_file, &mut warnings).unwrap_or_default();
        let history = load_document(&history_file, &mut warnings).unwrap_or_default();

        (
            Self {
                cache_file,
                history_file,
                remote_state,
                history,
            },
            warnings,
        )
    }

    /// Whether the inventory cache document exists on disk. A missing cache
    /// forces the next sync to rebuild the inventory from the remote side.
    pub fn cache_present(&self) -> bool {
        self.cache_file.exists()
    }

    /// Persist both documents atomically.
    pub fn save(&self) -> Result<(), StateError> {
        write_document(&self.cache_file, &self.remote_state)?;
        write_document(&self.history_file, &self.history)?;
        Ok(())
    }

    // --- remote inventory ---

    pub fn remote_state(&self) -> &BTreeMap<String, RemoteAssetRecord> {
        &self.remote_state
    }

    /// Replace the whole inventory, e.g. after a full remote resync.
    pub fn set_remote_inventory(&mut self, inventory: BTreeMap<String, RemoteAssetRecord>) {
        self.remote_state = inventory;
    }

    pub fn update_remote_asset(
        &mut self,
        filename: impl Into<String>,
        remote_id: impl Into<String>,
        content_hash: impl Into<String>,
    ) {
        self.remote_state.insert(
            filename.into(),
            RemoteAssetRecord {
                id: remote_id.into(),
                hash: content_hash.into(),
            },
        );
    }

    pub fn remove_remote_asset(&mut self, filename: &str) {
        self.remote_state.remove(filename);
    }

    // --- history ---

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    /// Insert a new entry at the head and truncate to `keep` entries.
    pub fn add_history_entry(
        &mut self,
        message: impl Into<String>,
        author_id: Option<String>,
        keep: usize,
    ) {
        self.history.insert(0, HistoryEntry::new(message, author_id));
        self.history.truncate(keep);
    }

    /// The newest `max_count` entries.
    pub fn history_slice(&self, max_count: usize) -> &[HistoryEntry] {
        &self.history[..self.history.len().min(max_count)]
    }

    // --- clearing (used by the `clear` tool) ---

    /// Drop the inventory cache from memory and disk, forcing a full
    /// resync next run.
    pub fn clear_cache(&mut self) -> Result<(), StateError> {
        self.remote_state.clear();
        remove_if_present(&self.cache_file)
    }

    /// Drop the history log from memory and disk.
    pub fn clear_history(&mut self) -> Result<(), StateError> {
        self.history.clear();
        remove_if_present(&self.history_file)
    }
}

fn load_document<T: serde::de::DeserializeOwned>(
    path: &Path,
    warnings: &mut Vec<LoadWarning>,
) -> Option<T> {
    if !path.exists() {
        return None;
    }
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) => {
            warnings.push(LoadWarning {
                path: path.to_path_buf(),
                message: format!("unreadable, starting empty: {e}"),
            });
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warnings.push(LoadWarning {
                path: path.to_path_buf(),
                message: format!("corrupt, starting empty: {e}"),
            });
            None
        }
    }
}

/// Serialize `value` to `path` via a temp file in the same directory so the
/// rename is atomic (same filesystem).
fn write_document<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), StateError> {
    let json = serde_json::to_string_pretty(value)?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|source| StateError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
    }

    let tmp_path = {
        let mut p = path.as_os_str().to_owned();
        p.push(".tmp");
        PathBuf::from(p)
    };

    let io_err = |source| StateError::Io {
        path: tmp_path.clone(),
        source,
    };
    let mut file = std::fs::File::create(&tmp_path).map_err(io_err)?;
    file.write_all(json.as_bytes()).map_err(io_err)?;
    // Reach the disk before the rename makes the document visible.
    file.sync_all().map_err(io_err)?;
    drop(file);
    std::fs::rename(&tmp_path, path).map_err(|source| StateError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

fn remove_if_present(path: &Path) -> Result<(), StateError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(StateError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}
