//! Captions store.
//!
//! Reads a two-column CSV export of the art team's caption spreadsheet:
//! column A holds a filename or group key, column B the caption text. The
//! file is optional; when unset or missing every lookup returns an empty
//! string. Reloads keep the previous data when the file has gone missing
//! or unreadable, so a half-saved spreadsheet never blanks the page.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use tracing::{debug, info, warn};

pub struct CaptionStore {
    file: Option<PathBuf>,
    notes: RwLock<HashMap<String, String>>,
}

impl CaptionStore {
    /// Create the store and perform the initial load. A missing or broken
    /// file is logged and skipped; captions are never load-bearing.
    pub fn new(file: Option<PathBuf>) -> Self {
        let store = Self {
            file,
            notes: RwLock::new(HashMap::new()),
        };
        store.reload();
        store
    }

    /// Re-read the captions file. Returns `true` when new data replaced the
    /// old map; on any failure the old data stays in place.
    pub fn reload(&self) -> bool {
        let Some(file) = &self.file else {
            return false;
        };
        if !file.exists() {
            debug!(path = %file.display(), "captions file not present, keeping current data");
            return false;
        }

        match read_captions(file) {
            Ok(new_notes) => {
                let count = new_notes.len();
                if let Ok(mut guard) = self.notes.write() {
                    let old = guard.len();
                    *guard = new_notes;
                    info!(path = %file.display(), count, previous = old, "captions loaded");
                    true
                } else {
                    false
                }
            }
            Err(e) => {
                warn!(path = %file.display(), error = %e, "captions reload failed, keeping old data");
                false
            }
        }
    }

    /// Look up a caption. Exact key first, then the filename stem, then
    /// empty string.
    pub fn get(&self, key: &str) -> String {
        let Ok(guard) = self.notes.read() else {
            return String::new();
        };
        if let Some(note) = guard.get(key) {
            return note.clone();
        }
        let stem = Path::new(key)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(key);
        guard.get(stem).cloned().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.notes.read().map(|g| g.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn read_captions(file: &Path) -> anyhow::Result<HashMap<String, String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(file)?;

    let mut notes = HashMap::new();
    for record in reader.records() {
        let record = record?;
        let Some(key) = record.get(0).map(str::trim) else {
            continue;
        };
        if key.is_empty() {
            continue;
        }
        let note = record.get(1).map(str::trim).unwrap_or("");
        notes.insert(key.to_string(), note.to_string());
    }
    Ok(notes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(dir: &tempfile::TempDir, content: &str) -> PathBuf {
        let path = dir.path().join("notes.csv");
        let mut f = std::fs::File::create(&path).unwrap();
        write!(f, "{content}").unwrap();
        path
    }

    #[test]
    fn unconfigured_store_is_silently_empty() {
        let store = CaptionStore::new(None);
        assert!(store.is_empty());
        assert_eq!(store.get("main_bg.png"), "");
    }

    #[test]
    fn missing_file_is_silently_empty() {
        let store = CaptionStore::new(Some(PathBuf::from("/nonexistent/notes.csv")));
        assert!(store.is_empty());
    }

    #[test]
    fn lookup_falls_back_to_the_stem() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(&dir, "main_bg,main background\nfree_btn_start.png,start button\n");
        let store = CaptionStore::new(Some(path));

        assert_eq!(store.get("main_bg.png"), "main background");
        assert_eq!(store.get("main_bg"), "main background");
        assert_eq!(store.get("free_btn_start.png"), "start button");
        assert_eq!(store.get("unknown.png"), "");
    }

    #[test]
    fn reload_picks_up_changes_and_keeps_old_data_when_file_vanishes() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(&dir, "a.png,first\n");
        let store = CaptionStore::new(Some(path.clone()));
        assert_eq!(store.get("a.png"), "first");

        std::fs::write(&path, "a.png,second\n").unwrap();
        assert!(store.reload());
        assert_eq!(store.get("a.png"), "second");

        std::fs::remove_file(&path).unwrap();
        assert!(!store.reload());
        assert_eq!(store.get("a.png"), "second");
    }
}
