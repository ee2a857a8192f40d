//! Local asset scanner.
//!
//! Walks the target folder recursively, keeps files whose names match the
//! include patterns (and none of the excludes), and produces
//! [`AssetRecord`]s with content hash and pixel dimensions. Unreadable or
//! undecodable files are logged and skipped; a missing folder yields an
//! empty inventory with a warning, matching the behaviour of a freshly
//! emptied project.

use std::path::{Path, PathBuf};

use artsync_core::config::FilePatternsConfig;
use artsync_core::domain::AssetRecord;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use tracing::{error, warn};
use walkdir::WalkDir;

use crate::hash;

pub struct LocalScanner {
    root: PathBuf,
    include: GlobSet,
    exclude: GlobSet,
}

impl LocalScanner {
    pub fn new(root: PathBuf, patterns: &FilePatternsConfig) -> anyhow::Result<Self> {
        Ok(Self {
            root,
            include: build_glob_set(&patterns.include)?,
            exclude: build_glob_set(&patterns.exclude)?,
        })
    }

    /// Whether a bare filename counts as a managed asset. Also used to
    /// filter the remote attachment listing during a full resync.
    pub fn is_valid(&self, filename: &str) -> bool {
        self.include.is_match(filename) && !self.exclude.is_match(filename)
    }

    /// Scan the target folder. Never fails as a whole; per-file problems
    /// are logged and the file skipped.
    pub fn scan(&self) -> Vec<AssetRecord> {
        if !self.root.exists() {
            warn!(path = %self.root.display(), "target folder does not exist, treating as empty");
            return Vec::new();
        }

        let mut assets = Vec::new();
        for entry in WalkDir::new(&self.root).into_iter() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    error!(error = %e, "walk error, skipping entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(filename) = entry.file_name().to_str() else {
                warn!(path = %entry.path().display(), "non-UTF-8 filename, skipping");
                continue;
            };
            if !self.is_valid(filename) {
                continue;
            }
            match self.read_asset(entry.path(), filename) {
                Ok(asset) => assets.push(asset),
                Err(e) => {
                    error!(file = filename, error = %e, "failed to read asset, skipping");
                }
            }
        }
        assets
    }

    fn read_asset(&self, path: &Path, filename: &str) -> anyhow::Result<AssetRecord> {
        let content_hash = hash::hash_file(path)?;
        let (width, height): (u32, u32) = image::image_dimensions(path)?;
        Ok(AssetRecord {
            filename: filename.to_string(),
            path: path.to_path_buf(),
            content_hash,
            width,
            height,
        })
    }
}

pub(crate) fn build_glob_set(patterns: &[String]) -> anyhow::Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(GlobBuilder::new(pattern).case_insensitive(true).build()?);
    }
    Ok(builder.build()?)
}
