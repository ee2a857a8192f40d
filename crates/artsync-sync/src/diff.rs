//! Pure diff between the local scan and the cached remote inventory.

use std::collections::BTreeMap;

use artsync_core::domain::{AssetRecord, RemoteAssetRecord};

/// The three buckets of work a sync round has to do. No ordering guarantee
/// within a bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncDiff {
    /// Local files with no remote counterpart.
    pub to_add: Vec<String>,
    /// Files present on both sides with differing content hashes.
    pub to_update: Vec<String>,
    /// Remote attachments with no local counterpart.
    pub to_delete: Vec<String>,
}

impl SyncDiff {
    pub fn has_changes(&self) -> bool {
        !self.to_add.is_empty() || !self.to_update.is_empty() || !self.to_delete.is_empty()
    }

    /// Compact log form, e.g. `+2 ~1 -0`.
    pub fn summary(&self) -> String {
        format!(
            "+{} ~{} -{}",
            self.to_add.len(),
            self.to_update.len(),
            self.to_delete.len()
        )
    }
}

/// Compare by filename membership and by content hash for files on both
/// sides. Hash comparison is case-normalized so digests from differently
/// cased hex encoders still match.
pub fn diff(
    local: &BTreeMap<String, AssetRecord>,
    remote: &BTreeMap<String, RemoteAssetRecord>,
) -> SyncDiff {
    let mut result = SyncDiff::default();

    for (name, asset) in local {
        match remote.get(name) {
            None => result.to_add.push(name.clone()),
            Some(record) => {
                if !asset.content_hash.eq_ignore_ascii_case(&record.hash) {
                    result.to_update.push(name.clone());
                }
            }
        }
    }

    for name in remote.keys() {
        if !local.contains_key(name) {
            result.to_delete.push(name.clone());
        }
    }

    result
}
