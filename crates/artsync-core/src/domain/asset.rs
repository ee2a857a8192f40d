//! Local and remote asset records
//!
//! An *asset* is a local image file matching the configured include patterns;
//! an *attachment* is the binary object stored on the wiki page for one
//! asset. Filenames are unique per page and act as the join key everywhere.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// One locally scanned asset. Rebuilt on every scan pass, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRecord {
    /// Bare filename, e.g. `main_bg_title_normal.png`.
    pub filename: String,
    /// Absolute path on disk.
    pub path: PathBuf,
    /// Lowercase hex content digest.
    pub content_hash: String,
    /// Pixel width.
    pub width: u32,
    /// Pixel height.
    pub height: u32,
}

impl AssetRecord {
    /// `WxH` display string used in the rendered page.
    pub fn dimensions(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

/// Cached knowledge about one remote attachment, persisted by the state
/// store. The remote system is the source of truth for *existence*; this
/// record is a best-effort mirror used to avoid re-downloading everything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteAssetRecord {
    /// Attachment id as reported by the remote system (normalized, digits only).
    pub id: String,
    /// Lowercase hex content digest of the attachment bytes.
    pub hash: String,
}

/// Attachment metadata returned by the remote listing endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentMeta {
    /// Normalized attachment id.
    pub id: String,
    /// Attachment filename (the page-level join key).
    pub filename: String,
    /// Opaque download reference understood by the client.
    pub download_path: String,
}

/// Page title and body plus the version number they were read at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageContent {
    pub title: String,
    pub body: String,
    pub version: u64,
}

/// One entry from the page version listing (newest first).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageVersion {
    pub number: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimensions_format() {
        let asset = AssetRecord {
            filename: "a.png".into(),
            path: PathBuf::from("/assets/a.png"),
            content_hash: "abc".into(),
            width: 320,
            height: 240,
        };
        assert_eq!(asset.dimensions(), "320x240");
    }

    #[test]
    fn remote_record_roundtrips_through_json() {
        let record = RemoteAssetRecord {
            id: "123456".into(),
            hash: "deadbeef".into(),
        };
        let json = serde_json::to_string(&record).unwrap();
        let back: RemoteAssetRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(record, back);
    }
}
