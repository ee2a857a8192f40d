//! Classification and rendering ports (driven/secondary ports)
//!
//! The sync engine hands scanned assets to a classifier and the resulting
//! buckets to a renderer; it never inspects filename conventions or page
//! markup itself. Both traits are synchronous pure-ish collaborators.

use crate::domain::{AssetRecord, ClassifiedAssets, HistoryEntry};

/// Buckets scanned assets into page sections and groups, attaching captions.
pub trait IAssetClassifier: Send + Sync {
    fn classify(&self, assets: &[AssetRecord]) -> ClassifiedAssets;

    /// Re-read the captions source. Implementations keep the previous data
    /// when the source is missing or unreadable.
    fn reload_captions(&self) -> anyhow::Result<()>;
}

/// Builds the page body from classified assets and the history log.
pub trait IPageRenderer: Send + Sync {
    /// Full body rebuild.
    fn render_page(&self, classified: &ClassifiedAssets, history: &[HistoryEntry]) -> String;

    /// Replace only the history block inside an existing body. Returns
    /// `None` when the body carries no recognizable history block, in which
    /// case the caller falls back to a full rebuild.
    fn patch_history(&self, current_body: &str, history: &[HistoryEntry]) -> Option<String>;
}
