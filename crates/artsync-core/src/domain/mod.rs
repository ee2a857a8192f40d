//! Domain types shared across artsync crates.

mod asset;
mod classified;
mod history;

pub use asset::{AssetRecord, AttachmentMeta, PageContent, PageVersion, RemoteAssetRecord};
pub use classified::{AssetEntry, ClassifiedAssets, Section};
pub use history::HistoryEntry;
