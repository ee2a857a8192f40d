//! Port definitions (hexagonal architecture interfaces)
//!
//! Ports are the interfaces the sync engine depends on; implementations
//! live in adapter crates (`artsync-remote` for the wiki client,
//! `artsync-render` for classification and page rendering).
//!
//! - [`IRemotePage`] - the managed wiki page and its attachments
//! - [`IAssetClassifier`] - filename-convention classification + captions
//! - [`IPageRenderer`] - page body construction and history patching

pub mod remote;
pub mod render;

pub use remote::IRemotePage;
pub use render::{IAssetClassifier, IPageRenderer};
