//! artsync core - domain types, configuration, and ports
//!
//! This crate contains the pieces shared by every other artsync crate:
//! - **Domain types** - `AssetRecord`, `RemoteAssetRecord`, `HistoryEntry`,
//!   `ClassifiedAssets`
//! - **Error taxonomy** - [`error::RemoteError`], so callers can branch on
//!   retryable vs permanent failures instead of matching message text
//! - **Port definitions** - traits implemented by adapter crates:
//!   [`ports::IRemotePage`], [`ports::IAssetClassifier`], [`ports::IPageRenderer`]
//! - **Configuration** - typed YAML config with `${VAR}` interpolation and
//!   validation
//!
//! The sync orchestrator in `artsync-sync` depends only on the ports defined
//! here; the wiki client and the page renderer are injected as capabilities.

pub mod config;
pub mod domain;
pub mod error;
pub mod ports;
