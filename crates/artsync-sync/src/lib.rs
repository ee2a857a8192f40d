//! Sync engine for artsync.
//!
//! The pipeline: the [`watcher`] reports filtered file events, the
//! [`coalescer`] merges them into debounced sync rounds, and the
//! [`engine`] runs each round: scan ([`scanner`]), hash ([`hash`]), diff
//! ([`diff`]), apply against the remote page, render, push, persist.

pub mod coalescer;
pub mod diff;
pub mod engine;
pub mod hash;
pub mod scanner;
pub mod watcher;

pub use coalescer::{Coalescer, SyncRunner};
pub use diff::SyncDiff;
pub use engine::{SyncEngine, SyncOptions};
pub use scanner::LocalScanner;
pub use watcher::WatchHandle;
