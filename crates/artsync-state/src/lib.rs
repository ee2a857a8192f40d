//! Persistent sync state for artsync.
//!
//! Two small JSON documents back each managed project: a cache of what the
//! remote page is believed to hold (filename -> attachment id + content
//! hash) and the bounded history log rendered onto the page. Both are
//! rewritten wholesale on every save, atomically.

pub mod store;

pub use store::{LoadWarning, StateError, StateStore};
