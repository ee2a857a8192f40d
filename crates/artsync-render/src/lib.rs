//! Classification and page rendering for artsync.
//!
//! Implements the [`artsync_core::ports::IAssetClassifier`] and
//! [`artsync_core::ports::IPageRenderer`] ports for the slot-game filename
//! convention: `{scene}_{type}_{name}_{state}[_{language|digit}]`.

pub mod classifier;
pub mod notes;
pub mod page;
pub mod validator;

pub use classifier::SlotGameClassifier;
pub use notes::CaptionStore;
pub use page::PageBuilder;
pub use validator::{FilenameValidator, NamingRules};
