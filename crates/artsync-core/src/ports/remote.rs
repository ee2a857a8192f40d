//! Remote page port (driven/secondary port)
//!
//! Interface for the single managed wiki page and its attachment store.
//! The primary implementation targets the Confluence Cloud REST API, but
//! the trait only assumes "a page with versioned body and named binary
//! attachments".
//!
//! Uses `anyhow::Result` at the boundary; the adapter keeps its own typed
//! error taxonomy for retry classification and wraps it on the way out.

use std::path::Path;

use crate::domain::{AttachmentMeta, PageContent, PageVersion};

#[async_trait::async_trait]
pub trait IRemotePage: Send + Sync {
    /// Fetch the current page body and its version number.
    async fn get_page(&self) -> anyhow::Result<PageContent>;

    /// Overwrite the page body, targeting `current_version + 1`.
    ///
    /// `current_version` must be re-read immediately before calling; a
    /// stale number makes the remote system reject the write as a conflict.
    async fn update_page(
        &self,
        body: &str,
        title: &str,
        current_version: u64,
    ) -> anyhow::Result<()>;

    /// List every attachment on the page, following pagination.
    async fn list_attachments(&self) -> anyhow::Result<Vec<AttachmentMeta>>;

    /// Download attachment bytes via the reference from [`AttachmentMeta`].
    async fn download_attachment(&self, download_path: &str) -> anyhow::Result<Vec<u8>>;

    /// Delete one attachment by id.
    async fn delete_attachment(&self, id: &str) -> anyhow::Result<()>;

    /// Upload `path` as `filename`, replacing any attachment with the same
    /// filename. Returns the normalized attachment id.
    async fn upload_attachment(&self, path: &Path, filename: &str) -> anyhow::Result<String>;

    /// Set the page appearance (e.g. full-width) via content properties.
    async fn set_appearance(&self, mode: &str) -> anyhow::Result<()>;

    /// List page versions, newest first, following pagination.
    async fn list_versions(&self) -> anyhow::Result<Vec<PageVersion>>;

    /// Delete one historical page version. The latest version cannot be
    /// deleted; callers must skip it.
    async fn delete_version(&self, number: u64) -> anyhow::Result<()>;
}
