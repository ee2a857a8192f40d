//! Wiki REST client for artsync.
//!
//! Implements the [`artsync_core::ports::IRemotePage`] port against a
//! Confluence Cloud style REST API: versioned page body, named binary
//! attachments, content properties, and a page version list. Every request
//! goes through one retry policy that distinguishes transient failures
//! (429/409/5xx/transport) from permanent ones (other 4xx).

pub mod client;

pub use client::WikiClient;
