//! Remote error taxonomy
//!
//! Every failure coming back from the wiki content API is classified into one
//! of these variants so that calling code can branch on *category*:
//!
//! - retryable: rate limits, version conflicts, server errors, transport
//!   failures - the client layer retries these with backoff up to a ceiling
//! - permanent: any other 4xx - never retried, the response detail is carried
//!   along for diagnosis

use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by the remote content client.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// HTTP 429 - the server asked us to slow down.
    #[error("rate limited by server (HTTP 429)")]
    RateLimited {
        /// Server-specified backoff from the `Retry-After` header, if any.
        retry_after: Option<Duration>,
    },

    /// HTTP 409 - optimistic version check failed or the page is locked.
    #[error("version conflict (HTTP 409)")]
    Conflict,

    /// HTTP 5xx - transient server-side failure.
    #[error("server error (HTTP {status})")]
    Server { status: u16 },

    /// Network-level failure (connect, timeout, broken stream).
    #[error("transport error: {message}")]
    Transport { message: String },

    /// Any other 4xx - not retryable, carries the response body for diagnosis.
    #[error("remote rejected request (HTTP {status}): {detail}")]
    Permanent { status: u16, detail: String },

    /// The response arrived but did not have the expected shape.
    #[error("unexpected response shape: {0}")]
    BadResponse(String),
}

impl RemoteError {
    /// Whether the retry policy may re-attempt the request.
    ///
    /// Permanent 4xx responses and malformed payloads short-circuit retries
    /// even when wrapped in a transport-level failure upstream.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RemoteError::RateLimited { .. }
                | RemoteError::Conflict
                | RemoteError::Server { .. }
                | RemoteError::Transport { .. }
        )
    }

    /// Server-requested backoff, when the error carries one.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            RemoteError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_categories() {
        assert!(RemoteError::RateLimited { retry_after: None }.is_retryable());
        assert!(RemoteError::Conflict.is_retryable());
        assert!(RemoteError::Server { status: 503 }.is_retryable());
        assert!(RemoteError::Transport {
            message: "connection reset".into()
        }
        .is_retryable());
    }

    #[test]
    fn permanent_categories() {
        assert!(!RemoteError::Permanent {
            status: 404,
            detail: "no such page".into()
        }
        .is_retryable());
        assert!(!RemoteError::BadResponse("missing id".into()).is_retryable());
    }

    #[test]
    fn retry_after_only_on_rate_limit() {
        let err = RemoteError::RateLimited {
            retry_after: Some(Duration::from_secs(7)),
        };
        assert_eq!(err.retry_after(), Some(Duration::from_secs(7)));
        assert_eq!(RemoteError::Conflict.retry_after(), None);
    }

    #[test]
    fn display_includes_status_and_detail() {
        let err = RemoteError::Permanent {
            status: 400,
            detail: "bad payload".into(),
        };
        let text = err.to_string();
        assert!(text.contains("400"));
        assert!(text.contains("bad payload"));
    }
}
