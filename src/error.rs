//! Error types for issuance, verification, and the capability traits.

use std::error::Error as StdError;
use std::fmt;

use thiserror::Error;

type BoxedSource = Box<dyn StdError + Send + Sync + 'static>;

/// Outcome kinds reported by [`crate::OtpService`].
///
/// Issuance and verification are expected-failure-heavy (users mistype
/// codes regularly), so every outcome is a value of this enum rather than
/// a panic or an opaque fault.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum OtpError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("rate limited")]
    RateLimited,
    #[error("delivery failed")]
    DeliveryFailed(#[source] DeliveryError),
    #[error("store failed")]
    StoreFailed(#[source] StoreError),
    #[error("no pending code")]
    NotFound,
    #[error("code expired")]
    Expired,
    #[error("invalid code")]
    InvalidCode,
    #[error("too many attempts")]
    TooManyAttempts,
    #[error("code already consumed")]
    AlreadyConsumed,
    #[error("operation cancelled")]
    Cancelled,
    #[error("operation timed out")]
    Timeout,
}

impl OtpError {
    /// Stable machine-readable name for the error kind, for logs and
    /// structured responses.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::RateLimited => "rate_limited",
            Self::DeliveryFailed(_) => "delivery_failed",
            Self::StoreFailed(_) => "store_failed",
            Self::NotFound => "not_found",
            Self::Expired => "expired",
            Self::InvalidCode => "invalid_code",
            Self::TooManyAttempts => "too_many_attempts",
            Self::AlreadyConsumed => "already_consumed",
            Self::Cancelled => "cancelled",
            Self::Timeout => "timeout",
        }
    }
}

/// Error returned by [`crate::OtpStore`] implementations.
#[derive(Debug)]
pub struct StoreError {
    message: String,
    source: Option<BoxedSource>,
}

impl StoreError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    #[must_use]
    pub fn with_source(message: impl Into<String>, source: impl Into<BoxedSource>) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl StdError for StoreError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_deref()
            .map(|source| source as &(dyn StdError + 'static))
    }
}

/// Error returned by [`crate::Delivery`] implementations.
///
/// Transient failures (provider hiccup, connection reset) are retried with
/// bounded attempts by the service; terminal failures surface immediately.
#[derive(Debug)]
pub struct DeliveryError {
    message: String,
    transient: bool,
    source: Option<BoxedSource>,
}

impl DeliveryError {
    /// A failure that will not succeed on retry (bad address, rejected
    /// template).
    #[must_use]
    pub fn terminal(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            transient: false,
            source: None,
        }
    }

    /// A failure worth retrying with backoff.
    #[must_use]
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            transient: true,
            source: None,
        }
    }

    #[must_use]
    pub fn with_source(mut self, source: impl Into<BoxedSource>) -> Self {
        self.source = Some(source.into());
        self
    }

    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.transient
    }
}

impl fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl StdError for DeliveryError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_deref()
            .map(|source| source as &(dyn StdError + 'static))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_is_stable() {
        assert_eq!(OtpError::NotFound.kind(), "not_found");
        assert_eq!(OtpError::InvalidInput("x".to_string()).kind(), "invalid_input");
        assert_eq!(OtpError::TooManyAttempts.kind(), "too_many_attempts");
    }

    #[test]
    fn store_error_carries_source() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        let err = StoreError::with_source("insert failed", io);
        assert_eq!(err.to_string(), "insert failed");
        assert!(err.source().is_some());

        let err = StoreError::new("lookup failed");
        assert!(err.source().is_none());
    }

    #[test]
    fn delivery_error_transient_flag() {
        assert!(DeliveryError::transient("timeout").is_transient());
        assert!(!DeliveryError::terminal("bounced").is_transient());
    }
}
