//! Error handling

use std::fmt;

use crate::validator::RejectReason;

/// Failures at the HTTP boundary.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TransportError {
    /// The call ran past its timeout
    Timeout,
    /// The server answered with a non-2xx status
    Status(u16),
    /// Connection, DNS, TLS and other transport failures
    Network(String),
    /// The response body couldn't be read
    Body(String),
}

impl TransportError {
    /// Returns true for the failures a retry could plausibly fix.
    pub fn is_transient(&self, retry_statuses: &[u16]) -> bool {
        match self {
            TransportError::Timeout | TransportError::Network(_) => true,
            TransportError::Status(code) => retry_statuses.contains(code),
            TransportError::Body(_) => false,
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "request timed out"),
            Self::Status(code) => write!(f, "server returned HTTP {code}"),
            Self::Network(err) => write!(f, "network error: {err}"),
            Self::Body(err) => write!(f, "failed to read response body: {err}"),
        }
    }
}

impl std::error::Error for TransportError {}

impl From<ureq::Error> for TransportError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::Timeout(_) => TransportError::Timeout,
            ureq::Error::StatusCode(code) => TransportError::Status(code),
            other => TransportError::Network(other.to_string()),
        }
    }
}

/// definitions for the wallfetch pipeline.
#[derive(Debug)]
pub enum WallfetchError {
    /// Network/timeout/non-2xx
    Transport(TransportError),
    /// Image bytes we couldn't parse
    Decode(String),
    /// Decoded fine, failed the quality gates
    Rejected(RejectReason),
    /// Re-encoding or writing the output failed
    Encode(String),
    /// History or pool file unreadable/unwritable
    Persistence(String),
}

impl fmt::Display for WallfetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(err) => write!(f, "transport error: {err}"),
            Self::Decode(err) => write!(f, "failed to decode image: {err}"),
            Self::Rejected(reason) => write!(f, "image rejected: {reason}"),
            Self::Encode(err) => write!(f, "failed to encode image: {err}"),
            Self::Persistence(err) => write!(f, "persistence error: {err}"),
        }
    }
}

impl std::error::Error for WallfetchError {}

impl From<TransportError> for WallfetchError {
    fn from(err: TransportError) -> Self {
        WallfetchError::Transport(err)
    }
}

impl From<RejectReason> for WallfetchError {
    fn from(reason: RejectReason) -> Self {
        WallfetchError::Rejected(reason)
    }
}

impl From<image::ImageError> for WallfetchError {
    fn from(err: image::ImageError) -> Self {
        match err {
            image::ImageError::Decoding(_) | image::ImageError::Unsupported(_) => {
                WallfetchError::Decode(err.to_string())
            }
            other => WallfetchError::Encode(other.to_string()),
        }
    }
}

impl From<std::io::Error> for WallfetchError {
    fn from(err: std::io::Error) -> Self {
        WallfetchError::Persistence(err.to_string())
    }
}

impl From<serde_json::Error> for WallfetchError {
    fn from(err: serde_json::Error) -> Self {
        WallfetchError::Persistence(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_errors() {
        let statuses = [429, 503];
        assert!(TransportError::Timeout.is_transient(&statuses));
        assert!(TransportError::Network("reset".to_string()).is_transient(&statuses));
        assert!(TransportError::Status(503).is_transient(&statuses));
        assert!(!TransportError::Status(404).is_transient(&statuses));
        assert!(!TransportError::Body("eof".to_string()).is_transient(&statuses));
    }

    #[test]
    fn io_errors_are_persistence_errors() {
        let err: WallfetchError = std::io::Error::other("disk full").into();
        assert!(matches!(err, WallfetchError::Persistence(_)));
        assert_eq!(err.to_string(), "persistence error: disk full");
    }
}
