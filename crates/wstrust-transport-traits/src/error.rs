//! Transport error types.
//!
//! The negotiation engine passes these through unchanged; it adds no retry
//! logic of its own.

use std::time::Duration;

use thiserror::Error;

use crate::config::LimitsConfig;
use crate::types::ChannelState;

/// Result alias for channel operations.
pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Failures reported by a [`RequestChannel`](crate::RequestChannel).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransportError {
    /// The issuer endpoint could not be reached.
    #[error("Cannot connect to issuer: {0}")]
    ConnectionFailed(String),

    /// The connection dropped mid-exchange.
    #[error("Connection to issuer lost: {0}")]
    ConnectionLost(String),

    /// The issuer answered at the transport level with a non-SOAP error
    /// (for example an HTTP 503 without a fault body).
    #[error("Issuer returned status {status}: {message}")]
    Status {
        /// Transport status code
        status: u16,
        /// Status text or body excerpt
        message: String,
    },

    /// The exchange did not finish in time.
    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        /// What was being attempted
        operation: String,
        /// The budget that ran out
        timeout: Duration,
    },

    /// The channel's lifecycle does not allow the operation.
    #[error("Channel is {state}, cannot {operation}")]
    InvalidState {
        /// Where the channel was
        state: ChannelState,
        /// What was attempted
        operation: String,
    },

    /// The channel was aborted with the request still pending.
    #[error("Channel aborted")]
    Aborted,

    /// The channel configuration is unusable (bad endpoint, TLS setup, ...).
    #[error("Invalid channel configuration: {0}")]
    ConfigurationError(String),

    /// Anything else the channel implementation could not classify.
    #[error("Internal transport error: {0}")]
    Internal(String),

    /// An outbound message is above `LimitsConfig::max_request_size`.
    #[error("Request of {size} bytes exceeds the {max} byte limit")]
    RequestTooLarge {
        /// Message size in bytes
        size: usize,
        /// Configured limit in bytes
        max: usize,
    },

    /// A reply is above `LimitsConfig::max_response_size`.
    #[error("Response of {size} bytes exceeds the {max} byte limit")]
    ResponseTooLarge {
        /// Message size in bytes
        size: usize,
        /// Configured limit in bytes
        max: usize,
    },
}

impl TransportError {
    /// Returns `true` for [`TransportError::Timeout`].
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns `true` if a fresh attempt on a new connection might succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::ConnectionFailed(_) | Self::ConnectionLost(_) | Self::Timeout { .. } => true,
            Self::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::ConnectionRefused | std::io::ErrorKind::NotFound => {
                Self::ConnectionFailed(err.to_string())
            }
            std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::UnexpectedEof => Self::ConnectionLost(err.to_string()),
            _ => Self::Internal(err.to_string()),
        }
    }
}

fn exceeds(size: usize, limit: Option<usize>) -> Option<usize> {
    limit.filter(|max| size > *max)
}

/// Checks an outbound message size against `limits`.
pub fn validate_request_size(size: usize, limits: &LimitsConfig) -> TransportResult<()> {
    match exceeds(size, limits.max_request_size) {
        Some(max) => Err(TransportError::RequestTooLarge { size, max }),
        None => Ok(()),
    }
}

/// Checks a reply size against `limits`.
pub fn validate_response_size(size: usize, limits: &LimitsConfig) -> TransportResult<()> {
    match exceeds(size, limits.max_response_size) {
        Some(max) => Err(TransportError::ResponseTooLarge { size, max }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limits_enforced() {
        let limits = LimitsConfig::default();
        assert!(validate_request_size(4 * 1024, &limits).is_ok());
        assert_eq!(
            validate_request_size(512 * 1024, &limits),
            Err(TransportError::RequestTooLarge {
                size: 512 * 1024,
                max: 256 * 1024
            })
        );
        assert_eq!(
            validate_response_size(2 * 1024 * 1024, &limits),
            Err(TransportError::ResponseTooLarge {
                size: 2 * 1024 * 1024,
                max: 1024 * 1024
            })
        );
    }

    #[test]
    fn test_limit_is_inclusive() {
        let limits = LimitsConfig::strict();
        assert!(validate_response_size(128 * 1024, &limits).is_ok());
        assert!(validate_response_size(128 * 1024 + 1, &limits).is_err());
    }

    #[test]
    fn test_unlimited_accepts_anything() {
        let limits = LimitsConfig::unlimited();
        assert!(validate_request_size(usize::MAX, &limits).is_ok());
        assert!(validate_response_size(usize::MAX, &limits).is_ok());
    }

    #[test]
    fn test_classification() {
        let timeout = TransportError::Timeout {
            operation: "request".to_string(),
            timeout: Duration::from_secs(5),
        };
        assert!(timeout.is_timeout());
        assert!(timeout.is_transient());
        assert!(!TransportError::Aborted.is_timeout());
        assert!(
            TransportError::Status {
                status: 503,
                message: "Service Unavailable".to_string()
            }
            .is_transient()
        );
        assert!(
            !TransportError::Status {
                status: 400,
                message: "Bad Request".to_string()
            }
            .is_transient()
        );
    }

    #[test]
    fn test_io_error_mapping() {
        let refused = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        assert!(matches!(
            TransportError::from(refused),
            TransportError::ConnectionFailed(_)
        ));
        let reset = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        assert!(matches!(
            TransportError::from(reset),
            TransportError::ConnectionLost(_)
        ));
    }

    #[test]
    fn test_display() {
        let err = TransportError::InvalidState {
            state: ChannelState::Closed,
            operation: "request".to_string(),
        };
        assert_eq!(err.to_string(), "Channel is closed, cannot request");
        let err = TransportError::Timeout {
            operation: "open".to_string(),
            timeout: Duration::from_millis(250),
        };
        assert_eq!(err.to_string(), "open timed out after 250ms");
    }
}
