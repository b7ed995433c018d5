//! Channel configuration types.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Byte limits applied to envelopes in both directions.
///
/// Security token responses are small; the defaults are sized for an RSTR
/// carrying a SAML assertion plus key material, with room to spare.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Largest accepted reply; `None` disables the check
    pub max_response_size: Option<usize>,

    /// Largest outbound request; `None` disables the check
    pub max_request_size: Option<usize>,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_response_size: Some(1 << 20),
            max_request_size: Some(256 << 10),
        }
    }
}

impl LimitsConfig {
    /// No size checks at all.
    #[must_use]
    pub const fn unlimited() -> Self {
        Self {
            max_response_size: None,
            max_request_size: None,
        }
    }

    /// Tighter limits for issuers outside the caller's control.
    #[must_use]
    pub const fn strict() -> Self {
        Self {
            max_response_size: Some(128 << 10),
            max_request_size: Some(64 << 10),
        }
    }
}

/// Budgets for the channel lifecycle and a single exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Time allowed for opening the channel.
    pub open: Duration,

    /// Default time allowed for a single request/response exchange.
    /// Callers of the negotiation engine normally pass their own budget.
    pub request: Duration,

    /// Time allowed for a graceful close before the channel is aborted.
    pub close: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            open: Duration::from_secs(30),
            request: Duration::from_secs(60),
            close: Duration::from_secs(10),
        }
    }
}

impl TimeoutConfig {
    /// Short budgets for callers that would rather fail than wait.
    #[must_use]
    pub const fn fast() -> Self {
        Self {
            open: Duration::from_secs(5),
            request: Duration::from_secs(10),
            close: Duration::from_secs(2),
        }
    }

    /// Long budgets for slow or federated issuers.
    #[must_use]
    pub const fn patient() -> Self {
        Self {
            open: Duration::from_secs(60),
            request: Duration::from_secs(300),
            close: Duration::from_secs(30),
        }
    }
}
