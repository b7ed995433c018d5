//! Core channel types.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::{LimitsConfig, TimeoutConfig};

/// Lifecycle state of a request channel.
///
/// The state machine itself is owned by the channel implementation; this
/// enum only reports where it currently is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelState {
    /// Constructed but not yet opened.
    Created,
    /// Open in progress.
    Opening,
    /// Open and able to carry requests.
    Opened,
    /// Graceful close in progress.
    Closing,
    /// Closed or aborted. Terminal.
    Closed,
    /// The channel hit an unrecoverable error. Terminal.
    Faulted {
        /// A description of the failure reason.
        reason: String,
    },
}

impl ChannelState {
    /// Returns `true` once the channel can no longer carry requests.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed | Self::Faulted { .. })
    }
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Opening => write!(f, "opening"),
            Self::Opened => write!(f, "opened"),
            Self::Closing => write!(f, "closing"),
            Self::Closed => write!(f, "closed"),
            Self::Faulted { reason } => write!(f, "faulted: {reason}"),
        }
    }
}

/// Configuration handed to a [`ChannelFactory`](crate::ChannelFactory) when
/// it creates a channel to an issuer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Address of the remote endpoint (the STS).
    pub endpoint: String,

    /// Size limits for requests and responses.
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Timeout configuration for lifecycle operations.
    #[serde(default)]
    pub timeouts: TimeoutConfig,
}

impl ChannelConfig {
    /// Creates a configuration for `endpoint` with default limits and timeouts.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            limits: LimitsConfig::default(),
            timeouts: TimeoutConfig::default(),
        }
    }

    /// Replaces the size limits.
    #[must_use]
    pub fn with_limits(mut self, limits: LimitsConfig) -> Self {
        self.limits = limits;
        self
    }

    /// Replaces the timeouts.
    #[must_use]
    pub fn with_timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        self.timeouts = timeouts;
        self
    }
}
