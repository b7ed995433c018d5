//! Error types for trust negotiation.
//!
//! Errors are split by who is at fault:
//! - [`ConfigError`] - the local configuration is unusable (fatal, never retried)
//! - [`ProtocolError`] - the issuer's response violates WS-Trust key-material rules
//! - [`NegotiationError`] - anything that aborts an `issue` call, wrapping the above
//!   plus remote faults, transport failures and timeouts

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use wstrust_transport_traits::TransportError;

use crate::model::KeyType;

/// A specialized `Result` type for negotiation operations.
pub type NegotiationResult<T> = std::result::Result<T, NegotiationError>;

/// Invalid negotiation parameters, detected before anything is sent.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    /// The configured key type is not one of bearer, symmetric or asymmetric.
    #[error("Unsupported key type: {0}")]
    UnsupportedKeyType(String),

    /// The configured entropy mode is not recognised.
    #[error("Unsupported entropy mode: {0}")]
    UnsupportedEntropyMode(String),

    /// The renewal threshold must be a percentage in `1..=100`.
    #[error("Renewal threshold must be between 1 and 100 percent, got {0}")]
    InvalidRenewalThreshold(u8),

    /// The maximum caching time must be positive.
    #[error("Maximum caching time must be positive")]
    NonPositiveCachingTime,

    /// A configured key size is zero or not a whole number of bytes.
    #[error("Key size must be a positive multiple of 8 bits, got {0}")]
    InvalidKeySize(u32),

    /// The default token lifetime must be positive.
    #[error("Default token lifetime must be positive")]
    NonPositiveTokenLifetime,
}

/// The issuer's response breaks the WS-Trust proof-token rules.
///
/// These are never downgraded to "no proof key": a response that trips one
/// of them is treated as malformed or spoofed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProtocolError {
    /// The response carries an `EncryptedKey` proof token.
    #[error("Encrypted proof tokens are not supported")]
    EncryptedProofTokensUnsupported,

    /// A bearer-key response carries proof-token material or issuer entropy.
    #[error("Bearer key responses must not carry a proof token or issuer entropy")]
    BearerKeyProtocolViolation,

    /// The response mixes an issuer-provided secret with computed-key material.
    #[error("Response carries both a binary-secret proof token and computed-key material")]
    AmbiguousProofTokenProtocolViolation,

    /// A computed key was requested for a non-symmetric key type.
    #[error("Computed proof keys require a symmetric key type, got {key_type}")]
    ComputedKeyRequiresSymmetric {
        /// The effective key type of the exchange
        key_type: KeyType,
    },

    /// The computed-key algorithm is not P_SHA1.
    #[error("Unsupported computed key algorithm: {0}")]
    UnsupportedComputedKeyAlgorithm(String),

    /// One side supplied its entropy as an encrypted key.
    #[error("Protected-key entropy is not supported")]
    ProtectedKeyEntropyUnsupported,

    /// A computed key was requested without issuer entropy.
    #[error("Computed key requested but the issuer supplied no entropy")]
    MissingIssuerEntropy,

    /// A computed key was requested but the request carried no entropy.
    #[error("Computed key requested but the request carried no entropy")]
    MissingRequesterEntropy,

    /// Neither the response, the request nor the algorithm suite gives a key size.
    #[error("No key size available for the computed key")]
    NoKeySizeProvided,

    /// The resolved key size is zero or not a whole number of bytes.
    #[error("Key size must be a positive multiple of 8 bits, got {0}")]
    InvalidKeySize(u32),

    /// The response names a key type this engine does not know.
    #[error("Unsupported key type in response: {0}")]
    UnsupportedKeyType(String),

    /// The issuer returned entropy but no computed-key algorithm to combine it with.
    #[error("Issuer entropy supplied without a computed key algorithm")]
    IssuerEntropyWithoutComputedKey,

    /// The key derivation function rejected its inputs.
    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),
}

/// Failure to translate between trust messages and their wire form.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Serialization failed: {message}")]
pub struct SerializationError {
    /// Human-readable description of what could not be read or written.
    pub message: String,
}

impl SerializationError {
    /// Creates a new serialization error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A SOAP fault returned by the issuer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultDetail {
    /// Fault code (e.g. `s:Sender`).
    pub code: String,

    /// Optional subcode (e.g. `wst:InvalidRequest`).
    #[serde(default)]
    pub subcode: Option<String>,

    /// Fault reason text.
    pub reason: String,

    /// Serialized fault detail element, if any.
    #[serde(default)]
    pub detail: Option<String>,
}

impl FaultDetail {
    /// Creates a fault with the given code and reason.
    pub fn new(code: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            subcode: None,
            reason: reason.into(),
            detail: None,
        }
    }

    /// Sets the subcode.
    #[must_use]
    pub fn with_subcode(mut self, subcode: impl Into<String>) -> Self {
        self.subcode = Some(subcode.into());
        self
    }

    /// Sets the detail payload.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

impl fmt::Display for FaultDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code)?;
        if let Some(subcode) = &self.subcode {
            write!(f, "/{subcode}")?;
        }
        write!(f, ": {}", self.reason)
    }
}

/// Anything that aborts an issued-token negotiation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum NegotiationError {
    /// The negotiation parameters are invalid.
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// The issuer's response violates the WS-Trust key-material rules.
    #[error("Protocol violation: {0}")]
    Protocol(#[from] ProtocolError),

    /// The issuer answered with a SOAP fault.
    #[error("Remote fault: {0}")]
    RemoteFault(FaultDetail),

    /// The transport failed; passed through unchanged.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// The request could not be written or the reply could not be read.
    #[error(transparent)]
    Serialization(#[from] SerializationError),

    /// The caller's time budget ran out before a reply arrived.
    #[error("Negotiation timed out after {0:?}")]
    Timeout(Duration),

    /// The response did not carry a usable security token.
    #[error("Response did not contain a requested security token")]
    TokenUnavailable,
}

impl NegotiationError {
    /// Returns `true` for both engine-level and transport-level timeouts.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout(_) => true,
            Self::Transport(err) => err.is_timeout(),
            _ => false,
        }
    }

    /// Returns `true` if the error is a protocol violation by the issuer.
    #[must_use]
    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, Self::Protocol(_))
    }
}
