//! Negotiation Configuration Types
//!
//! [`NegotiationParams`] describes one negotiation target: which issuer to
//! ask, which relying party the token is for, and how keys and caching are
//! handled. It deserializes from any serde source with sensible defaults.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;
use wstrust_transport_traits::{ChannelConfig, LimitsConfig, TimeoutConfig};

use crate::error::ConfigError;
use crate::model::{EntropyMode, KeyType, TrustVersion};

/// Key size used for asymmetric proof keys when none is configured.
pub const DEFAULT_ASYMMETRIC_KEY_SIZE: u32 = 1024;

/// Default renewal threshold: renew once 60% of the token's lifetime has passed.
pub const DEFAULT_RENEWAL_THRESHOLD_PERCENT: u8 = 60;

/// Lifetime assumed for tokens whose response omits `Expires`.
pub const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

/// Security algorithm suite, as far as key sizing is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SecurityAlgorithmSuite {
    /// AES-128 family.
    Basic128,
    /// AES-192 family.
    Basic192,
    /// AES-256 family.
    #[default]
    Basic256,
    /// Triple-DES family.
    TripleDes,
}

impl SecurityAlgorithmSuite {
    /// Default symmetric key length in bits.
    #[must_use]
    pub fn default_symmetric_key_length(self) -> u32 {
        match self {
            Self::Basic128 => 128,
            Self::Basic192 | Self::TripleDes => 192,
            Self::Basic256 => 256,
        }
    }

    /// Default asymmetric key length in bits.
    #[must_use]
    pub fn default_asymmetric_key_length(self) -> u32 {
        DEFAULT_ASYMMETRIC_KEY_SIZE
    }
}

/// Parameters for negotiating issued tokens with one issuer for one relying party.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NegotiationParams {
    /// STS endpoint address
    pub issuer_address: Url,
    /// Relying party the token is requested for
    pub applies_to: Url,
    /// Proof-key type
    #[serde(default = "default_key_type")]
    pub key_type: KeyType,
    /// Whether and how the requester contributes key material
    #[serde(default)]
    pub entropy_mode: EntropyMode,
    /// Requested token type URI
    #[serde(default)]
    pub token_type: Option<String>,
    /// Protocol version
    #[serde(default)]
    pub trust_version: TrustVersion,
    /// Algorithm suite supplying default key sizes
    #[serde(default)]
    pub algorithm_suite: SecurityAlgorithmSuite,
    /// Explicit key size; overrides the algorithm suite for non-bearer keys
    #[serde(default)]
    pub key_size_bits: Option<u32>,
    /// Fixed request context; a fresh URN is generated per request when absent
    #[serde(default)]
    pub context: Option<String>,
    /// Whether accepted responses are reused until their renewal point
    #[serde(default = "default_cache_issued_tokens")]
    pub cache_issued_tokens: bool,
    /// Share of the token lifetime after which it is renewed (1-100)
    #[serde(default = "default_renewal_threshold_percent")]
    pub renewal_threshold_percent: u8,
    /// Upper bound on how long a response is cached
    #[serde(default = "default_max_caching_time")]
    pub max_caching_time: Duration,
    /// Lifetime assumed when the issuer omits `Expires`
    #[serde(default = "default_token_lifetime")]
    pub default_token_lifetime: Duration,
    /// Transport size limits
    #[serde(default)]
    pub limits: LimitsConfig,
    /// Transport lifecycle timeouts
    #[serde(default)]
    pub timeouts: TimeoutConfig,
}

fn default_key_type() -> KeyType {
    KeyType::Symmetric
}

fn default_cache_issued_tokens() -> bool {
    true
}

fn default_renewal_threshold_percent() -> u8 {
    DEFAULT_RENEWAL_THRESHOLD_PERCENT
}

fn default_max_caching_time() -> Duration {
    Duration::MAX
}

fn default_token_lifetime() -> Duration {
    DEFAULT_TOKEN_LIFETIME
}

impl NegotiationParams {
    /// Parameters for `applies_to` via `issuer_address`, with defaults for everything else.
    pub fn new(issuer_address: Url, applies_to: Url) -> Self {
        Self {
            issuer_address,
            applies_to,
            key_type: default_key_type(),
            entropy_mode: EntropyMode::default(),
            token_type: None,
            trust_version: TrustVersion::default(),
            algorithm_suite: SecurityAlgorithmSuite::default(),
            key_size_bits: None,
            context: None,
            cache_issued_tokens: default_cache_issued_tokens(),
            renewal_threshold_percent: default_renewal_threshold_percent(),
            max_caching_time: default_max_caching_time(),
            default_token_lifetime: default_token_lifetime(),
            limits: LimitsConfig::default(),
            timeouts: TimeoutConfig::default(),
        }
    }

    /// Sets the key type.
    #[must_use]
    pub fn with_key_type(mut self, key_type: KeyType) -> Self {
        self.key_type = key_type;
        self
    }

    /// Sets the entropy mode.
    #[must_use]
    pub fn with_entropy_mode(mut self, entropy_mode: EntropyMode) -> Self {
        self.entropy_mode = entropy_mode;
        self
    }

    /// Sets the requested token type.
    #[must_use]
    pub fn with_token_type(mut self, token_type: impl Into<String>) -> Self {
        self.token_type = Some(token_type.into());
        self
    }

    /// Sets the trust version.
    #[must_use]
    pub fn with_trust_version(mut self, trust_version: TrustVersion) -> Self {
        self.trust_version = trust_version;
        self
    }

    /// Sets the algorithm suite.
    #[must_use]
    pub fn with_algorithm_suite(mut self, suite: SecurityAlgorithmSuite) -> Self {
        self.algorithm_suite = suite;
        self
    }

    /// Sets an explicit key size.
    #[must_use]
    pub fn with_key_size_bits(mut self, bits: u32) -> Self {
        self.key_size_bits = Some(bits);
        self
    }

    /// Uses a fixed request context.
    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Enables or disables response caching.
    #[must_use]
    pub fn with_caching(mut self, enabled: bool) -> Self {
        self.cache_issued_tokens = enabled;
        self
    }

    /// Sets the renewal threshold percentage.
    #[must_use]
    pub fn with_renewal_threshold_percent(mut self, percent: u8) -> Self {
        self.renewal_threshold_percent = percent;
        self
    }

    /// Sets the maximum caching time.
    #[must_use]
    pub fn with_max_caching_time(mut self, max: Duration) -> Self {
        self.max_caching_time = max;
        self
    }

    /// Sets the lifetime assumed for responses without `Expires`.
    #[must_use]
    pub fn with_default_token_lifetime(mut self, lifetime: Duration) -> Self {
        self.default_token_lifetime = lifetime;
        self
    }

    /// Sets transport size limits.
    #[must_use]
    pub fn with_limits(mut self, limits: LimitsConfig) -> Self {
        self.limits = limits;
        self
    }

    /// Sets transport lifecycle timeouts.
    #[must_use]
    pub fn with_timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Key size in bits for the configured key type.
    #[must_use]
    pub fn resolved_key_size_bits(&self) -> u32 {
        match self.key_type {
            KeyType::Bearer => 0,
            KeyType::Symmetric => self
                .key_size_bits
                .unwrap_or_else(|| self.algorithm_suite.default_symmetric_key_length()),
            KeyType::Asymmetric => self
                .key_size_bits
                .unwrap_or_else(|| self.algorithm_suite.default_asymmetric_key_length()),
        }
    }

    /// Checks everything that can be checked without talking to the issuer.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.renewal_threshold_percent) {
            return Err(ConfigError::InvalidRenewalThreshold(
                self.renewal_threshold_percent,
            ));
        }
        if self.max_caching_time.is_zero() {
            return Err(ConfigError::NonPositiveCachingTime);
        }
        if self.default_token_lifetime.is_zero() {
            return Err(ConfigError::NonPositiveTokenLifetime);
        }
        if self.key_type != KeyType::Bearer {
            let bits = self.resolved_key_size_bits();
            if bits == 0 || bits % 8 != 0 {
                return Err(ConfigError::InvalidKeySize(bits));
            }
        }
        Ok(())
    }

    /// Transport configuration for the issuer channel.
    #[must_use]
    pub fn channel_config(&self) -> ChannelConfig {
        ChannelConfig::new(self.issuer_address.as_str())
            .with_limits(self.limits.clone())
            .with_timeouts(self.timeouts.clone())
    }
}
