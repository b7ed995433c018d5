//! Trust request construction.

use rand::RngCore;
use uuid::Uuid;

use crate::config::NegotiationParams;
use crate::error::ConfigError;
use crate::model::{Entropy, KeyType, RequestType, SecretBytes, TrustRequest};

/// Builds [`TrustRequest`]s for a validated set of [`NegotiationParams`].
///
/// Building is pure apart from drawing requester entropy from the
/// thread-local CSPRNG.
#[derive(Debug, Clone)]
pub struct TrustRequestBuilder {
    params: NegotiationParams,
}

impl TrustRequestBuilder {
    /// Creates a builder, rejecting invalid parameters up front.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if `params` fail validation.
    pub fn new(params: NegotiationParams) -> Result<Self, ConfigError> {
        params.validate()?;
        Ok(Self { params })
    }

    /// The parameters requests are built from.
    pub fn params(&self) -> &NegotiationParams {
        &self.params
    }

    /// Builds a fresh `Issue` request.
    pub fn build(&self) -> TrustRequest {
        self.build_with_type(RequestType::Issue)
    }

    /// Builds a fresh request of `request_type`.
    pub fn build_with_type(&self, request_type: RequestType) -> TrustRequest {
        let params = &self.params;
        let key_size_bits = params.resolved_key_size_bits();

        let (entropy, computed_key_algorithm) =
            if params.key_type != KeyType::Bearer && params.entropy_mode.requester_supplies() {
                (
                    Some(Entropy::BinarySecret(generate_entropy(key_size_bits))),
                    Some(params.trust_version.psha1_algorithm().to_string()),
                )
            } else {
                (None, None)
            };

        TrustRequest {
            context: params
                .context
                .clone()
                .unwrap_or_else(|| format!("urn:uuid:{}", Uuid::new_v4())),
            request_type,
            applies_to: params.applies_to.clone(),
            token_type: params.token_type.clone(),
            key_type: params.key_type,
            key_size_bits,
            entropy,
            computed_key_algorithm,
            trust_version: params.trust_version,
        }
    }
}

/// `key_size_bits / 8` bytes from the thread-local CSPRNG.
fn generate_entropy(key_size_bits: u32) -> SecretBytes {
    let mut bytes = vec![0u8; (key_size_bits / 8) as usize];
    rand::rng().fill_bytes(&mut bytes);
    SecretBytes::new(bytes)
}
