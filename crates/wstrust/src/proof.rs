//! Proof-key derivation (WS-Trust 1.3 §4.4.3 key-material rules)
//!
//! Decides, from the request that was sent and the response that came back,
//! which proof key (if any) the issued token is bound to. The rules form a
//! strict precedence tree; a response that fits more than one branch is a
//! protocol violation, never a silent fallback:
//!
//! 1. `EncryptedKey` proof tokens are rejected outright.
//! 2. Bearer keys must come with no key material at all.
//! 3. An issuer `BinarySecret` is the key, and must stand alone.
//! 4. A computed key is `P_SHA1(requester entropy, issuer entropy)`.
//! 5. Otherwise the requester's own entropy is the key, if it sent any.
//! 6. Otherwise there is no key.

use tracing::warn;

use crate::constants::is_psha1;
use crate::error::ProtocolError;
use crate::model::{Entropy, KeyType, ProofKey, TrustRequest, TrustResponse};
use crate::psha1;

/// Derives the proof key for an accepted trust response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProofKeyDeriver {
    default_key_size_bits: Option<u32>,
}

impl ProofKeyDeriver {
    /// A deriver with no algorithm-suite key size fallback.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses `bits` when neither the response nor the request gives a computed-key size.
    #[must_use]
    pub fn with_default_key_size(mut self, bits: u32) -> Self {
        self.default_key_size_bits = Some(bits);
        self
    }

    /// Applies the key-material rules to `response`.
    ///
    /// # Errors
    ///
    /// Returns the [`ProtocolError`] for the first rule the response breaks.
    pub fn derive(
        &self,
        request: &TrustRequest,
        response: &TrustResponse,
    ) -> Result<ProofKey, ProtocolError> {
        let result = self.derive_inner(request, response);
        if let Err(err) = &result {
            warn!(context = %request.context, error = %err, "Rejected trust response key material");
        }
        result
    }

    fn derive_inner(
        &self,
        request: &TrustRequest,
        response: &TrustResponse,
    ) -> Result<ProofKey, ProtocolError> {
        if response.has_encrypted_key() {
            return Err(ProtocolError::EncryptedProofTokensUnsupported);
        }

        let key_type = effective_key_type(request, response)?;

        if key_type == KeyType::Bearer {
            if response.has_proof_token() || response.entropy.is_some() {
                return Err(ProtocolError::BearerKeyProtocolViolation);
            }
            return Ok(ProofKey::None);
        }

        let mut secrets = response.binary_secrets();
        let issuer_secret = secrets.next();
        let mut algorithms = response.computed_key_algorithms();
        let algorithm = algorithms.next();
        if secrets.next().is_some() || algorithms.next().is_some() {
            return Err(ProtocolError::AmbiguousProofTokenProtocolViolation);
        }

        if let Some(secret) = issuer_secret {
            if algorithm.is_some() || response.entropy.is_some() {
                return Err(ProtocolError::AmbiguousProofTokenProtocolViolation);
            }
            return Ok(ProofKey::Bytes(secret.clone()));
        }

        if let Some(algorithm) = algorithm {
            return self.computed_key(request, response, key_type, algorithm);
        }

        if response.entropy.is_some() {
            return Err(ProtocolError::IssuerEntropyWithoutComputedKey);
        }

        match &request.entropy {
            Some(Entropy::BinarySecret(secret)) => Ok(ProofKey::Bytes(secret.clone())),
            Some(Entropy::ProtectedKey(_)) => Err(ProtocolError::ProtectedKeyEntropyUnsupported),
            None => Ok(ProofKey::None),
        }
    }

    fn computed_key(
        &self,
        request: &TrustRequest,
        response: &TrustResponse,
        key_type: KeyType,
        algorithm: &str,
    ) -> Result<ProofKey, ProtocolError> {
        if key_type != KeyType::Symmetric {
            return Err(ProtocolError::ComputedKeyRequiresSymmetric { key_type });
        }
        if !is_psha1(algorithm) {
            return Err(ProtocolError::UnsupportedComputedKeyAlgorithm(
                algorithm.to_string(),
            ));
        }
        if response.entropy.as_ref().is_some_and(Entropy::is_protected)
            || request.entropy.as_ref().is_some_and(Entropy::is_protected)
        {
            return Err(ProtocolError::ProtectedKeyEntropyUnsupported);
        }

        let issuer_entropy = response
            .entropy
            .as_ref()
            .and_then(Entropy::binary_secret)
            .ok_or(ProtocolError::MissingIssuerEntropy)?;
        let requester_entropy = request
            .requester_entropy()
            .ok_or(ProtocolError::MissingRequesterEntropy)?;

        let key_size_bits = response
            .key_size_bits
            .filter(|bits| *bits > 0)
            .or(Some(request.key_size_bits).filter(|bits| *bits > 0))
            .or(self.default_key_size_bits)
            .ok_or(ProtocolError::NoKeySizeProvided)?;

        psha1::compute_combined_key(
            requester_entropy.expose(),
            issuer_entropy.expose(),
            key_size_bits,
        )
        .map(ProofKey::Bytes)
    }
}

/// The key type the exchange actually settled on.
///
/// The issuer's choice wins; otherwise the requested one stands.
///
/// # Errors
///
/// Returns [`ProtocolError::UnsupportedKeyType`] if the issuer names an unknown key type.
pub fn effective_key_type(
    request: &TrustRequest,
    response: &TrustResponse,
) -> Result<KeyType, ProtocolError> {
    match response.key_type.as_deref() {
        Some(uri) => {
            KeyType::from_uri(uri).ok_or_else(|| ProtocolError::UnsupportedKeyType(uri.to_string()))
        }
        None => Ok(request.key_type),
    }
}
