//! Trust request/response model
//!
//! Plain data for the WS-Trust exchange: what the requester asks for
//! ([`TrustRequest`]), what the issuer answers ([`TrustResponse`]), and what
//! the caller finally gets ([`IssuedToken`]). Responses are modelled as
//! parsed, not as validated: a [`TrustResponse`] may carry combinations the
//! protocol forbids, and [`crate::proof`] is where those are rejected.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use subtle::ConstantTimeEq;
use url::Url;
use zeroize::Zeroize;

use crate::clock::saturating_add;
use crate::constants::{feb2005, trust13};
use crate::error::{ConfigError, NegotiationError};

/// Proof-of-possession key type requested for the issued token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyType {
    /// No proof key; possession of the token is sufficient.
    Bearer,
    /// A shared symmetric proof key.
    Symmetric,
    /// The requester's public key is bound into the token.
    Asymmetric,
}

impl KeyType {
    /// Returns the key-type URI for `version`.
    #[must_use]
    pub fn uri(self, version: TrustVersion) -> &'static str {
        match (version, self) {
            (TrustVersion::Feb2005, Self::Bearer) => feb2005::NO_PROOF_KEY,
            (TrustVersion::Feb2005, Self::Symmetric) => feb2005::SYMMETRIC_KEY,
            (TrustVersion::Feb2005, Self::Asymmetric) => feb2005::PUBLIC_KEY,
            (TrustVersion::WsTrust13 | TrustVersion::WsTrust14, Self::Bearer) => trust13::BEARER,
            (TrustVersion::WsTrust13 | TrustVersion::WsTrust14, Self::Symmetric) => {
                trust13::SYMMETRIC_KEY
            }
            (TrustVersion::WsTrust13 | TrustVersion::WsTrust14, Self::Asymmetric) => {
                trust13::PUBLIC_KEY
            }
        }
    }

    /// Parses a key-type URI of any supported trust version.
    ///
    /// Issuers are not always consistent about which version's URI they
    /// echo back, so all spellings are accepted regardless of the version
    /// that was requested.
    #[must_use]
    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri {
            feb2005::NO_PROOF_KEY | trust13::BEARER => Some(Self::Bearer),
            feb2005::SYMMETRIC_KEY | trust13::SYMMETRIC_KEY => Some(Self::Symmetric),
            feb2005::PUBLIC_KEY | trust13::PUBLIC_KEY => Some(Self::Asymmetric),
            _ => None,
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bearer => write!(f, "bearer"),
            Self::Symmetric => write!(f, "symmetric"),
            Self::Asymmetric => write!(f, "asymmetric"),
        }
    }
}

impl FromStr for KeyType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bearer" => Ok(Self::Bearer),
            "symmetric" | "symmetrickey" => Ok(Self::Symmetric),
            "asymmetric" | "publickey" => Ok(Self::Asymmetric),
            _ => Self::from_uri(s).ok_or_else(|| ConfigError::UnsupportedKeyType(s.to_string())),
        }
    }
}

/// Whether the requester contributes key material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntropyMode {
    /// Neither side is asked for entropy.
    None,
    /// The requester's entropy becomes the key.
    RequesterEntropy,
    /// The issuer generates the key.
    IssuerEntropy,
    /// Both sides contribute; the key is computed with P_SHA1.
    #[default]
    CombinedEntropy,
}

impl EntropyMode {
    /// Returns `true` if the requester must send entropy.
    #[must_use]
    pub fn requester_supplies(self) -> bool {
        matches!(self, Self::RequesterEntropy | Self::CombinedEntropy)
    }
}

impl FromStr for EntropyMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "none" => Ok(Self::None),
            "requesterentropy" | "requester" => Ok(Self::RequesterEntropy),
            "issuerentropy" | "issuer" => Ok(Self::IssuerEntropy),
            "combinedentropy" | "combined" => Ok(Self::CombinedEntropy),
            _ => Err(ConfigError::UnsupportedEntropyMode(s.to_string())),
        }
    }
}

/// The WS-Trust operation carried by a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestType {
    /// Issue a new token.
    #[default]
    Issue,
    /// Cancel a previously issued token.
    Cancel,
    /// Renew a previously issued token.
    Renew,
    /// Validate a token.
    Validate,
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Issue => write!(f, "Issue"),
            Self::Cancel => write!(f, "Cancel"),
            Self::Renew => write!(f, "Renew"),
            Self::Validate => write!(f, "Validate"),
        }
    }
}

/// WS-Trust protocol version spoken with the issuer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TrustVersion {
    /// The February 2005 pre-standard version.
    #[serde(rename = "feb2005")]
    Feb2005,
    /// OASIS WS-Trust 1.3.
    #[default]
    #[serde(rename = "1.3")]
    WsTrust13,
    /// OASIS WS-Trust 1.4.
    #[serde(rename = "1.4")]
    WsTrust14,
}

impl TrustVersion {
    /// WS-Addressing action for an outbound request of `request_type`.
    #[must_use]
    pub fn action(self, request_type: RequestType) -> &'static str {
        match (self, request_type) {
            (Self::Feb2005, RequestType::Issue) => feb2005::RST_ISSUE,
            (Self::Feb2005, RequestType::Cancel) => feb2005::RST_CANCEL,
            (Self::Feb2005, RequestType::Renew) => feb2005::RST_RENEW,
            (Self::Feb2005, RequestType::Validate) => feb2005::RST_VALIDATE,
            (Self::WsTrust13 | Self::WsTrust14, RequestType::Issue) => trust13::RST_ISSUE,
            (Self::WsTrust13 | Self::WsTrust14, RequestType::Cancel) => trust13::RST_CANCEL,
            (Self::WsTrust13 | Self::WsTrust14, RequestType::Renew) => trust13::RST_RENEW,
            (Self::WsTrust13 | Self::WsTrust14, RequestType::Validate) => trust13::RST_VALIDATE,
        }
    }

    /// WS-Addressing action the issuer is expected to reply with.
    #[must_use]
    pub fn response_action(self, request_type: RequestType) -> &'static str {
        match (self, request_type) {
            (Self::Feb2005, RequestType::Issue) => feb2005::RSTR_ISSUE,
            (Self::Feb2005, RequestType::Cancel) => feb2005::RSTR_CANCEL,
            (Self::Feb2005, RequestType::Renew) => feb2005::RSTR_RENEW,
            (Self::Feb2005, RequestType::Validate) => feb2005::RSTR_VALIDATE,
            (Self::WsTrust13 | Self::WsTrust14, RequestType::Issue) => trust13::RSTRC_ISSUE_FINAL,
            (Self::WsTrust13 | Self::WsTrust14, RequestType::Cancel) => trust13::RSTR_CANCEL_FINAL,
            (Self::WsTrust13 | Self::WsTrust14, RequestType::Renew) => trust13::RSTR_RENEW_FINAL,
            (Self::WsTrust13 | Self::WsTrust14, RequestType::Validate) => {
                trust13::RSTR_VALIDATE_FINAL
            }
        }
    }

    /// The P_SHA1 computed-key algorithm URI for this version.
    #[must_use]
    pub fn psha1_algorithm(self) -> &'static str {
        match self {
            Self::Feb2005 => feb2005::PSHA1,
            Self::WsTrust13 | Self::WsTrust14 => trust13::PSHA1,
        }
    }
}

impl fmt::Display for TrustVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Feb2005 => write!(f, "WS-Trust Feb2005"),
            Self::WsTrust13 => write!(f, "WS-Trust 1.3"),
            Self::WsTrust14 => write!(f, "WS-Trust 1.4"),
        }
    }
}

/// Short-lived secret key material.
///
/// Zeroized on drop, compared in constant time, and never printed.
#[derive(Clone, Default)]
pub struct SecretBytes(Vec<u8>);

impl SecretBytes {
    /// Wraps `bytes` as a secret.
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Exposes the secret bytes.
    #[must_use]
    pub fn expose(&self) -> &[u8] {
        &self.0
    }

    /// Length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if there is no key material.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Length in bits.
    #[must_use]
    pub fn bit_len(&self) -> usize {
        self.0.len() * 8
    }
}

impl From<Vec<u8>> for SecretBytes {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for SecretBytes {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl Zeroize for SecretBytes {
    fn zeroize(&mut self) {
        self.0.zeroize();
    }
}

impl Drop for SecretBytes {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl PartialEq for SecretBytes {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_slice().ct_eq(other.0.as_slice()).into()
    }
}

impl Eq for SecretBytes {}

impl fmt::Debug for SecretBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretBytes([REDACTED; {} bytes])", self.0.len())
    }
}

impl Serialize for SecretBytes {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for SecretBytes {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map(Self)
            .map_err(serde::de::Error::custom)
    }
}

/// Key material contributed by one side of the exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Entropy {
    /// Raw key bytes (`wst:BinarySecret`).
    BinarySecret(SecretBytes),
    /// Key bytes encrypted for the recipient (`xenc:EncryptedKey`).
    /// Never produced here, rejected when received.
    ProtectedKey(Bytes),
}

impl Entropy {
    /// Returns the binary secret, if this is one.
    #[must_use]
    pub fn binary_secret(&self) -> Option<&SecretBytes> {
        match self {
            Self::BinarySecret(secret) => Some(secret),
            Self::ProtectedKey(_) => None,
        }
    }

    /// Returns `true` for encrypted entropy.
    #[must_use]
    pub fn is_protected(&self) -> bool {
        matches!(self, Self::ProtectedKey(_))
    }
}

/// A `RequestSecurityToken` as handed to the serializer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustRequest {
    /// Correlation context echoed back by the issuer.
    pub context: String,
    /// The requested operation.
    pub request_type: RequestType,
    /// The relying party the token is for.
    pub applies_to: Url,
    /// Requested token type URI.
    pub token_type: Option<String>,
    /// Requested proof-key type.
    pub key_type: KeyType,
    /// Requested key size in bits; `0` for bearer tokens.
    pub key_size_bits: u32,
    /// Requester entropy, only for non-bearer keys when the entropy mode asks for it.
    pub entropy: Option<Entropy>,
    /// Computed-key algorithm, only when entropy is present.
    pub computed_key_algorithm: Option<String>,
    /// Protocol version.
    pub trust_version: TrustVersion,
}

impl TrustRequest {
    /// The WS-Addressing action this request is sent with.
    #[must_use]
    pub fn action(&self) -> &'static str {
        self.trust_version.action(self.request_type)
    }

    /// The requester's binary-secret entropy, if any.
    #[must_use]
    pub fn requester_entropy(&self) -> Option<&SecretBytes> {
        self.entropy.as_ref().and_then(Entropy::binary_secret)
    }
}

/// One child of a `RequestedProofToken` element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProofTokenField {
    /// The issuer sent the proof key directly.
    BinarySecret(SecretBytes),
    /// The proof key is to be computed with the named algorithm.
    ComputedKeyAlgorithm(String),
    /// The proof key is encrypted for the requester.
    EncryptedKey(Bytes),
}

/// Token validity window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Lifetime {
    /// `wsu:Created`
    pub created: Option<DateTime<Utc>>,
    /// `wsu:Expires`
    pub expires: Option<DateTime<Utc>>,
}

impl Lifetime {
    /// A lifetime with both bounds set.
    #[must_use]
    pub fn new(created: DateTime<Utc>, expires: DateTime<Utc>) -> Self {
        Self {
            created: Some(created),
            expires: Some(expires),
        }
    }
}

/// A parsed `RequestSecurityTokenResponse`.
///
/// `requested_proof_token` holds every child the serializer found, so a
/// response that illegally combines them is still representable.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TrustResponse {
    /// Echoed request context.
    #[serde(default)]
    pub context: Option<String>,
    /// Issued token type URI.
    #[serde(default)]
    pub token_type: Option<String>,
    /// Key-type URI chosen by the issuer.
    #[serde(default)]
    pub key_type: Option<String>,
    /// Key size chosen by the issuer.
    #[serde(default)]
    pub key_size_bits: Option<u32>,
    /// Children of `RequestedProofToken`.
    #[serde(default)]
    pub requested_proof_token: Vec<ProofTokenField>,
    /// Issuer entropy.
    #[serde(default)]
    pub entropy: Option<Entropy>,
    /// Token lifetime.
    #[serde(default)]
    pub lifetime: Option<Lifetime>,
    /// The issued token itself.
    #[serde(default)]
    pub requested_security_token: Option<Bytes>,
    /// Key identifier for references from inside the message.
    #[serde(default)]
    pub attached_reference: Option<Bytes>,
    /// Key identifier for references from outside the message.
    #[serde(default)]
    pub unattached_reference: Option<Bytes>,
}

impl TrustResponse {
    /// Returns `true` if any proof-token child is present.
    #[must_use]
    pub fn has_proof_token(&self) -> bool {
        !self.requested_proof_token.is_empty()
    }

    /// Returns `true` if any proof-token child is an encrypted key.
    #[must_use]
    pub fn has_encrypted_key(&self) -> bool {
        self.requested_proof_token
            .iter()
            .any(|field| matches!(field, ProofTokenField::EncryptedKey(_)))
    }

    /// All binary-secret proof tokens.
    pub fn binary_secrets(&self) -> impl Iterator<Item = &SecretBytes> {
        self.requested_proof_token.iter().filter_map(|field| match field {
            ProofTokenField::BinarySecret(secret) => Some(secret),
            _ => None,
        })
    }

    /// All computed-key algorithm URIs.
    pub fn computed_key_algorithms(&self) -> impl Iterator<Item = &str> {
        self.requested_proof_token.iter().filter_map(|field| match field {
            ProofTokenField::ComputedKeyAlgorithm(alg) => Some(alg.as_str()),
            _ => None,
        })
    }

    /// The lifetime's expiry, if present.
    #[must_use]
    pub fn expires(&self) -> Option<DateTime<Utc>> {
        self.lifetime.and_then(|lifetime| lifetime.expires)
    }
}

/// The proof-of-possession key for an issued token.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ProofKey {
    /// Bearer token, or neither side supplied key material.
    #[default]
    None,
    /// Symmetric key bytes.
    Bytes(SecretBytes),
}

impl ProofKey {
    /// Returns `true` if there is no key.
    #[must_use]
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// The key bytes, if any.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::None => None,
            Self::Bytes(secret) => Some(secret.expose()),
        }
    }

    /// Key length in bits (`0` when there is no key).
    #[must_use]
    pub fn bit_len(&self) -> usize {
        match self {
            Self::None => 0,
            Self::Bytes(secret) => secret.bit_len(),
        }
    }
}

/// An issued token ready to be attached to relying-party messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    /// Issued token type URI, if the issuer named one.
    pub token_type: Option<String>,
    /// The opaque token payload.
    pub payload: Bytes,
    /// The proof key.
    pub proof_key: ProofKey,
    /// Start of validity.
    pub created: DateTime<Utc>,
    /// End of validity.
    pub expires: DateTime<Utc>,
    /// Reference used from inside the message (attached reference).
    pub internal_key_ref: Option<Bytes>,
    /// Reference used from outside the message (unattached reference).
    pub external_key_ref: Option<Bytes>,
}

impl IssuedToken {
    /// Builds the caller's view of an accepted response.
    ///
    /// `negotiated_at` stands in for a missing `Created`; a missing
    /// `Expires` becomes `created + default_lifetime`.
    pub fn from_response(
        response: &TrustResponse,
        proof_key: ProofKey,
        negotiated_at: DateTime<Utc>,
        default_lifetime: Duration,
    ) -> Result<Self, NegotiationError> {
        let payload = response
            .requested_security_token
            .clone()
            .filter(|token| !token.is_empty())
            .ok_or(NegotiationError::TokenUnavailable)?;

        let lifetime = response.lifetime.unwrap_or_default();
        let created = lifetime.created.unwrap_or(negotiated_at);
        let expires = lifetime
            .expires
            .unwrap_or_else(|| saturating_add(created, default_lifetime));

        Ok(Self {
            token_type: response.token_type.clone(),
            payload,
            proof_key,
            created,
            expires,
            internal_key_ref: response.attached_reference.clone(),
            external_key_ref: response.unattached_reference.clone(),
        })
    }

    /// Returns `true` if the token has expired at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires
    }
}
