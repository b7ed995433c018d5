//! # WS-Trust Issued-Token Negotiation
//!
//! Client-side engine for obtaining issued security tokens from a WS-Trust
//! Security Token Service (STS).
//!
//! Given a set of [`NegotiationParams`], an [`IssuedTokenProvider`] builds a
//! `RequestSecurityToken`, sends it over an opaque request channel, validates
//! the issuer's reply against the WS-Trust proof-key rules, derives the
//! proof-of-possession key, and caches the result until a configurable share
//! of the token's lifetime has passed.
//!
//! ## Features
//!
//! - **Proof keys**: bearer, issuer-supplied, requester-supplied and P_SHA1
//!   computed keys; every protocol-violating combination is rejected with a
//!   typed [`ProtocolError`]
//! - **Versions**: WS-Trust February 2005, 1.3 and 1.4
//! - **Caching**: single-slot, renewal-threshold aware, never caches a
//!   response without an expiry and never poisons on failure
//! - **Secret hygiene**: entropy and key bytes are zeroized on drop and
//!   compared in constant time
//! - **Timeouts**: one caller-supplied budget bounds channel creation,
//!   opening and the exchange itself
//!
//! ## Collaborators
//!
//! The XML wire format and the transport are supplied by the caller:
//! - [`TrustSerializer`] turns requests into messages and replies back into
//!   [`TrustResponse`]s
//! - [`wstrust_transport_traits::ChannelFactory`] creates the request channel
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use wstrust::{IssuedTokenProvider, KeyType, NegotiationParams};
//!
//! let params = NegotiationParams::new(
//!     "https://sts.example.com/trust/13/issuedtokensymmetricbasic256".parse()?,
//!     "https://orders.example.com/".parse()?,
//! )
//! .with_key_type(KeyType::Symmetric);
//!
//! let provider = IssuedTokenProvider::builder(params, Arc::new(transport), Arc::new(serializer))
//!     .build()?;
//!
//! let token = provider.issue(Duration::from_secs(30)).await?;
//! if let Some(key) = token.proof_key.as_bytes() {
//!     // sign the relying-party message with `key`
//! }
//! ```

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all
)]
#![deny(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::must_use_candidate
)]

pub mod cache;
pub mod channel;
pub mod clock;
pub mod config;
pub mod constants;
pub mod error;
pub mod factory;
pub mod metrics;
pub mod model;
pub mod proof;
pub mod provider;
pub mod psha1;
pub mod request;
pub mod serializer;

#[doc(inline)]
pub use cache::{CacheEntry, CachePolicy, ResponseCache};
#[doc(inline)]
pub use channel::{NegotiationAttempt, NegotiationState, TrustNegotiationChannel};
#[doc(inline)]
pub use clock::{Clock, SystemClock};
#[doc(inline)]
pub use config::{NegotiationParams, SecurityAlgorithmSuite};
#[doc(inline)]
pub use error::{
    ConfigError, FaultDetail, NegotiationError, NegotiationResult, ProtocolError,
    SerializationError,
};
#[doc(inline)]
pub use factory::TrustChannelFactory;
#[doc(inline)]
pub use metrics::ProviderMetrics;
#[doc(inline)]
pub use model::{
    Entropy, EntropyMode, IssuedToken, KeyType, Lifetime, ProofKey, ProofTokenField, RequestType,
    SecretBytes, TrustRequest, TrustResponse, TrustVersion,
};
#[doc(inline)]
pub use proof::ProofKeyDeriver;
#[doc(inline)]
pub use provider::{IssuedTokenProvider, IssuedTokenProviderBuilder};
#[doc(inline)]
pub use request::TrustRequestBuilder;
#[doc(inline)]
pub use serializer::TrustSerializer;
