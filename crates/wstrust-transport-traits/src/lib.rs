//! # WS-Trust Transport Traits
//!
//! The narrow transport boundary used by the `wstrust` negotiation engine.
//! The engine never talks to sockets or HTTP stacks directly; it hands a
//! serialized [`TransportMessage`] to a [`RequestChannel`] and awaits the
//! correlated reply.
//!
//! ## Overview
//!
//! This crate defines:
//! - **Traits**: [`RequestChannel`], [`ChannelFactory`]
//! - **Types**: [`ChannelState`], [`ChannelConfig`], [`TransportMessage`]
//! - **Errors**: [`TransportError`], [`TransportResult`]
//! - **Config**: [`LimitsConfig`], [`TimeoutConfig`]
//!
//! The open/close/abort lifecycle belongs to the channel implementation.
//! Callers only forward lifecycle requests and read back [`ChannelState`].
//!
//! ## Usage
//!
//! ```rust,ignore
//! use wstrust_transport_traits::{RequestChannel, TransportMessage, TransportResult};
//!
//! #[derive(Debug)]
//! struct HttpSoapChannel { /* ... */ }
//!
//! impl RequestChannel for HttpSoapChannel {
//!     fn request(&self, message: TransportMessage, timeout: Duration)
//!         -> Pin<Box<dyn Future<Output = TransportResult<TransportMessage>> + Send + '_>> {
//!         /* ... */
//!     }
//!     // ... lifecycle methods
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

mod config;
mod error;
mod message;
mod traits;
mod types;

// Re-export all public items
pub use config::{LimitsConfig, TimeoutConfig};
pub use error::{TransportError, TransportResult};
pub use message::{HEADER_LIMIT, TransportMessage, TransportMessageMetadata};
pub use traits::{ChannelFactory, RequestChannel};
pub use types::{ChannelConfig, ChannelState};

// Re-export validation functions
pub use error::{validate_request_size, validate_response_size};
