//! Core channel traits.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use crate::error::TransportResult;
use crate::message::TransportMessage;
use crate::types::{ChannelConfig, ChannelState};

/// A request/response channel to a single remote endpoint.
///
/// Implementations own their lifecycle state machine. The negotiation engine
/// calls [`request`](Self::request) and forwards `open`/`close`/`abort`
/// without interpreting the resulting states.
///
/// `request` futures must be cancel-safe: dropping one (for example when an
/// outer timeout fires) must release any socket or pending wait it holds.
pub trait RequestChannel: Send + Sync + std::fmt::Debug {
    /// Returns the current lifecycle state.
    fn state(&self) -> ChannelState;

    /// Opens the channel.
    fn open(
        &self,
        timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>>;

    /// Gracefully closes the channel.
    fn close(
        &self,
        timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>>;

    /// Tears the channel down immediately, failing any pending request.
    fn abort(&self);

    /// Sends `message` and waits up to `timeout` for the correlated reply.
    fn request(
        &self,
        message: TransportMessage,
        timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = TransportResult<TransportMessage>> + Send + '_>>;

    /// Returns the remote endpoint address, if applicable.
    fn endpoint(&self) -> Option<String> {
        None
    }
}

/// Creates [`RequestChannel`]s to issuer endpoints.
pub trait ChannelFactory: Send + Sync + std::fmt::Debug {
    /// Creates a new channel with the given configuration.
    ///
    /// The returned channel is in [`ChannelState::Created`] or already
    /// opened, at the implementation's discretion.
    fn create_channel(&self, config: &ChannelConfig) -> TransportResult<Arc<dyn RequestChannel>>;

    /// Returns `true` if this factory can create channels on the current system.
    fn is_available(&self) -> bool {
        true
    }
}
