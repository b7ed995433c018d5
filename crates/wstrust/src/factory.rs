//! Lazy channel construction.
//!
//! A [`TrustChannelFactory`] creates its transport channel the first time it
//! is needed and hands out the same [`TrustNegotiationChannel`] afterwards.
//! Creation errors surface on that first use, not when the factory is built.
//!
//! Opening is serialized too: concurrent first users wait behind one gate, so
//! a channel still in `Created` is opened exactly once.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, warn};
use wstrust_transport_traits::{ChannelConfig, ChannelFactory, ChannelState, TransportError};

use crate::cache::ResponseCache;
use crate::channel::TrustNegotiationChannel;
use crate::clock::Clock;
use crate::config::DEFAULT_TOKEN_LIFETIME;
use crate::error::{NegotiationError, NegotiationResult};
use crate::metrics::AtomicMetrics;
use crate::proof::ProofKeyDeriver;
use crate::serializer::TrustSerializer;

/// Creates, at most once, the negotiation channel to one issuer.
#[derive(Debug)]
pub struct TrustChannelFactory {
    transport: Arc<dyn ChannelFactory>,
    config: ChannelConfig,
    serializer: Arc<dyn TrustSerializer>,
    cache: Arc<ResponseCache>,
    clock: Arc<dyn Clock>,
    deriver: ProofKeyDeriver,
    metrics: Arc<AtomicMetrics>,
    default_token_lifetime: Duration,
    channel: OnceCell<Arc<TrustNegotiationChannel>>,
    open_gate: Mutex<()>,
}

impl TrustChannelFactory {
    /// Creates a factory; no channel is created yet.
    pub fn new(
        transport: Arc<dyn ChannelFactory>,
        config: ChannelConfig,
        serializer: Arc<dyn TrustSerializer>,
        cache: Arc<ResponseCache>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            transport,
            config,
            serializer,
            cache,
            clock,
            deriver: ProofKeyDeriver::new(),
            metrics: Arc::new(AtomicMetrics::new()),
            default_token_lifetime: DEFAULT_TOKEN_LIFETIME,
            channel: OnceCell::new(),
            open_gate: Mutex::new(()),
        }
    }

    /// Sets the proof-key deriver used by the channel.
    #[must_use]
    pub fn with_deriver(mut self, deriver: ProofKeyDeriver) -> Self {
        self.deriver = deriver;
        self
    }

    /// Shares a metrics sink with the channel.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<AtomicMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Sets the lifetime assumed for tokens without `Expires`.
    #[must_use]
    pub fn with_default_token_lifetime(mut self, lifetime: Duration) -> Self {
        self.default_token_lifetime = lifetime;
        self
    }

    /// The transport configuration channels are created with.
    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Returns the channel, creating it on first call.
    ///
    /// Concurrent first calls wait for a single creation. A failed creation
    /// is not remembered; the next call tries again.
    ///
    /// # Errors
    ///
    /// Returns [`NegotiationError::Transport`] if the transport is unavailable
    /// or cannot create a channel.
    pub async fn channel(&self) -> NegotiationResult<Arc<TrustNegotiationChannel>> {
        self.channel
            .get_or_try_init(|| async {
                if !self.transport.is_available() {
                    warn!(endpoint = %self.config.endpoint, "Issuer transport unavailable");
                    return Err(NegotiationError::from(TransportError::ConfigurationError(
                        format!("no transport available for {}", self.config.endpoint),
                    )));
                }
                debug!(endpoint = %self.config.endpoint, "Creating issuer channel");
                let inner = self.transport.create_channel(&self.config).map_err(|err| {
                    warn!(
                        endpoint = %self.config.endpoint,
                        error = %err,
                        "Failed to create issuer channel"
                    );
                    NegotiationError::from(err)
                })?;
                Ok::<_, NegotiationError>(Arc::new(
                    TrustNegotiationChannel::new(
                        inner,
                        Arc::clone(&self.serializer),
                        Arc::clone(&self.cache),
                        Arc::clone(&self.clock),
                    )
                    .with_deriver(self.deriver)
                    .with_limits(self.config.limits.clone())
                    .with_default_token_lifetime(self.default_token_lifetime)
                    .with_metrics(Arc::clone(&self.metrics)),
                ))
            })
            .await
            .map(Arc::clone)
    }

    /// Returns the channel, creating it and opening it while it is still `Created`.
    ///
    /// The state is re-read behind the open gate, so callers queued behind
    /// an open in progress find the channel opened and skip straight on.
    ///
    /// # Errors
    ///
    /// Returns channel-creation and transport `open` failures.
    pub async fn ready_channel(
        &self,
        timeout: Duration,
    ) -> NegotiationResult<Arc<TrustNegotiationChannel>> {
        let channel = self.channel().await?;
        let _gate = self.open_gate.lock().await;
        if channel.state() == ChannelState::Created {
            debug!(endpoint = %self.config.endpoint, "Opening issuer channel");
            channel.open(timeout).await?;
        }
        Ok(channel)
    }

    /// The channel, if it has been created.
    pub fn existing_channel(&self) -> Option<&Arc<TrustNegotiationChannel>> {
        self.channel.get()
    }

    /// Forwards the transport state; `Created` until the channel exists.
    pub fn state(&self) -> ChannelState {
        self.channel
            .get()
            .map_or(ChannelState::Created, |channel| channel.state())
    }

    /// Creates the channel if needed and opens it.
    ///
    /// # Errors
    ///
    /// Returns channel-creation and transport `open` failures.
    pub async fn open(&self, timeout: Duration) -> NegotiationResult<()> {
        let channel = self.channel().await?;
        let _gate = self.open_gate.lock().await;
        channel.open(timeout).await
    }

    /// Closes the channel. Does nothing if it was never created.
    ///
    /// # Errors
    ///
    /// Returns transport `close` failures.
    pub async fn close(&self, timeout: Duration) -> NegotiationResult<()> {
        match self.channel.get() {
            Some(channel) => channel.close(timeout).await,
            None => Ok(()),
        }
    }

    /// Aborts the channel. Does nothing if it was never created.
    pub fn abort(&self) {
        if let Some(channel) = self.channel.get() {
            channel.abort();
        }
    }
}
