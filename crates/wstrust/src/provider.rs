//! Issued-token provider
//!
//! [`IssuedTokenProvider`] is the entry point for callers that need a token:
//! one instance per issuer and relying party, answering `issue(timeout)`
//! from the cache while the last token is fresh and negotiating otherwise.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use wstrust::{IssuedTokenProvider, NegotiationParams};
//!
//! let params = NegotiationParams::new(
//!     "https://sts.example.com/trust/13".parse()?,
//!     "https://orders.example.com/".parse()?,
//! );
//! let provider = IssuedTokenProvider::builder(params, transport, serializer).build()?;
//!
//! let token = provider.issue(Duration::from_secs(30)).await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};
use wstrust_transport_traits::{ChannelFactory, ChannelState};

use crate::cache::{CachePolicy, ResponseCache};
use crate::clock::{Clock, SystemClock};
use crate::config::NegotiationParams;
use crate::error::{ConfigError, NegotiationError, NegotiationResult};
use crate::factory::TrustChannelFactory;
use crate::metrics::{AtomicMetrics, ProviderMetrics};
use crate::model::IssuedToken;
use crate::proof::ProofKeyDeriver;
use crate::request::TrustRequestBuilder;
use crate::serializer::TrustSerializer;

/// Builder for [`IssuedTokenProvider`].
#[derive(Debug)]
pub struct IssuedTokenProviderBuilder {
    params: NegotiationParams,
    transport: Arc<dyn ChannelFactory>,
    serializer: Arc<dyn TrustSerializer>,
    clock: Arc<dyn Clock>,
}

impl IssuedTokenProviderBuilder {
    /// Uses `clock` instead of the system clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Validates the parameters and builds the provider.
    ///
    /// No channel is created until the first negotiation.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the parameters are invalid.
    pub fn build(self) -> Result<IssuedTokenProvider, ConfigError> {
        let Self {
            params,
            transport,
            serializer,
            clock,
        } = self;

        let requests = TrustRequestBuilder::new(params)?;
        let params = requests.params();

        let cache = Arc::new(ResponseCache::new(
            CachePolicy::from(params),
            Arc::clone(&clock),
        ));
        let deriver = ProofKeyDeriver::new()
            .with_default_key_size(params.algorithm_suite.default_symmetric_key_length());
        let metrics = Arc::new(AtomicMetrics::new());

        let factory = TrustChannelFactory::new(
            transport,
            params.channel_config(),
            serializer,
            Arc::clone(&cache),
            clock,
        )
        .with_deriver(deriver)
        .with_metrics(Arc::clone(&metrics))
        .with_default_token_lifetime(params.default_token_lifetime);

        debug!(
            issuer = %params.issuer_address,
            applies_to = %params.applies_to,
            key_type = %params.key_type,
            trust_version = %params.trust_version,
            "Issued token provider ready"
        );

        Ok(IssuedTokenProvider {
            default_token_lifetime: params.default_token_lifetime,
            requests,
            factory,
            cache,
            deriver,
            metrics,
        })
    }
}

/// Hands out issued tokens for one issuer and relying party.
#[derive(Debug)]
pub struct IssuedTokenProvider {
    requests: TrustRequestBuilder,
    factory: TrustChannelFactory,
    cache: Arc<ResponseCache>,
    deriver: ProofKeyDeriver,
    metrics: Arc<AtomicMetrics>,
    default_token_lifetime: Duration,
}

impl IssuedTokenProvider {
    /// Starts building a provider that negotiates over `transport` using `serializer`.
    pub fn builder(
        params: NegotiationParams,
        transport: Arc<dyn ChannelFactory>,
        serializer: Arc<dyn TrustSerializer>,
    ) -> IssuedTokenProviderBuilder {
        IssuedTokenProviderBuilder {
            params,
            transport,
            serializer,
            clock: Arc::new(SystemClock),
        }
    }

    /// The parameters this provider negotiates with.
    pub fn params(&self) -> &NegotiationParams {
        self.requests.params()
    }

    /// Returns a token, negotiating a new one if the cached one is missing or stale.
    ///
    /// The whole call, including channel creation and opening, is bounded by
    /// `timeout`. Failures never touch the cache.
    ///
    /// # Errors
    ///
    /// Returns [`NegotiationError::Timeout`] when the budget runs out, and
    /// otherwise whatever the negotiation failed with.
    pub async fn issue(&self, timeout: Duration) -> NegotiationResult<IssuedToken> {
        if let Some(entry) = self.cache.get() {
            let proof_key = self.deriver.derive(entry.request(), entry.response())?;
            let token = IssuedToken::from_response(
                entry.response(),
                proof_key,
                entry.negotiated_at(),
                self.default_token_lifetime,
            )?;
            AtomicMetrics::incr(&self.metrics.cache_hits);
            AtomicMetrics::incr(&self.metrics.tokens_issued);
            return Ok(token);
        }
        AtomicMetrics::incr(&self.metrics.cache_misses);

        let deadline = Instant::now().checked_add(timeout);
        let remaining = || {
            deadline.map_or(timeout, |deadline| {
                deadline.saturating_duration_since(Instant::now())
            })
        };

        let request = self.requests.build();
        let budget = remaining();
        let channel = match tokio::time::timeout(budget, self.factory.ready_channel(budget)).await
        {
            Ok(channel) => channel?,
            Err(_) => {
                AtomicMetrics::incr(&self.metrics.timeouts);
                warn!(?timeout, "Timed out opening issuer channel");
                return Err(NegotiationError::Timeout(timeout));
            }
        };

        let token = channel
            .issue(request, remaining())
            .await
            .map_err(|err| match err {
                NegotiationError::Timeout(_) => NegotiationError::Timeout(timeout),
                other => other,
            })?;

        AtomicMetrics::incr(&self.metrics.tokens_issued);
        info!(
            issuer = %self.params().issuer_address,
            expires = %token.expires,
            "Issued token ready"
        );
        Ok(token)
    }

    /// Drops the cached token so the next `issue` negotiates afresh.
    pub fn invalidate_cache(&self) {
        self.cache.invalidate();
    }

    /// Forwards the transport state; `Created` until the channel exists.
    pub fn state(&self) -> ChannelState {
        self.factory.state()
    }

    /// Creates the channel if needed and opens it.
    ///
    /// # Errors
    ///
    /// Returns channel-creation and transport `open` failures.
    pub async fn open(&self, timeout: Duration) -> NegotiationResult<()> {
        self.factory.open(timeout).await
    }

    /// Closes the channel, if one was created.
    ///
    /// # Errors
    ///
    /// Returns transport `close` failures.
    pub async fn close(&self, timeout: Duration) -> NegotiationResult<()> {
        self.factory.close(timeout).await
    }

    /// Aborts the channel, if one was created.
    pub fn abort(&self) {
        self.factory.abort();
    }

    /// A snapshot of the provider's counters.
    pub fn metrics(&self) -> ProviderMetrics {
        self.metrics.snapshot()
    }
}
