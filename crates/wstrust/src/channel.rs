//! Trust negotiation over a request channel
//!
//! [`TrustNegotiationChannel`] wraps an opaque [`RequestChannel`] and turns
//! one request/reply exchange into either a [`TrustResponse`] or, for
//! `Issue`, a fully validated [`IssuedToken`]. Every exchange is tracked by a
//! [`NegotiationAttempt`]:
//!
//! ```text
//! Idle -> RequestBuilt -> Sent -> ResponseReceived -> Validated -> TokenIssued
//!   \_________\______________\__________\________________\______-> Faulted
//! ```
//!
//! `Faulted` is terminal. Nothing is retried here; callers start a new attempt.
//!
//! The transport lifecycle (`open`/`close`/`abort`/`state`) belongs to the
//! wrapped channel and is only forwarded.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{info, trace, warn};
use wstrust_transport_traits::{
    ChannelState, LimitsConfig, RequestChannel, TransportMessage, validate_request_size,
    validate_response_size,
};

use crate::cache::ResponseCache;
use crate::clock::Clock;
use crate::config::DEFAULT_TOKEN_LIFETIME;
use crate::error::{NegotiationError, NegotiationResult, SerializationError};
use crate::metrics::AtomicMetrics;
use crate::model::{IssuedToken, TrustRequest, TrustResponse};
use crate::proof::ProofKeyDeriver;
use crate::serializer::TrustSerializer;

/// Progress of a single negotiation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NegotiationState {
    /// Nothing has happened yet
    Idle,
    /// The outbound message has been serialized
    RequestBuilt,
    /// The message has been handed to the transport
    Sent,
    /// A reply arrived
    ResponseReceived,
    /// The reply passed proof-key validation
    Validated,
    /// An issued token was produced
    TokenIssued,
    /// The attempt failed
    Faulted,
}

impl NegotiationState {
    /// Returns `true` if no further transition is possible.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::TokenIssued | Self::Faulted)
    }

    /// Returns `true` if `self -> next` is a legal transition.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        match (self, next) {
            (from, Self::Faulted) => !from.is_terminal(),
            (Self::Idle, Self::RequestBuilt)
            | (Self::RequestBuilt, Self::Sent)
            | (Self::Sent, Self::ResponseReceived)
            | (Self::ResponseReceived, Self::Validated)
            | (Self::Validated, Self::TokenIssued) => true,
            _ => false,
        }
    }
}

impl fmt::Display for NegotiationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::RequestBuilt => "request_built",
            Self::Sent => "sent",
            Self::ResponseReceived => "response_received",
            Self::Validated => "validated",
            Self::TokenIssued => "token_issued",
            Self::Faulted => "faulted",
        };
        f.write_str(name)
    }
}

/// State tracker for one exchange.
#[derive(Debug)]
pub struct NegotiationAttempt {
    context: String,
    state: NegotiationState,
}

impl NegotiationAttempt {
    /// Starts an attempt for the request with `context`.
    pub fn new(context: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            state: NegotiationState::Idle,
        }
    }

    /// Current state.
    pub fn state(&self) -> NegotiationState {
        self.state
    }

    /// Moves to `next`. Illegal transitions leave the state unchanged.
    pub fn advance(&mut self, next: NegotiationState) {
        if self.state.can_transition_to(next) {
            trace!(context = %self.context, from = %self.state, to = %next, "Negotiation state");
            self.state = next;
        } else {
            trace!(
                context = %self.context,
                from = %self.state,
                to = %next,
                "Ignoring illegal negotiation transition"
            );
        }
    }

    /// Marks the attempt as failed with `error`.
    pub fn fail(&mut self, error: &NegotiationError) {
        if !self.state.is_terminal() {
            trace!(
                context = %self.context,
                from = %self.state,
                error = %error,
                "Negotiation faulted"
            );
            self.state = NegotiationState::Faulted;
        }
    }
}

/// A request channel that speaks WS-Trust.
#[derive(Debug)]
pub struct TrustNegotiationChannel {
    inner: Arc<dyn RequestChannel>,
    serializer: Arc<dyn TrustSerializer>,
    deriver: ProofKeyDeriver,
    cache: Arc<ResponseCache>,
    clock: Arc<dyn Clock>,
    metrics: Arc<AtomicMetrics>,
    limits: LimitsConfig,
    default_token_lifetime: Duration,
}

impl TrustNegotiationChannel {
    /// Wraps `inner`, storing accepted `Issue` responses in `cache`.
    pub fn new(
        inner: Arc<dyn RequestChannel>,
        serializer: Arc<dyn TrustSerializer>,
        cache: Arc<ResponseCache>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inner,
            serializer,
            deriver: ProofKeyDeriver::new(),
            cache,
            clock,
            metrics: Arc::new(AtomicMetrics::new()),
            limits: LimitsConfig::default(),
            default_token_lifetime: DEFAULT_TOKEN_LIFETIME,
        }
    }

    /// Sets the proof-key deriver.
    #[must_use]
    pub fn with_deriver(mut self, deriver: ProofKeyDeriver) -> Self {
        self.deriver = deriver;
        self
    }

    /// Sets the message size limits.
    #[must_use]
    pub fn with_limits(mut self, limits: LimitsConfig) -> Self {
        self.limits = limits;
        self
    }

    /// Sets the lifetime assumed for tokens without `Expires`.
    #[must_use]
    pub fn with_default_token_lifetime(mut self, lifetime: Duration) -> Self {
        self.default_token_lifetime = lifetime;
        self
    }

    /// Shares a metrics sink.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<AtomicMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// The wrapped transport channel.
    pub fn inner(&self) -> &Arc<dyn RequestChannel> {
        &self.inner
    }

    /// Forwards the transport state.
    pub fn state(&self) -> ChannelState {
        self.inner.state()
    }

    /// Forwards `open` to the transport.
    pub async fn open(&self, timeout: Duration) -> NegotiationResult<()> {
        self.inner.open(timeout).await.map_err(NegotiationError::from)
    }

    /// Forwards `close` to the transport.
    pub async fn close(&self, timeout: Duration) -> NegotiationResult<()> {
        self.inner.close(timeout).await.map_err(NegotiationError::from)
    }

    /// Forwards `abort` to the transport.
    pub fn abort(&self) {
        self.inner.abort();
    }

    /// Sends `request` and returns the issuer's parsed reply.
    ///
    /// Works for every request type; no proof key is derived and nothing is
    /// cached.
    ///
    /// # Errors
    ///
    /// Fails on serialization or size-limit problems, transport errors, a
    /// SOAP fault, or when `timeout` elapses before the reply arrives.
    pub async fn request(
        &self,
        request: &TrustRequest,
        timeout: Duration,
    ) -> NegotiationResult<TrustResponse> {
        let mut attempt = NegotiationAttempt::new(&request.context);
        let result = self.exchange(request, timeout, &mut attempt).await;
        if let Err(err) = &result {
            attempt.fail(err);
        }
        result
    }

    /// Runs a full `Issue` exchange and returns the issued token.
    ///
    /// On success the exchange is stored in the response cache. On failure
    /// the cache is left as it was.
    ///
    /// # Errors
    ///
    /// Everything [`request`](Self::request) can return, plus
    /// [`NegotiationError::Protocol`] when the response breaks the
    /// proof-token rules and [`NegotiationError::TokenUnavailable`] when it
    /// carries no token.
    pub async fn issue(
        &self,
        request: TrustRequest,
        timeout: Duration,
    ) -> NegotiationResult<IssuedToken> {
        let mut attempt = NegotiationAttempt::new(&request.context);
        match self.issue_inner(&request, timeout, &mut attempt).await {
            Ok((response, token, negotiated_at)) => {
                info!(
                    context = %request.context,
                    key_type = %request.key_type,
                    proof_key_bits = token.proof_key.bit_len(),
                    expires = %token.expires,
                    "Issued token negotiated"
                );
                self.cache.put_at(request, response, negotiated_at);
                Ok(token)
            }
            Err(err) => {
                attempt.fail(&err);
                Err(err)
            }
        }
    }

    async fn issue_inner(
        &self,
        request: &TrustRequest,
        timeout: Duration,
        attempt: &mut NegotiationAttempt,
    ) -> NegotiationResult<(TrustResponse, IssuedToken, DateTime<Utc>)> {
        let response = self.exchange(request, timeout, attempt).await?;
        // One reading feeds both the token and the cache entry
        let negotiated_at = self.clock.now();

        let proof_key = self.deriver.derive(request, &response).map_err(|err| {
            AtomicMetrics::incr(&self.metrics.protocol_errors);
            NegotiationError::Protocol(err)
        })?;
        attempt.advance(NegotiationState::Validated);

        let token = IssuedToken::from_response(
            &response,
            proof_key,
            negotiated_at,
            self.default_token_lifetime,
        )?;
        attempt.advance(NegotiationState::TokenIssued);

        Ok((response, token, negotiated_at))
    }

    async fn exchange(
        &self,
        request: &TrustRequest,
        timeout: Duration,
        attempt: &mut NegotiationAttempt,
    ) -> NegotiationResult<TrustResponse> {
        let message = self
            .serializer
            .serialize_request(request, request.action())?;
        message
            .metadata
            .validate()
            .map_err(SerializationError::new)?;
        validate_request_size(message.size(), &self.limits)?;
        attempt.advance(NegotiationState::RequestBuilt);

        let request_id = message.id.clone();
        AtomicMetrics::incr(&self.metrics.negotiations);
        let started = Instant::now();
        attempt.advance(NegotiationState::Sent);

        let reply = match tokio::time::timeout(timeout, self.inner.request(message, timeout)).await
        {
            Ok(reply) => reply.map_err(|err| {
                if err.is_timeout() {
                    AtomicMetrics::incr(&self.metrics.timeouts);
                }
                warn!(
                    context = %request.context,
                    error = %err,
                    transient = err.is_transient(),
                    "Transport failed during negotiation"
                );
                NegotiationError::from(err)
            })?,
            Err(_) => {
                AtomicMetrics::incr(&self.metrics.timeouts);
                warn!(context = %request.context, ?timeout, "Negotiation timed out");
                return Err(NegotiationError::Timeout(timeout));
            }
        };
        self.metrics
            .update_latency_us(u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX));

        validate_response_size(reply.size(), &self.limits)?;
        attempt.advance(NegotiationState::ResponseReceived);

        if self.serializer.is_fault(&reply) {
            let fault = self.serializer.deserialize_fault(&reply)?;
            AtomicMetrics::incr(&self.metrics.remote_faults);
            warn!(
                context = %request.context,
                code = %fault.code,
                reason = %fault.reason,
                "Issuer returned a fault"
            );
            return Err(NegotiationError::RemoteFault(fault));
        }

        check_addressing(request, &request_id, &reply);
        Ok(self
            .serializer
            .deserialize_response(&reply, request.trust_version)?)
    }
}

/// Logs, but tolerates, replies whose addressing headers look wrong.
fn check_addressing(request: &TrustRequest, request_id: &str, reply: &TransportMessage) {
    if let Some(relates_to) = reply.relates_to()
        && relates_to != request_id
    {
        warn!(
            context = %request.context,
            expected = request_id,
            actual = relates_to,
            "Reply RelatesTo does not match request"
        );
    }

    let expected = request.trust_version.response_action(request.request_type);
    if !reply.action.is_empty() && reply.action != expected {
        warn!(
            context = %request.context,
            expected,
            actual = %reply.action,
            "Unexpected reply action"
        );
    }
}
