//! Common test utilities for integration tests
//!
//! Provides a scripted in-memory issuer channel, a JSON stand-in for the
//! SOAP serializer, and a manually driven clock.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use parking_lot::Mutex;
use url::Url;
use wstrust::{
    Clock, Entropy, FaultDetail, Lifetime, NegotiationParams, ProofTokenField, SecretBytes,
    SerializationError, TrustRequest, TrustResponse, TrustSerializer, TrustVersion,
};
use wstrust_transport_traits::{
    ChannelConfig, ChannelFactory, ChannelState, RequestChannel, TransportError,
    TransportMessage, TransportMessageMetadata, TransportResult,
};

pub const ISSUER: &str = "https://sts.example.com/trust/13/issuedtokenmixedsymmetricbasic256";
pub const RELYING_PARTY: &str = "https://orders.example.com/";

/// Install a test subscriber so `RUST_LOG=wstrust=trace` shows engine logs.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Fixed reference instant.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 1, 9, 0, 0).unwrap()
}

/// Default parameters against the test issuer.
pub fn params() -> NegotiationParams {
    NegotiationParams::new(Url::parse(ISSUER).unwrap(), Url::parse(RELYING_PARTY).unwrap())
}

/// A response carrying only a token and a lifetime.
pub fn token_response(created: DateTime<Utc>, valid_for: TimeDelta) -> TrustResponse {
    TrustResponse {
        token_type: Some("urn:oasis:names:tc:SAML:2.0:assertion".to_string()),
        requested_security_token: Some(Bytes::from_static(b"<saml:Assertion ID=\"_1\"/>")),
        attached_reference: Some(Bytes::from_static(b"<o:SecurityTokenReference/>")),
        lifetime: Some(Lifetime::new(created, created + valid_for)),
        ..Default::default()
    }
}

/// A computed-key response contributing `issuer_entropy`.
pub fn computed_key_response(
    created: DateTime<Utc>,
    valid_for: TimeDelta,
    issuer_entropy: &[u8],
) -> TrustResponse {
    TrustResponse {
        key_size_bits: Some(256),
        requested_proof_token: vec![ProofTokenField::ComputedKeyAlgorithm(
            TrustVersion::WsTrust13.psha1_algorithm().to_string(),
        )],
        entropy: Some(Entropy::BinarySecret(SecretBytes::from(issuer_entropy))),
        ..token_response(created, valid_for)
    }
}

/// Decode a request the mock channel recorded.
pub fn decode_request(message: &TransportMessage) -> TrustRequest {
    serde_json::from_slice(&message.payload).unwrap()
}

/// A scripted reply from the mock issuer.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Answer with this response
    Response(TrustResponse),
    /// Answer with a SOAP fault
    Fault(FaultDetail),
    /// Fail at the transport level
    Error(TransportError),
    /// Never answer
    Hang,
}

/// In-memory issuer channel replaying scripted replies.
///
/// Enforces its lifecycle like a real transport: `open` only from `Created`
/// (passing through `Opening` for the configured open delay), and `request`
/// only while `Opened`.
#[derive(Debug)]
pub struct MockChannel {
    state: Mutex<ChannelState>,
    open_delay: Mutex<Duration>,
    script: Mutex<VecDeque<Reply>>,
    fallback: Mutex<Option<Reply>>,
    delay: Mutex<Duration>,
    requests: Mutex<Vec<TransportMessage>>,
    open_calls: AtomicUsize,
    aborted: AtomicBool,
    next_id: AtomicU64,
}

impl Default for MockChannel {
    fn default() -> Self {
        Self {
            state: Mutex::new(ChannelState::Created),
            open_delay: Mutex::new(Duration::ZERO),
            script: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(None),
            delay: Mutex::new(Duration::ZERO),
            requests: Mutex::new(Vec::new()),
            open_calls: AtomicUsize::new(0),
            aborted: AtomicBool::new(false),
            next_id: AtomicU64::new(1),
        }
    }
}

impl MockChannel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue a one-shot reply.
    pub fn push(&self, reply: Reply) {
        self.script.lock().push_back(reply);
    }

    /// Reply with this whenever the script is empty.
    pub fn always(&self, reply: Reply) {
        *self.fallback.lock() = Some(reply);
    }

    /// Delay every reply.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }

    /// Stay in `Opening` this long before reaching `Opened`.
    pub fn set_open_delay(&self, delay: Duration) {
        *self.open_delay.lock() = delay;
    }

    pub fn requests(&self) -> Vec<TransportMessage> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn open_calls(&self) -> usize {
        self.open_calls.load(Ordering::SeqCst)
    }

    pub fn was_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    fn reply_message(&self, request_id: &str, body: Vec<u8>, fault: bool) -> TransportMessage {
        let id = format!("urn:mock-issuer:{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let metadata = TransportMessageMetadata::reply_to(request_id);
        TransportMessage::new(id, "", Bytes::from(body)).with_metadata(if fault {
            metadata.fault()
        } else {
            metadata
        })
    }
}

impl RequestChannel for MockChannel {
    fn state(&self) -> ChannelState {
        self.state.lock().clone()
    }

    fn open(
        &self,
        _timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move {
            self.open_calls.fetch_add(1, Ordering::SeqCst);
            {
                let mut state = self.state.lock();
                if *state != ChannelState::Created {
                    return Err(TransportError::InvalidState {
                        state: state.clone(),
                        operation: "open".to_string(),
                    });
                }
                *state = ChannelState::Opening;
            }

            let delay = *self.open_delay.lock();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            let mut state = self.state.lock();
            if *state != ChannelState::Opening {
                return Err(TransportError::Aborted);
            }
            *state = ChannelState::Opened;
            Ok(())
        })
    }

    fn close(
        &self,
        _timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move {
            *self.state.lock() = ChannelState::Closed;
            Ok(())
        })
    }

    fn abort(&self) {
        self.aborted.store(true, Ordering::SeqCst);
        *self.state.lock() = ChannelState::Closed;
    }

    fn request(
        &self,
        message: TransportMessage,
        _timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = TransportResult<TransportMessage>> + Send + '_>> {
        Box::pin(async move {
            let state = self.state.lock().clone();
            if state != ChannelState::Opened {
                return Err(TransportError::InvalidState {
                    state,
                    operation: "request".to_string(),
                });
            }

            self.requests.lock().push(message.clone());
            let reply = self
                .script
                .lock()
                .pop_front()
                .or_else(|| self.fallback.lock().clone())
                .unwrap_or_else(|| {
                    Reply::Error(TransportError::Internal("no scripted reply".into()))
                });

            let delay = *self.delay.lock();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            match reply {
                Reply::Response(response) => Ok(self.reply_message(
                    &message.id,
                    serde_json::to_vec(&response).unwrap(),
                    false,
                )),
                Reply::Fault(fault) => Ok(self.reply_message(
                    &message.id,
                    serde_json::to_vec(&fault).unwrap(),
                    true,
                )),
                Reply::Error(err) => Err(err),
                Reply::Hang => {
                    std::future::pending::<()>().await;
                    unreachable!()
                }
            }
        })
    }

    fn endpoint(&self) -> Option<String> {
        Some(ISSUER.to_string())
    }
}

/// Hands out one shared [`MockChannel`], counting creations.
#[derive(Debug)]
pub struct MockChannelFactory {
    channel: Arc<MockChannel>,
    created: AtomicUsize,
    failures_left: AtomicUsize,
    available: AtomicBool,
}

impl MockChannelFactory {
    pub fn new(channel: Arc<MockChannel>) -> Arc<Self> {
        Arc::new(Self {
            channel,
            created: AtomicUsize::new(0),
            failures_left: AtomicUsize::new(0),
            available: AtomicBool::new(true),
        })
    }

    /// Fail the next `n` creations.
    pub fn failing(channel: Arc<MockChannel>, n: usize) -> Arc<Self> {
        Arc::new(Self {
            channel,
            created: AtomicUsize::new(0),
            failures_left: AtomicUsize::new(n),
            available: AtomicBool::new(true),
        })
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }
}

impl ChannelFactory for MockChannelFactory {
    fn create_channel(&self, config: &ChannelConfig) -> TransportResult<Arc<dyn RequestChannel>> {
        self.created.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(TransportError::ConnectionFailed(format!(
                "cannot reach {}",
                config.endpoint
            )));
        }
        Ok(Arc::clone(&self.channel) as Arc<dyn RequestChannel>)
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }
}

/// JSON stand-in for the SOAP serializer.
#[derive(Debug, Default)]
pub struct JsonTrustSerializer {
    next_id: AtomicU64,
}

impl JsonTrustSerializer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

impl TrustSerializer for JsonTrustSerializer {
    fn serialize_request(
        &self,
        request: &TrustRequest,
        action: &str,
    ) -> Result<TransportMessage, SerializationError> {
        let body =
            serde_json::to_vec(request).map_err(|e| SerializationError::new(e.to_string()))?;
        let id = format!("urn:test:{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        Ok(TransportMessage::new(id, action, Bytes::from(body))
            .with_metadata(TransportMessageMetadata::with_content_type("application/json")))
    }

    fn deserialize_fault(
        &self,
        message: &TransportMessage,
    ) -> Result<FaultDetail, SerializationError> {
        serde_json::from_slice(&message.payload).map_err(|e| SerializationError::new(e.to_string()))
    }

    fn deserialize_response(
        &self,
        message: &TransportMessage,
        _version: TrustVersion,
    ) -> Result<TrustResponse, SerializationError> {
        serde_json::from_slice(&message.payload).map_err(|e| SerializationError::new(e.to_string()))
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn at(now: DateTime<Utc>) -> Arc<Self> {
        Arc::new(Self {
            now: Mutex::new(now),
        })
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock() = now;
    }

    pub fn advance(&self, by: TimeDelta) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// A clock that moves forward by `step` every time it is read.
#[derive(Debug)]
pub struct TickingClock {
    next: Mutex<DateTime<Utc>>,
    step: TimeDelta,
}

impl TickingClock {
    pub fn starting_at(start: DateTime<Utc>, step: TimeDelta) -> Arc<Self> {
        Arc::new(Self {
            next: Mutex::new(start),
            step,
        })
    }
}

impl Clock for TickingClock {
    fn now(&self) -> DateTime<Utc> {
        let mut next = self.next.lock();
        let now = *next;
        *next += self.step;
        now
    }
}
