//! End-to-end negotiation through `IssuedTokenProvider`
//!
//! Uses the in-memory issuer channel from `common` to exercise:
//! - fresh negotiation and cache reuse
//! - remote faults, transport failures and timeouts
//! - lazy, once-only channel creation and opening under concurrency
//! - cache preservation when a renewal fails

mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::TimeDelta;
use pretty_assertions::assert_eq;
use tokio_test::{assert_err, assert_ok};
use wstrust::psha1::compute_combined_key;
use wstrust::{
    FaultDetail, IssuedTokenProvider, KeyType, Lifetime, NegotiationError, NegotiationParams,
    ProofKey, ProofTokenField, ProtocolError, RequestType, SecretBytes, TrustChannelFactory,
    TrustResponse, TrustVersion,
};
use wstrust::{CachePolicy, ResponseCache};
use wstrust_transport_traits::{ChannelState, TransportError};

use common::{
    JsonTrustSerializer, ManualClock, MockChannel, MockChannelFactory, Reply, TickingClock,
    computed_key_response, decode_request, t0, token_response,
};

const BUDGET: Duration = Duration::from_secs(5);

struct Harness {
    provider: IssuedTokenProvider,
    channel: Arc<MockChannel>,
    factory: Arc<MockChannelFactory>,
    clock: Arc<ManualClock>,
}

fn harness(params: NegotiationParams) -> Harness {
    common::init_tracing();
    let channel = MockChannel::new();
    let factory = MockChannelFactory::new(Arc::clone(&channel));
    let clock = ManualClock::at(t0());
    let provider = IssuedTokenProvider::builder(params, factory.clone(), JsonTrustSerializer::new())
        .with_clock(clock.clone())
        .build()
        .unwrap();
    Harness {
        provider,
        channel,
        factory,
        clock,
    }
}

#[tokio::test]
async fn test_combined_entropy_negotiation() {
    let h = harness(common::params());
    let issuer_entropy = [0x42u8; 32];
    h.channel.push(Reply::Response(computed_key_response(
        t0(),
        TimeDelta::hours(1),
        &issuer_entropy,
    )));

    let token = h.provider.issue(BUDGET).await.unwrap();

    let sent = h.channel.requests();
    assert_eq!(sent.len(), 1);
    assert_eq!(
        sent[0].action,
        "http://docs.oasis-open.org/ws-sx/ws-trust/200512/RST/Issue"
    );
    let request = decode_request(&sent[0]);
    assert_eq!(request.key_type, KeyType::Symmetric);
    assert_eq!(request.applies_to.as_str(), common::RELYING_PARTY);
    let requester_entropy = request.requester_entropy().unwrap();
    assert_eq!(requester_entropy.len(), 32);

    let expected =
        compute_combined_key(requester_entropy.expose(), &issuer_entropy, 256).unwrap();
    assert_eq!(token.proof_key, ProofKey::Bytes(expected));
    assert_eq!(token.created, t0());
    assert_eq!(token.expires, t0() + TimeDelta::hours(1));
    assert_eq!(&token.payload[..], b"<saml:Assertion ID=\"_1\"/>");
    assert!(token.internal_key_ref.is_some());
    assert!(token.external_key_ref.is_none());

    let metrics = h.provider.metrics();
    assert_eq!(metrics.negotiations, 1);
    assert_eq!(metrics.tokens_issued, 1);
    assert_eq!(metrics.cache_misses, 1);
}

#[tokio::test]
async fn test_cached_token_reused_until_renewal_point() {
    let h = harness(common::params());
    h.channel.always(Reply::Response(computed_key_response(
        t0(),
        TimeDelta::seconds(100),
        &[7; 32],
    )));

    let first = h.provider.issue(BUDGET).await.unwrap();

    h.clock.set(t0() + TimeDelta::seconds(59));
    let second = h.provider.issue(BUDGET).await.unwrap();
    assert_eq!(h.channel.request_count(), 1);
    assert_eq!(first, second);

    h.clock.set(t0() + TimeDelta::seconds(61));
    let third = h.provider.issue(BUDGET).await.unwrap();
    assert_eq!(h.channel.request_count(), 2);
    // Fresh requester entropy means a fresh key
    assert_ne!(first.proof_key, third.proof_key);

    let metrics = h.provider.metrics();
    assert_eq!(metrics.cache_hits, 1);
    assert_eq!(metrics.cache_misses, 2);
    assert_eq!(metrics.tokens_issued, 3);
}

#[tokio::test]
async fn test_caching_disabled_negotiates_every_time() {
    let h = harness(common::params().with_caching(false));
    h.channel.always(Reply::Response(token_response(t0(), TimeDelta::hours(1))));

    h.provider.issue(BUDGET).await.unwrap();
    h.provider.issue(BUDGET).await.unwrap();
    assert_eq!(h.channel.request_count(), 2);
}

#[tokio::test]
async fn test_bearer_negotiation_has_no_proof_key() {
    let h = harness(common::params().with_key_type(KeyType::Bearer));
    h.channel.push(Reply::Response(TrustResponse {
        key_type: Some(KeyType::Bearer.uri(TrustVersion::WsTrust13).to_string()),
        ..token_response(t0(), TimeDelta::hours(1))
    }));

    let token = h.provider.issue(BUDGET).await.unwrap();
    assert!(token.proof_key.is_none());

    let request = decode_request(&h.channel.requests()[0]);
    assert!(request.entropy.is_none());
    assert!(request.computed_key_algorithm.is_none());
}

#[tokio::test]
async fn test_remote_fault_surfaces_detail() {
    let h = harness(common::params());
    let fault = FaultDetail::new("s:Sender", "Authentication failed")
        .with_subcode("wst:FailedAuthentication");
    h.channel.push(Reply::Fault(fault.clone()));

    let err = h.provider.issue(BUDGET).await.unwrap_err();
    assert_eq!(err, NegotiationError::RemoteFault(fault));
    assert_eq!(h.provider.metrics().remote_faults, 1);
}

#[tokio::test]
async fn test_transport_error_passes_through() {
    let h = harness(common::params());
    h.channel.push(Reply::Error(TransportError::ConnectionLost(
        "reset by peer".to_string(),
    )));

    let err = h.provider.issue(BUDGET).await.unwrap_err();
    assert_eq!(
        err,
        NegotiationError::Transport(TransportError::ConnectionLost("reset by peer".to_string()))
    );
}

#[tokio::test]
async fn test_hung_issuer_times_out() {
    let h = harness(common::params());
    h.channel.push(Reply::Hang);

    let budget = Duration::from_millis(50);
    let started = std::time::Instant::now();
    let err = h.provider.issue(budget).await.unwrap_err();

    assert_eq!(err, NegotiationError::Timeout(budget));
    assert!(err.is_timeout());
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(h.provider.metrics().timeouts, 1);

    // The channel is still usable for the next attempt
    h.channel.push(Reply::Response(token_response(t0(), TimeDelta::hours(1))));
    assert!(h.provider.issue(BUDGET).await.is_ok());
}

#[tokio::test]
async fn test_protocol_violation_is_not_downgraded() {
    let h = harness(common::params());
    h.channel.push(Reply::Response(TrustResponse {
        requested_proof_token: vec![
            ProofTokenField::BinarySecret(SecretBytes::new(vec![1; 32])),
            ProofTokenField::ComputedKeyAlgorithm(
                TrustVersion::WsTrust13.psha1_algorithm().to_string(),
            ),
        ],
        ..token_response(t0(), TimeDelta::hours(1))
    }));

    let err = h.provider.issue(BUDGET).await.unwrap_err();
    assert_eq!(
        err,
        NegotiationError::Protocol(ProtocolError::AmbiguousProofTokenProtocolViolation)
    );
    assert!(err.is_protocol_violation());
    assert_eq!(h.provider.metrics().protocol_errors, 1);
}

#[tokio::test]
async fn test_missing_token_is_unavailable() {
    let h = harness(common::params());
    h.channel.push(Reply::Response(TrustResponse {
        requested_security_token: None,
        ..token_response(t0(), TimeDelta::hours(1))
    }));

    let err = h.provider.issue(BUDGET).await.unwrap_err();
    assert_eq!(err, NegotiationError::TokenUnavailable);
}

#[tokio::test]
async fn test_failure_does_not_poison_cache() {
    // Build the channel by hand so the cache can be inspected directly
    let channel = MockChannel::new();
    let transport = MockChannelFactory::new(Arc::clone(&channel));
    let clock = ManualClock::at(t0());
    let cache = Arc::new(ResponseCache::new(CachePolicy::default(), clock.clone()));
    let factory = TrustChannelFactory::new(
        transport,
        common::params().channel_config(),
        JsonTrustSerializer::new(),
        Arc::clone(&cache),
        clock.clone(),
    );
    let requests = wstrust::TrustRequestBuilder::new(common::params()).unwrap();
    let negotiation = factory.ready_channel(BUDGET).await.unwrap();

    channel.push(Reply::Response(token_response(t0(), TimeDelta::hours(1))));
    negotiation.issue(requests.build(), BUDGET).await.unwrap();
    let cached = cache.get().unwrap();

    channel.push(Reply::Fault(FaultDetail::new("s:Receiver", "Busy")));
    assert_err!(negotiation.issue(requests.build(), BUDGET).await);
    channel.push(Reply::Response(TrustResponse {
        requested_proof_token: vec![ProofTokenField::EncryptedKey(bytes::Bytes::from_static(
            b"cipher",
        ))],
        ..token_response(t0(), TimeDelta::hours(9))
    }));
    assert!(negotiation.issue(requests.build(), BUDGET).await.is_err());

    assert!(Arc::ptr_eq(&cached, &cache.get().unwrap()));
}

#[tokio::test]
async fn test_channel_created_and_opened_once_under_concurrency() {
    let h = harness(common::params().with_caching(false));
    h.channel.set_open_delay(Duration::from_millis(30));
    h.channel.set_delay(Duration::from_millis(20));
    h.channel.always(Reply::Response(token_response(t0(), TimeDelta::hours(1))));

    let provider = Arc::new(h.provider);
    let mut tasks = Vec::new();
    for _ in 0..8 {
        let provider = Arc::clone(&provider);
        tasks.push(tokio::spawn(async move { provider.issue(BUDGET).await }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(h.factory.created(), 1);
    assert_eq!(h.channel.open_calls(), 1);
    assert_eq!(h.channel.request_count(), 8);
    assert_eq!(provider.state(), ChannelState::Opened);
}

#[tokio::test]
async fn test_unopened_channel_rejects_requests() {
    let h = harness(common::params());
    let factory = TrustChannelFactory::new(
        h.factory.clone(),
        common::params().channel_config(),
        JsonTrustSerializer::new(),
        Arc::new(ResponseCache::new(CachePolicy::default(), h.clock.clone())),
        h.clock.clone(),
    );
    let requests = wstrust::TrustRequestBuilder::new(common::params()).unwrap();
    let negotiation = factory.channel().await.unwrap();

    let err = negotiation.issue(requests.build(), BUDGET).await.unwrap_err();
    assert!(matches!(
        err,
        NegotiationError::Transport(TransportError::InvalidState { .. })
    ));
    assert_eq!(h.channel.request_count(), 0);

    // Opening twice is a transport error, not a silent no-op
    assert_ok!(factory.open(BUDGET).await);
    assert_err!(factory.open(BUDGET).await);
    assert_eq!(h.channel.open_calls(), 2);
}

#[tokio::test]
async fn test_unavailable_transport_is_not_asked_for_a_channel() {
    let h = harness(common::params());
    h.factory.set_available(false);

    let err = h.provider.issue(BUDGET).await.unwrap_err();
    assert!(matches!(
        err,
        NegotiationError::Transport(TransportError::ConfigurationError(_))
    ));
    assert_eq!(h.factory.created(), 0);

    h.factory.set_available(true);
    h.channel.push(Reply::Response(token_response(t0(), TimeDelta::hours(1))));
    assert_ok!(h.provider.issue(BUDGET).await);
    assert_eq!(h.factory.created(), 1);
}

#[tokio::test]
async fn test_cache_hit_reproduces_token_without_created() {
    common::init_tracing();
    let channel = MockChannel::new();
    let factory = MockChannelFactory::new(Arc::clone(&channel));
    let clock = TickingClock::starting_at(t0(), TimeDelta::seconds(1));
    let provider =
        IssuedTokenProvider::builder(common::params(), factory, JsonTrustSerializer::new())
            .with_clock(clock)
            .build()
            .unwrap();

    channel.push(Reply::Response(TrustResponse {
        lifetime: Some(Lifetime {
            created: None,
            expires: Some(t0() + TimeDelta::hours(1)),
        }),
        ..computed_key_response(t0(), TimeDelta::hours(1), &[3; 32])
    }));

    let fresh = provider.issue(BUDGET).await.unwrap();
    let cached = provider.issue(BUDGET).await.unwrap();

    assert_eq!(channel.request_count(), 1);
    assert_eq!(provider.metrics().cache_hits, 1);
    assert_eq!(fresh, cached);
}

#[tokio::test]
async fn test_channel_creation_failure_surfaces_on_first_use() {
    common::init_tracing();
    let channel = MockChannel::new();
    let factory = MockChannelFactory::failing(Arc::clone(&channel), 1);
    let provider =
        IssuedTokenProvider::builder(common::params(), factory.clone(), JsonTrustSerializer::new())
            .build()
            .unwrap();

    // Building the provider does not touch the transport
    assert_eq!(factory.created(), 0);
    assert_eq!(provider.state(), ChannelState::Created);

    let err = provider.issue(BUDGET).await.unwrap_err();
    assert!(matches!(
        err,
        NegotiationError::Transport(TransportError::ConnectionFailed(_))
    ));

    // The failure is not remembered
    channel.push(Reply::Response(token_response(
        chrono::Utc::now(),
        TimeDelta::hours(1),
    )));
    assert!(provider.issue(BUDGET).await.is_ok());
    assert_eq!(factory.created(), 2);
}

#[tokio::test]
async fn test_lifecycle_forwarding() {
    let h = harness(common::params());

    // Nothing to forward to yet
    assert_ok!(h.provider.close(BUDGET).await);
    h.provider.abort();
    assert_eq!(h.factory.created(), 0);

    assert_ok!(h.provider.open(BUDGET).await);
    assert_eq!(h.factory.created(), 1);
    assert_eq!(h.channel.open_calls(), 1);
    assert_eq!(h.provider.state(), ChannelState::Opened);

    // Already open: issue does not reopen
    h.channel.push(Reply::Response(token_response(t0(), TimeDelta::hours(1))));
    h.provider.issue(BUDGET).await.unwrap();
    assert_eq!(h.channel.open_calls(), 1);

    h.provider.abort();
    assert!(h.channel.was_aborted());
    assert_eq!(h.provider.state(), ChannelState::Closed);
}

#[tokio::test]
async fn test_request_supports_every_request_type() {
    let params = common::params().with_trust_version(TrustVersion::Feb2005);
    let h = harness(params.clone());
    let negotiation = {
        let cache = Arc::new(ResponseCache::new(CachePolicy::default(), h.clock.clone()));
        TrustChannelFactory::new(
            h.factory.clone(),
            params.channel_config(),
            JsonTrustSerializer::new(),
            cache,
            h.clock.clone(),
        )
    };
    let channel = negotiation.ready_channel(BUDGET).await.unwrap();
    let requests = wstrust::TrustRequestBuilder::new(params).unwrap();

    for (request_type, action) in [
        (
            RequestType::Issue,
            "http://schemas.xmlsoap.org/ws/2005/02/trust/RST/Issue",
        ),
        (
            RequestType::Renew,
            "http://schemas.xmlsoap.org/ws/2005/02/trust/RST/Renew",
        ),
        (
            RequestType::Cancel,
            "http://schemas.xmlsoap.org/ws/2005/02/trust/RST/Cancel",
        ),
        (
            RequestType::Validate,
            "http://schemas.xmlsoap.org/ws/2005/02/trust/RST/Validate",
        ),
    ] {
        h.channel.push(Reply::Response(TrustResponse::default()));
        let request = requests.build_with_type(request_type);
        channel.request(&request, BUDGET).await.unwrap();
        let sent = h.channel.requests();
        assert_eq!(sent.last().unwrap().action, action);
        assert_eq!(decode_request(sent.last().unwrap()).request_type, request_type);
    }
}
