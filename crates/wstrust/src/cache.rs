//! Single-slot issued-token response cache
//!
//! One provider negotiates with one issuer for one relying party, so the
//! cache holds at most one accepted exchange. An entry stays usable until a
//! configurable share of the token's lifetime has passed (the renewal
//! threshold), bounded by a maximum caching time:
//!
//! ```text
//! effective_expiration = created + min(interval * percent / 100, max_caching_time)
//! ```
//!
//! Responses without an `Expires` are never cached.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;
use tracing::debug;

use crate::clock::{Clock, saturating_add_delta, to_time_delta};
use crate::config::{DEFAULT_RENEWAL_THRESHOLD_PERCENT, NegotiationParams};
use crate::model::{Lifetime, TrustRequest, TrustResponse};

/// How long accepted responses are reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    /// Whether caching is enabled at all
    pub enabled: bool,
    /// Share of the token lifetime after which the entry is dropped (1-100)
    pub renewal_threshold_percent: u8,
    /// Hard upper bound on how long an entry is kept
    pub max_caching_time: Duration,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            renewal_threshold_percent: DEFAULT_RENEWAL_THRESHOLD_PERCENT,
            max_caching_time: Duration::MAX,
        }
    }
}

impl CachePolicy {
    /// A policy that never caches.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

impl From<&NegotiationParams> for CachePolicy {
    fn from(params: &NegotiationParams) -> Self {
        Self {
            enabled: params.cache_issued_tokens,
            renewal_threshold_percent: params.renewal_threshold_percent,
            max_caching_time: params.max_caching_time,
        }
    }
}

/// An accepted exchange.
#[derive(Debug)]
pub struct CacheEntry {
    request: TrustRequest,
    response: TrustResponse,
    negotiated_at: DateTime<Utc>,
    effective_expiration: DateTime<Utc>,
}

impl CacheEntry {
    /// The request that was sent.
    pub fn request(&self) -> &TrustRequest {
        &self.request
    }

    /// The response that was accepted.
    pub fn response(&self) -> &TrustResponse {
        &self.response
    }

    /// When the response was accepted.
    pub fn negotiated_at(&self) -> DateTime<Utc> {
        self.negotiated_at
    }

    /// The instant after which the entry is no longer served.
    pub fn effective_expiration(&self) -> DateTime<Utc> {
        self.effective_expiration
    }
}

/// Computes when a response with `lifetime` stops being served.
///
/// Returns `None` when the lifetime has no `Expires`: such responses are
/// treated as already expired.
pub fn effective_expiration(
    lifetime: Option<&Lifetime>,
    now: DateTime<Utc>,
    policy: &CachePolicy,
) -> Option<DateTime<Utc>> {
    let lifetime = lifetime?;
    let expires = lifetime.expires?;
    let created = lifetime.created.unwrap_or(now);

    let interval = (expires - created).max(TimeDelta::zero());
    let scaled_ms = i128::from(interval.num_milliseconds())
        * i128::from(policy.renewal_threshold_percent)
        / 100;
    // scaled_ms <= interval, so the conversion back cannot fail
    let effective = i64::try_from(scaled_ms)
        .ok()
        .and_then(TimeDelta::try_milliseconds)
        .unwrap_or(interval);

    let bound = effective.min(to_time_delta(policy.max_caching_time));
    Some(saturating_add_delta(created, bound))
}

/// Holds at most one accepted exchange.
///
/// Reads and writes go through one mutex and entries are swapped whole, so
/// a reader sees either the old entry or the new one, never a mix.
#[derive(Debug)]
pub struct ResponseCache {
    policy: CachePolicy,
    clock: Arc<dyn Clock>,
    slot: Mutex<Option<Arc<CacheEntry>>>,
}

impl ResponseCache {
    /// Creates an empty cache.
    pub fn new(policy: CachePolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            policy,
            clock,
            slot: Mutex::new(None),
        }
    }

    /// The policy in force.
    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    /// Returns the cached entry if it is still fresh.
    ///
    /// A stale entry is dropped on the way out.
    pub fn get(&self) -> Option<Arc<CacheEntry>> {
        if !self.policy.enabled {
            return None;
        }

        let now = self.clock.now();
        let mut slot = self.slot.lock();
        match slot.as_ref() {
            Some(entry) if now < entry.effective_expiration => {
                debug!(
                    context = %entry.request.context,
                    expires_at = %entry.effective_expiration,
                    "Issued token cache hit"
                );
                Some(Arc::clone(entry))
            }
            Some(entry) => {
                debug!(
                    context = %entry.request.context,
                    expired_at = %entry.effective_expiration,
                    "Cached issued token past renewal point, dropping"
                );
                *slot = None;
                None
            }
            None => {
                debug!("Issued token cache miss");
                None
            }
        }
    }

    /// Stores an accepted exchange negotiated now, replacing whatever was cached.
    ///
    /// A response without an `Expires` empties the slot instead.
    pub fn put(&self, request: TrustRequest, response: TrustResponse) {
        if self.policy.enabled {
            self.put_at(request, response, self.clock.now());
        }
    }

    /// Like [`put`](Self::put), for an exchange negotiated at `negotiated_at`.
    ///
    /// `negotiated_at` stands in for a missing `Created`, exactly as it did
    /// when the token handed to the caller was built.
    pub fn put_at(
        &self,
        request: TrustRequest,
        response: TrustResponse,
        negotiated_at: DateTime<Utc>,
    ) {
        if !self.policy.enabled {
            return;
        }

        let Some(expiration) =
            effective_expiration(response.lifetime.as_ref(), negotiated_at, &self.policy)
        else {
            debug!(
                context = %request.context,
                "Response has no expiry, not caching"
            );
            *self.slot.lock() = None;
            return;
        };

        debug!(
            context = %request.context,
            expires_at = %expiration,
            "Caching issued token response"
        );
        let entry = Arc::new(CacheEntry {
            request,
            response,
            negotiated_at,
            effective_expiration: expiration,
        });
        *self.slot.lock() = Some(entry);
    }

    /// Drops the cached entry, if any.
    pub fn invalidate(&self) {
        if self.slot.lock().take().is_some() {
            debug!("Issued token cache invalidated");
        }
    }
}
