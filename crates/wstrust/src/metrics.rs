//! Negotiation counters.
//!
//! Shared by a provider and the channel it drives; read them with
//! [`AtomicMetrics::snapshot`].

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// A serializable snapshot of a provider's negotiation metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderMetrics {
    /// Tokens handed to callers, from cache or fresh.
    pub tokens_issued: u64,

    /// `issue` calls served from the cache.
    pub cache_hits: u64,

    /// `issue` calls that had to negotiate.
    pub cache_misses: u64,

    /// Negotiations sent to the issuer.
    pub negotiations: u64,

    /// SOAP faults returned by the issuer.
    pub remote_faults: u64,

    /// Responses rejected for breaking the proof-token rules.
    pub protocol_errors: u64,

    /// Negotiations that ran out of time.
    pub timeouts: u64,

    /// Smoothed issuer round-trip time, in milliseconds.
    pub average_latency_ms: f64,
}

/// Lock-free counters behind [`ProviderMetrics`].
#[derive(Debug, Default)]
pub struct AtomicMetrics {
    /// Tokens handed to callers (atomic counter).
    pub tokens_issued: AtomicU64,

    /// Cache hits (atomic counter).
    pub cache_hits: AtomicU64,

    /// Cache misses (atomic counter).
    pub cache_misses: AtomicU64,

    /// Negotiations sent (atomic counter).
    pub negotiations: AtomicU64,

    /// Remote faults (atomic counter).
    pub remote_faults: AtomicU64,

    /// Protocol violations (atomic counter).
    pub protocol_errors: AtomicU64,

    /// Timeouts (atomic counter).
    pub timeouts: AtomicU64,

    /// Smoothed round-trip time in microseconds; 0 until the first sample.
    latency_us: AtomicU64,
}

impl AtomicMetrics {
    /// All counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Increments `counter` by one.
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Folds one round-trip sample into the smoothed latency.
    pub fn update_latency_us(&self, sample_us: u64) {
        // The closure never declines, so the update always lands
        let _ = self
            .latency_us
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |previous| {
                Some(smooth(previous, sample_us))
            });
    }

    /// Point-in-time copy of every counter.
    pub fn snapshot(&self) -> ProviderMetrics {
        ProviderMetrics {
            tokens_issued: self.tokens_issued.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            negotiations: self.negotiations.load(Ordering::Relaxed),
            remote_faults: self.remote_faults.load(Ordering::Relaxed),
            protocol_errors: self.protocol_errors.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            average_latency_ms: self.latency_us.load(Ordering::Relaxed) as f64 / 1000.0,
        }
    }

    /// Zeroes every counter and forgets the latency history.
    pub fn reset(&self) {
        for counter in [
            &self.tokens_issued,
            &self.cache_hits,
            &self.cache_misses,
            &self.negotiations,
            &self.remote_faults,
            &self.protocol_errors,
            &self.timeouts,
            &self.latency_us,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// Exponential moving average with a weight of 1/10 for the new sample.
fn smooth(previous: u64, sample: u64) -> u64 {
    if previous == 0 {
        sample
    } else {
        previous.saturating_mul(9).saturating_add(sample) / 10
    }
}
