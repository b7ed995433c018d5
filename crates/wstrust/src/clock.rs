//! Time source abstraction.

use std::fmt::Debug;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

/// Clock for current time (enables testing with deterministic timestamps)
pub trait Clock: Send + Sync + Debug {
    /// The current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// The wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Converts a `std` duration, saturating at [`TimeDelta::MAX`].
pub(crate) fn to_time_delta(duration: Duration) -> TimeDelta {
    TimeDelta::from_std(duration).unwrap_or(TimeDelta::MAX)
}

/// `instant + duration`, clamped to the representable range instead of overflowing.
pub(crate) fn saturating_add(instant: DateTime<Utc>, duration: Duration) -> DateTime<Utc> {
    saturating_add_delta(instant, to_time_delta(duration))
}

/// `instant + delta`, clamped to the representable range instead of overflowing.
pub(crate) fn saturating_add_delta(instant: DateTime<Utc>, delta: TimeDelta) -> DateTime<Utc> {
    instant.checked_add_signed(delta).unwrap_or(if delta < TimeDelta::zero() {
        DateTime::<Utc>::MIN_UTC
    } else {
        DateTime::<Utc>::MAX_UTC
    })
}
