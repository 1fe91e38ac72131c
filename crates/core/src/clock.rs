//! Time source for ledger timestamps.

use chrono::{DateTime, SubsecRound, Utc};

/// Source of "now" for record timestamps.
///
/// Injected into ledgers so tests can drive time explicitly. Implementations
/// return at most microsecond precision, the resolution timestamps are
/// persisted with, so a stored record reads back exactly as it was written.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time, truncated to microseconds.
#[derive(Debug, Default, Copy, Clone)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now().trunc_subsecs(6)
    }
}
