//! Millisecond-precision timestamp and clocks
//!
//! Timestamps are signed milliseconds since Unix epoch. Signed because callers
//! pass arbitrary `i64` bounds to range and retention operations (`0`, `-1`,
//! `i64::MAX`), and every comparison must behave uniformly across that range.
//!
//! ## Usage
//!
//! ```
//! use histmeta_core::Timestamp;
//!
//! let now = Timestamp::now();
//! let from_secs = Timestamp::from_secs(1000);
//! assert!(from_secs < now);
//! assert!(Timestamp::MIN < Timestamp::EPOCH);
//! ```

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Millisecond timestamp
///
/// ## Invariants
///
/// - Always in milliseconds
/// - Totally ordered over the full `i64` range
/// - The zero timestamp represents Unix epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Unix epoch (1970-01-01 00:00:00 UTC)
    pub const EPOCH: Timestamp = Timestamp(0);

    /// Smallest representable instant
    pub const MIN: Timestamp = Timestamp(i64::MIN);

    /// Largest representable instant
    pub const MAX: Timestamp = Timestamp(i64::MAX);

    /// Current wall-clock time
    ///
    /// Returns epoch if the system clock reads before Unix epoch.
    pub fn now() -> Self {
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Timestamp(i64::try_from(duration.as_millis()).unwrap_or(i64::MAX))
    }

    /// Create a timestamp from milliseconds since epoch
    #[inline]
    pub const fn from_millis(millis: i64) -> Self {
        Timestamp(millis)
    }

    /// Create a timestamp from seconds since epoch
    #[inline]
    pub const fn from_secs(secs: i64) -> Self {
        Timestamp(secs.saturating_mul(1_000))
    }

    /// Milliseconds since Unix epoch
    #[inline]
    pub const fn as_millis(&self) -> i64 {
        self.0
    }

    /// Add a duration, saturating at `Timestamp::MAX`
    pub fn saturating_add(&self, duration: Duration) -> Self {
        Timestamp(self.0.saturating_add(duration_millis(duration)))
    }

    /// Subtract a duration, saturating at `Timestamp::MIN`
    pub fn saturating_sub(&self, duration: Duration) -> Self {
        Timestamp(self.0.saturating_sub(duration_millis(duration)))
    }

    /// Duration since an earlier timestamp, `None` if `earlier` is later
    pub fn duration_since(&self, earlier: Timestamp) -> Option<Duration> {
        let delta = self.0.checked_sub(earlier.0)?;
        u64::try_from(delta).ok().map(Duration::from_millis)
    }
}

fn duration_millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

impl Default for Timestamp {
    fn default() -> Self {
        Timestamp::EPOCH
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

impl From<i64> for Timestamp {
    fn from(millis: i64) -> Self {
        Timestamp::from_millis(millis)
    }
}

impl From<Timestamp> for i64 {
    fn from(ts: Timestamp) -> Self {
        ts.0
    }
}

// ============================================================================
// Clocks
// ============================================================================

/// Source of "now" for the store
///
/// The store never calls `Timestamp::now()` directly so tests can pin time.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Current instant
    fn now(&self) -> Timestamp;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// Manually driven clock for deterministic tests
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    /// Create a clock frozen at `start`
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: AtomicI64::new(start.as_millis()),
        }
    }

    /// Jump to an absolute instant
    pub fn set(&self, ts: Timestamp) {
        self.now.store(ts.as_millis(), Ordering::SeqCst);
    }

    /// Move forward by `millis`, returning the new instant
    pub fn advance(&self, millis: i64) -> Timestamp {
        let prev = self.now.fetch_add(millis, Ordering::SeqCst);
        Timestamp(prev.saturating_add(millis))
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp(self.now.load(Ordering::SeqCst))
    }
}
