//! Time as an injected capability.
//!
//! The registry never reads the wall clock directly — every timestamp
//! flows through a `Clock`, so tests can supply deterministic sequences and
//! the state machine stays a pure function of its inputs plus the clock.

/// Millisecond Unix timestamp, the unit every `*_at` field in the store uses.
pub type MillisTimestamp = i64;

pub trait Clock: Send + Sync {
    fn now_millis(&self) -> MillisTimestamp;
}

/// Default clock, backed by the OS wall clock via `chrono`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> MillisTimestamp {
        chrono::Utc::now().timestamp_millis()
    }
}
