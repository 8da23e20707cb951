//! Wall-clock abstraction
//!
//! TTL-based signing converts `now + ttl` to an absolute expiration at
//! signing time, which makes those operations clock-dependent. Tests
//! inject a fixed clock instead of sleeping.

/// Source of the current unix time
pub trait Clock: Send + Sync {
    /// Seconds since the unix epoch
    fn now_unix(&self) -> u64;
}

/// The real wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix(&self) -> u64 {
        chrono::Utc::now().timestamp().max(0) as u64
    }
}

#[cfg(test)]
pub(crate) struct FixedClock(pub u64);

#[cfg(test)]
impl Clock for FixedClock {
    fn now_unix(&self) -> u64 {
        self.0
    }
}
