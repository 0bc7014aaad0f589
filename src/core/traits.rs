//! Environment seams for the link driver.
//!
//! The transport has no interrupt line and no background tasks; everything
//! it does is driven by the caller's poll loop and compared against a
//! monotonic clock the environment supplies.

use std::time::{Duration, Instant};

/// Monotonic time source.
///
/// `now` reports elapsed time since an arbitrary fixed epoch (boot, clock
/// construction — anything monotonic). The driver only ever compares and
/// subtracts these values, never interprets them as wall-clock time.
pub trait Clock {
    /// Current monotonic time.
    fn now(&self) -> Duration;
}

/// [`Clock`] backed by [`Instant`], epoch = construction time.
#[derive(Debug, Clone)]
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    /// Create a clock whose epoch is now.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }
}
