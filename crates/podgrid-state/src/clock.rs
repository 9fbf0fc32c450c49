//! Simulated clock shared between the control loops and the driver.
//!
//! The core never reads wall-clock time: all timestamps are simulated
//! epoch seconds owned by the simulation driver. This is what makes two
//! runs over the same scenario byte-identical.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Cheap cloneable handle to the simulated time.
#[derive(Clone, Default)]
pub struct SimClock {
    now: Arc<AtomicU64>,
}

impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start the clock at a given epoch.
    pub fn starting_at(epoch_secs: u64) -> Self {
        let clock = Self::new();
        clock.set(epoch_secs);
        clock
    }

    /// Current simulated epoch seconds.
    pub fn now(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }

    /// Advance the clock, returning the new time.
    pub fn advance(&self, secs: u64) -> u64 {
        self.now.fetch_add(secs, Ordering::SeqCst) + secs
    }

    pub fn set(&self, epoch_secs: u64) {
        self.now.store(epoch_secs, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_advances_monotonically() {
        let clock = SimClock::new();
        assert_eq!(clock.now(), 0);
        assert_eq!(clock.advance(15), 15);
        assert_eq!(clock.advance(15), 30);
        assert_eq!(clock.now(), 30);
    }

    #[test]
    fn clones_share_time() {
        let clock = SimClock::starting_at(100);
        let handle = clock.clone();
        handle.advance(5);
        assert_eq!(clock.now(), 105);
    }
}
