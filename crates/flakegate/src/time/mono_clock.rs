use crate::TimeSource;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// A wall-clock aligned time source that never goes backward.
///
/// The clock samples `SystemTime::now()` once at construction and from then
/// on advances by the elapsed time of a monotonic [`Instant`]. Readings stay
/// aligned to the UNIX epoch (so they can be compared with a generator's
/// configured epoch) while ignoring later wall-clock adjustments such as NTP
/// steps or manual changes.
///
/// Clones share the same anchor.
///
/// # Example
///
/// ```
/// use flakegate::{MonotonicClock, TimeSource};
///
/// let clock = MonotonicClock::new();
/// let a = clock.current_millis();
/// std::thread::sleep(std::time::Duration::from_millis(2));
/// let b = clock.current_millis();
/// assert!(b >= a);
/// ```
#[derive(Clone, Copy, Debug)]
pub struct MonotonicClock {
    start: Instant,
    anchor_millis: u64,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock {
    /// Anchors a new clock at the current system time.
    pub fn new() -> Self {
        let start = Instant::now();
        let anchor_millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_millis() as u64);
        Self {
            start,
            anchor_millis,
        }
    }
}

impl TimeSource for MonotonicClock {
    fn current_millis(&self) -> u64 {
        self.anchor_millis + self.start.elapsed().as_millis() as u64
    }
}
