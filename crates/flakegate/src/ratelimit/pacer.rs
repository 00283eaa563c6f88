use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::warn;

/// Waits longer than this are reported.
const SLOW_WAIT: Duration = Duration::from_secs(5);

/// A blocking pacer that spaces events evenly, `limit` per `per`.
///
/// Unlike [`KeyedRateLimiter`], which rejects excess requests, a pacer makes
/// the caller wait for its slot. Slots are reserved under a short lock and
/// the sleep happens outside it, so concurrent callers queue up in order
/// without blocking each other's reservations.
///
/// [`KeyedRateLimiter`]: crate::KeyedRateLimiter
#[derive(Debug)]
pub struct Pacer {
    name: String,
    interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl Pacer {
    pub fn new(name: impl Into<String>, limit: u32, per: Duration) -> Self {
        Self {
            name: name.into(),
            interval: per / limit.max(1),
            next_slot: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Blocks until the caller's slot and returns how long it waited.
    pub fn take(&self) -> Duration {
        let wait = {
            let mut next_slot = self.next_slot.lock();
            let now = Instant::now();
            let slot = match *next_slot {
                Some(slot) if slot > now => slot,
                _ => now,
            };
            *next_slot = Some(slot + self.interval);
            slot - now
        };

        if !wait.is_zero() {
            thread::sleep(wait);
        }
        if wait > SLOW_WAIT {
            warn!(pacer = %self.name, waited = ?wait, "waited too long for a pacing slot");
        }
        wait
    }

    /// Claims the current slot without waiting; returns `false` if the next
    /// slot is still in the future.
    pub fn try_take(&self) -> bool {
        let mut next_slot = self.next_slot.lock();
        let now = Instant::now();
        match *next_slot {
            Some(slot) if slot > now => false,
            _ => {
                *next_slot = Some(now + self.interval);
                true
            }
        }
    }
}
