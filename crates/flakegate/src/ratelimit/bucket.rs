use core::fmt;
use std::time::Duration;

use parking_lot::Mutex;
use portable_atomic::{AtomicU128, Ordering};
use tracing::warn;

use crate::{LimitMode, RateLimitRule};

/// A token bucket: holds up to `capacity` tokens and refills continuously at
/// `capacity` tokens per `period`. Starts full.
///
/// Token levels are tracked in exact integer units (one token equals
/// `period` in milliseconds), so refill never drifts from rounding.
#[derive(Debug)]
pub struct TokenBucket {
    capacity_units: u128,
    token_cost: u128,
    refill_per_milli: u128,
    state: Mutex<TokenState>,
}

#[derive(Debug)]
struct TokenState {
    level: u128,
    last_refill: Option<u64>,
}

impl TokenBucket {
    /// `period` is rounded down to whole milliseconds, with a floor of 1ms.
    pub fn new(capacity: u32, period: Duration) -> Self {
        let period_millis = period.as_millis().max(1);
        let capacity_units = u128::from(capacity) * period_millis;
        Self {
            capacity_units,
            token_cost: period_millis,
            refill_per_milli: u128::from(capacity),
            state: Mutex::new(TokenState {
                level: capacity_units,
                last_refill: None,
            }),
        }
    }

    /// Takes one token if available at `now_millis`.
    pub fn allow_at(&self, now_millis: u64) -> bool {
        let mut state = self.state.lock();
        let last = *state.last_refill.get_or_insert(now_millis);
        if now_millis > last {
            let refill = u128::from(now_millis - last) * self.refill_per_milli;
            state.level = (state.level + refill).min(self.capacity_units);
            state.last_refill = Some(now_millis);
        }
        if state.level >= self.token_cost {
            state.level -= self.token_cost;
            true
        } else {
            false
        }
    }
}

/// A leaky bucket meter (virtual scheduling / GCRA).
///
/// Admits one unit every `period / capacity`, tolerating bursts of up to
/// `capacity` units. The whole state is one atomic "theoretical arrival
/// time", updated with a CAS loop.
///
/// Time is kept in exact integer units where one millisecond equals
/// `capacity` units, so the emission interval is `period` in milliseconds
/// and never rounds down, however large `capacity` is.
#[derive(Debug)]
pub struct LeakyBucket {
    units_per_milli: u128,
    interval: u128,
    tolerance: u128,
    tat: AtomicU128,
}

impl LeakyBucket {
    /// `period` is rounded down to whole milliseconds, with a floor of 1ms.
    pub fn new(capacity: u32, period: Duration) -> Self {
        let capacity = u128::from(capacity.max(1));
        let interval = period.as_millis().max(1);
        Self {
            units_per_milli: capacity,
            interval,
            tolerance: interval * (capacity - 1),
            tat: AtomicU128::new(0),
        }
    }

    /// Admits one unit if the bucket has room at `now_millis`.
    pub fn allow_at(&self, now_millis: u64) -> bool {
        let now = u128::from(now_millis) * self.units_per_milli;
        let mut tat = self.tat.load(Ordering::Acquire);
        loop {
            if tat > now + self.tolerance {
                return false;
            }
            let next = tat.max(now) + self.interval;
            match self
                .tat
                .compare_exchange_weak(tat, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return true,
                Err(actual) => tat = actual,
            }
        }
    }
}

#[derive(Debug)]
pub(crate) enum Bucket {
    Token(TokenBucket),
    Leaky(LeakyBucket),
}

impl Bucket {
    pub(crate) fn allow_at(&self, now_millis: u64) -> bool {
        match self {
            Self::Token(bucket) => bucket.allow_at(now_millis),
            Self::Leaky(bucket) => bucket.allow_at(now_millis),
        }
    }
}

/// Which budget of a rule a limiter enforces.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Dimension {
    Global,
    User,
    Ip,
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Global => "global",
            Self::User => "user",
            Self::Ip => "ip",
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Algorithm {
    TokenBucket,
    LeakyBucket,
}

/// Everything needed to stamp out fresh buckets for one rule dimension.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct BucketSpec {
    algorithm: Algorithm,
    capacity: u32,
    period: Duration,
}

impl BucketSpec {
    /// Returns `None` when the dimension is unlimited, either because it is
    /// not configured or because its settings are unusable (logged).
    pub(crate) fn resolve(rule: &RateLimitRule, dimension: Dimension) -> Option<Self> {
        let limit = match dimension {
            Dimension::Global => rule.global_limit,
            Dimension::User => rule.per_user_limit,
            Dimension::Ip => rule.per_ip_limit,
        }?;

        let algorithm = match &rule.mode {
            LimitMode::TokenBucket => Algorithm::TokenBucket,
            LimitMode::LeakyBucket => Algorithm::LeakyBucket,
            LimitMode::Unsupported(mode) => {
                warn!(
                    %mode,
                    prefix = %rule.match_path_prefix,
                    %dimension,
                    "unsupported rate limit mode, limiter disabled"
                );
                return None;
            }
        };

        if limit == 0 || rule.cycle_seconds == 0 {
            warn!(
                limit,
                cycle_seconds = rule.cycle_seconds,
                prefix = %rule.match_path_prefix,
                %dimension,
                "rate limit and cycle must be positive, limiter disabled"
            );
            return None;
        }

        Some(Self {
            algorithm,
            capacity: limit,
            period: Duration::from_secs(u64::from(rule.cycle_seconds)),
        })
    }

    pub(crate) fn build(&self) -> Bucket {
        match self.algorithm {
            Algorithm::TokenBucket => Bucket::Token(TokenBucket::new(self.capacity, self.period)),
            Algorithm::LeakyBucket => Bucket::Leaky(LeakyBucket::new(self.capacity, self.period)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(allow: impl Fn() -> bool, attempts: usize) -> usize {
        (0..attempts).filter(|_| allow()).count()
    }

    #[test]
    fn token_bucket_starts_full() {
        let bucket = TokenBucket::new(5, Duration::from_secs(1));
        assert_eq!(drain(|| bucket.allow_at(1_000), 10), 5);
    }

    #[test]
    fn token_bucket_refills_proportionally() {
        let bucket = TokenBucket::new(5, Duration::from_secs(1));
        assert_eq!(drain(|| bucket.allow_at(0), 5), 5);
        assert!(!bucket.allow_at(199));
        assert!(bucket.allow_at(200));
        assert!(!bucket.allow_at(200));
    }

    #[test]
    fn token_bucket_caps_at_capacity() {
        let bucket = TokenBucket::new(3, Duration::from_secs(2));
        assert_eq!(drain(|| bucket.allow_at(0), 3), 3);
        assert_eq!(drain(|| bucket.allow_at(60_000), 10), 3);
    }

    #[test]
    fn token_bucket_ignores_clock_going_back() {
        let bucket = TokenBucket::new(1, Duration::from_secs(1));
        assert!(bucket.allow_at(5_000));
        assert!(!bucket.allow_at(4_000));
        assert!(bucket.allow_at(6_000));
    }

    #[test]
    fn leaky_bucket_allows_burst_then_spaces() {
        let bucket = LeakyBucket::new(5, Duration::from_secs(1));
        assert_eq!(drain(|| bucket.allow_at(10_000), 10), 5);
        assert!(!bucket.allow_at(10_199));
        assert!(bucket.allow_at(10_200));
        assert!(!bucket.allow_at(10_200));
    }

    #[test]
    fn leaky_bucket_with_capacity_one_is_fixed_interval() {
        let bucket = LeakyBucket::new(1, Duration::from_secs(3));
        assert!(bucket.allow_at(0));
        assert!(!bucket.allow_at(2_999));
        assert!(bucket.allow_at(3_000));
    }

    #[test]
    fn leaky_bucket_holds_limits_above_one_per_microsecond() {
        let bucket = LeakyBucket::new(2_000_000, Duration::from_secs(1));
        assert_eq!(drain(|| bucket.allow_at(1_000), 3_000_000), 2_000_000);
        assert!(!bucket.allow_at(1_000));
    }

    #[test]
    fn leaky_bucket_keeps_fractional_intervals() {
        // 600k per second is one unit every 1.666..µs; after the burst, one
        // millisecond earns exactly 600 more.
        let bucket = LeakyBucket::new(600_000, Duration::from_secs(1));
        assert_eq!(drain(|| bucket.allow_at(0), 700_000), 600_000);
        assert_eq!(drain(|| bucket.allow_at(1), 1_000), 600);
        assert_eq!(drain(|| bucket.allow_at(1_001), 700_000), 600_000);
    }

    #[test]
    fn leaky_bucket_max_capacity_still_limits() {
        let bucket = LeakyBucket::new(u32::MAX, Duration::from_secs(1));
        assert!(bucket.allow_at(0));
        assert_eq!(drain(|| bucket.allow_at(0), 1_000), 1_000);
    }

    #[test]
    fn unsupported_mode_resolves_to_unlimited() {
        let rule = RateLimitRule::new("/", LimitMode::from("sliding_window"), 1).with_global_limit(1);
        assert_eq!(BucketSpec::resolve(&rule, Dimension::Global), None);
    }

    #[test]
    fn zero_limit_or_cycle_resolves_to_unlimited() {
        let rule = RateLimitRule::new("/", LimitMode::TokenBucket, 1).with_global_limit(0);
        assert_eq!(BucketSpec::resolve(&rule, Dimension::Global), None);

        let rule = RateLimitRule::new("/", LimitMode::TokenBucket, 0).with_per_ip_limit(3);
        assert_eq!(BucketSpec::resolve(&rule, Dimension::Ip), None);
    }

    #[test]
    fn unconfigured_dimension_resolves_to_unlimited() {
        let rule = RateLimitRule::new("/", LimitMode::LeakyBucket, 1).with_global_limit(4);
        assert!(BucketSpec::resolve(&rule, Dimension::Global).is_some());
        assert_eq!(BucketSpec::resolve(&rule, Dimension::User), None);
    }
}
