use core::fmt;
use std::sync::Arc;

use ahash::RandomState;
use arc_swap::ArcSwap;
use dashmap::DashMap;
use tracing::{debug, info, instrument};

use super::bucket::{Bucket, BucketSpec, Dimension};
use crate::{RateLimitConfig, RateLimitRule, SystemClock, TimeSource};

type KeyedBuckets = DashMap<String, Bucket, RandomState>;

/// Runtime state of one [`RateLimitRule`].
///
/// The global bucket is built up front; per-user and per-IP buckets are
/// created the first time a key shows up and live until the next reload.
struct RuleItem {
    rule: RateLimitRule,
    global: Option<Bucket>,
    per_user: Option<BucketSpec>,
    per_ip: Option<BucketSpec>,
    users: KeyedBuckets,
    ips: KeyedBuckets,
}

impl RuleItem {
    fn new(rule: RateLimitRule) -> Self {
        let global = BucketSpec::resolve(&rule, Dimension::Global).map(|spec| spec.build());
        let per_user = BucketSpec::resolve(&rule, Dimension::User);
        let per_ip = BucketSpec::resolve(&rule, Dimension::Ip);
        Self {
            rule,
            global,
            per_user,
            per_ip,
            users: DashMap::with_hasher(RandomState::new()),
            ips: DashMap::with_hasher(RandomState::new()),
        }
    }

    fn matches(&self, path: &str) -> bool {
        path.starts_with(&self.rule.match_path_prefix)
    }

    /// Charges the rule's budgets in order (global, user, IP) and returns the
    /// first dimension that refused. Later dimensions are left untouched.
    fn denied_by(&self, user_id: &str, ip: &str, now_millis: u64) -> Option<Dimension> {
        if let Some(global) = &self.global {
            if !global.allow_at(now_millis) {
                return Some(Dimension::Global);
            }
        }
        if !Self::allow_keyed(&self.users, self.per_user.as_ref(), user_id, now_millis) {
            return Some(Dimension::User);
        }
        if !Self::allow_keyed(&self.ips, self.per_ip.as_ref(), ip, now_millis) {
            return Some(Dimension::Ip);
        }
        None
    }

    fn allow_keyed(
        buckets: &KeyedBuckets,
        spec: Option<&BucketSpec>,
        key: &str,
        now_millis: u64,
    ) -> bool {
        let Some(spec) = spec else {
            return true;
        };
        if let Some(bucket) = buckets.get(key) {
            return bucket.allow_at(now_millis);
        }
        // Racing first sightings of a key serialize on the shard lock here,
        // and all of them end up charging the same bucket.
        buckets
            .entry(key.to_owned())
            .or_insert_with(|| spec.build())
            .allow_at(now_millis)
    }
}

fn build_rule_items(config: &RateLimitConfig) -> Vec<RuleItem> {
    config.rules.iter().cloned().map(RuleItem::new).collect()
}

/// Evaluates an ordered list of [`RateLimitRule`]s against
/// `(path, user, ip)` tuples.
///
/// ## Evaluation
///
/// Rules are tried in order. A rule matches when the path starts with its
/// prefix; a matching rule charges its global, per-user and per-IP budgets
/// in that order and denies on the first exhausted one. A denial ends the
/// evaluation. An allow ends it only if the rule has `break_if_match` set;
/// otherwise the next rule is tried. Paths that match nothing are allowed.
///
/// ## Concurrency
///
/// `check` takes no lock on the rule list: the active set sits behind an
/// [`ArcSwap`] and [`reload`] swaps in a freshly built one, so every check
/// sees either the complete old set or the complete new one. Per-key
/// buckets live in sharded concurrent maps with atomic insert-if-absent.
///
/// # Example
/// ```
/// use flakegate::{KeyedRateLimiter, LimitMode, RateLimitConfig, RateLimitRule};
///
/// let config = RateLimitConfig::new(vec![
///     RateLimitRule::new("/api/", LimitMode::TokenBucket, 60)
///         .with_per_user_limit(100)
///         .with_break_if_match(true),
/// ]);
/// let limiter = KeyedRateLimiter::new(&config);
/// assert!(limiter.check("/api/orders", "user-1", "10.0.0.1"));
/// assert!(limiter.check("/healthz", "user-1", "10.0.0.1"));
/// ```
///
/// [`reload`]: KeyedRateLimiter::reload
pub struct KeyedRateLimiter<T = SystemClock>
where
    T: TimeSource,
{
    rules: ArcSwap<Vec<RuleItem>>,
    time: T,
}

impl KeyedRateLimiter<SystemClock> {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl<T> KeyedRateLimiter<T>
where
    T: TimeSource,
{
    pub fn with_clock(config: &RateLimitConfig, time: T) -> Self {
        Self {
            rules: ArcSwap::from_pointee(build_rule_items(config)),
            time,
        }
    }

    /// Returns `true` if the request may proceed.
    #[instrument(level = "trace", skip(self))]
    pub fn check(&self, path: &str, user_id: &str, ip: &str) -> bool {
        let rules = self.rules.load();
        let now_millis = self.time.current_millis();

        for item in rules.iter().filter(|item| item.matches(path)) {
            if let Some(dimension) = item.denied_by(user_id, ip, now_millis) {
                debug!(
                    prefix = %item.rule.match_path_prefix,
                    %dimension,
                    path,
                    user_id,
                    ip,
                    "request rate limited"
                );
                return false;
            }
            if item.rule.break_if_match {
                break;
            }
        }
        true
    }

    /// Replaces the whole rule set. Buckets of the previous set, and the
    /// budgets they tracked, are dropped.
    pub fn reload(&self, config: &RateLimitConfig) {
        let items = build_rule_items(config);
        info!(rules = items.len(), "rate limit rules reloaded");
        self.rules.store(Arc::new(items));
    }

    /// Number of rules in the active set.
    pub fn rule_count(&self) -> usize {
        self.rules.load().len()
    }
}

impl<T> fmt::Debug for KeyedRateLimiter<T>
where
    T: TimeSource,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyedRateLimiter")
            .field("rules", &self.rule_count())
            .finish_non_exhaustive()
    }
}
