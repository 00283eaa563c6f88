use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The algorithm backing each dimension of a rule.
///
/// Parsed leniently from text: `token_bucket` selects [`TokenBucket`];
/// `leak_bucket`, `leaky_bucket` or an empty string select [`LeakyBucket`];
/// any other name is kept as [`LimitMode::Unsupported`] and disables the
/// rule's limiters instead of failing the whole configuration.
///
/// [`TokenBucket`]: crate::TokenBucket
/// [`LeakyBucket`]: crate::LeakyBucket
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(from = "String", into = "String")
)]
pub enum LimitMode {
    TokenBucket,
    #[default]
    LeakyBucket,
    Unsupported(String),
}

impl LimitMode {
    pub fn as_str(&self) -> &str {
        match self {
            Self::TokenBucket => "token_bucket",
            Self::LeakyBucket => "leak_bucket",
            Self::Unsupported(name) => name,
        }
    }
}

impl From<&str> for LimitMode {
    fn from(name: &str) -> Self {
        match name {
            "token_bucket" => Self::TokenBucket,
            "leak_bucket" | "leaky_bucket" | "" => Self::LeakyBucket,
            other => Self::Unsupported(other.to_owned()),
        }
    }
}

impl From<String> for LimitMode {
    fn from(name: String) -> Self {
        Self::from(name.as_str())
    }
}

impl From<LimitMode> for String {
    fn from(mode: LimitMode) -> Self {
        match mode {
            LimitMode::Unsupported(name) => name,
            other => other.as_str().to_owned(),
        }
    }
}

impl fmt::Display for LimitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One throttling policy.
///
/// A rule applies to every request whose path starts with
/// `match_path_prefix`. Each configured dimension gets its own budget of
/// `limit` units per `cycle_seconds`; a dimension left as `None` is
/// unlimited.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(rename_all = "PascalCase")
)]
pub struct RateLimitRule {
    #[cfg_attr(feature = "serde", serde(default))]
    pub mode: LimitMode,
    #[cfg_attr(feature = "serde", serde(default))]
    pub match_path_prefix: String,
    pub per_user_limit: Option<u32>,
    #[cfg_attr(feature = "serde", serde(rename = "PerIPLimit", alias = "PerIpLimit"))]
    pub per_ip_limit: Option<u32>,
    pub global_limit: Option<u32>,
    #[cfg_attr(feature = "serde", serde(alias = "CycleSecond"))]
    pub cycle_seconds: u32,
    /// Stop evaluating later rules once this one matches.
    #[cfg_attr(feature = "serde", serde(default))]
    pub break_if_match: bool,
}

impl RateLimitRule {
    /// A rule with no dimensions configured yet.
    pub fn new(match_path_prefix: impl Into<String>, mode: LimitMode, cycle_seconds: u32) -> Self {
        Self {
            mode,
            match_path_prefix: match_path_prefix.into(),
            cycle_seconds,
            ..Self::default()
        }
    }

    pub fn with_global_limit(mut self, limit: u32) -> Self {
        self.global_limit = Some(limit);
        self
    }

    pub fn with_per_user_limit(mut self, limit: u32) -> Self {
        self.per_user_limit = Some(limit);
        self
    }

    pub fn with_per_ip_limit(mut self, limit: u32) -> Self {
        self.per_ip_limit = Some(limit);
        self
    }

    pub fn with_break_if_match(mut self, break_if_match: bool) -> Self {
        self.break_if_match = break_if_match;
        self
    }
}

/// An ordered rule list; earlier rules are evaluated first.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RateLimitConfig {
    #[cfg_attr(feature = "serde", serde(rename = "Rules", default))]
    pub rules: Vec<RateLimitRule>,
}

impl RateLimitConfig {
    pub fn new(rules: Vec<RateLimitRule>) -> Self {
        Self { rules }
    }
}
