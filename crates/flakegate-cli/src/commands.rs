use std::fs;
use std::io::{self, Write};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::Context;
use flakegate::{KeyedRateLimiter, RateLimitConfig, SnowflakeGenerator, derive_machine_id};
use tracing::{debug, info};

use crate::config::{CheckConfig, GenerateConfig};

pub fn generate(config: GenerateConfig) -> anyhow::Result<()> {
    let generator = SnowflakeGenerator::new(config.generator)?;
    debug!(?generator, "generator ready");

    let mut out = io::stdout().lock();
    for _ in 0..config.count {
        let id = generator.generate_id();
        if config.explain {
            let parts = generator.decompose(id);
            let minted_at = humanize(generator.timestamp_of(id));
            writeln!(
                out,
                "{id}\ttimestamp={} machine={} sequence={} at={minted_at}",
                parts.timestamp, parts.machine_id, parts.sequence
            )?;
        } else {
            writeln!(out, "{id}")?;
        }
    }
    out.flush()?;
    Ok(())
}

pub fn machine_id(bits: u32) -> anyhow::Result<()> {
    let id = derive_machine_id(bits);
    writeln!(io::stdout().lock(), "{id}")?;
    Ok(())
}

pub fn check(config: CheckConfig) -> anyhow::Result<()> {
    let rules = load_rules(&config)?;
    let limiter = KeyedRateLimiter::new(&rules);
    info!(rules = limiter.rule_count(), file = %config.rules.display(), "rules loaded");

    let mut out = io::stdout().lock();
    let mut allowed = 0;
    for attempt in 1..=config.repeat {
        let ok = limiter.check(&config.path, &config.user, &config.ip);
        allowed += usize::from(ok);
        writeln!(out, "{attempt}\t{}", if ok { "allow" } else { "deny" })?;
    }
    out.flush()?;
    info!(
        allowed,
        denied = config.repeat - allowed,
        path = %config.path,
        "replay finished"
    );
    Ok(())
}

fn load_rules(config: &CheckConfig) -> anyhow::Result<RateLimitConfig> {
    let raw = fs::read_to_string(&config.rules)
        .with_context(|| format!("failed to read {}", config.rules.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse rules from {}", config.rules.display()))
}

/// Renders a duration since the UNIX epoch as seconds with millisecond
/// precision, plus how long ago that was.
fn humanize(since_epoch: Duration) -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    let age = now.saturating_sub(since_epoch);
    format!(
        "{}.{:03}s ({}s ago)",
        since_epoch.as_secs(),
        since_epoch.subsec_millis(),
        age.as_secs()
    )
}
