use std::time::Duration;

use serde::Deserialize;

/// Upper bound for every window, block and interval in the policy.
pub const MAX_PERIOD_SECS: u64 = 30 * 24 * 60 * 60;

/// Sustained per-window limit with strike escalation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RateRule {
    pub window_secs: u64,
    pub max_requests: u64,
    pub strikes_to_block: u32,
    pub block_secs: u64,
    /// Retry-after sent with a plain slow-down rejection.
    pub retry_after_secs: u64,
}

impl Default for RateRule {
    fn default() -> Self {
        Self {
            window_secs: 60,
            max_requests: 30,
            strikes_to_block: 2,
            block_secs: 60 * 60,
            retry_after_secs: 30,
        }
    }
}

/// Short rapid-action detector.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BurstRule {
    pub window_secs: u64,
    pub max_actions: usize,
    pub block_secs: u64,
}

impl Default for BurstRule {
    fn default() -> Self {
        Self {
            window_secs: 5,
            max_actions: 3,
            block_secs: 30,
        }
    }
}

/// Coarse fixed-window caps layered on top of the rate rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    /// Every guarded request.
    General,
    /// Generator calls.
    Generator,
    Health,
}

impl Tier {
    pub fn as_str(self) -> &'static str {
        match self {
            Tier::General => "general",
            Tier::Generator => "generator",
            Tier::Health => "health",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TierRule {
    pub window_secs: u64,
    pub max_requests: u64,
}

impl TierRule {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

/// `null` for a tier turns it off.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TierPolicy {
    pub general: Option<TierRule>,
    pub generator: Option<TierRule>,
    pub health: Option<TierRule>,
}

impl Default for TierPolicy {
    fn default() -> Self {
        Self {
            general: Some(TierRule {
                window_secs: 15 * 60,
                max_requests: 50,
            }),
            generator: Some(TierRule {
                window_secs: 15 * 60,
                max_requests: 25,
            }),
            health: Some(TierRule {
                window_secs: 60,
                max_requests: 5,
            }),
        }
    }
}

impl TierPolicy {
    pub fn disabled() -> Self {
        Self {
            general: None,
            generator: None,
            health: None,
        }
    }

    pub fn rule(&self, tier: Tier) -> Option<&TierRule> {
        match tier {
            Tier::General => self.general.as_ref(),
            Tier::Generator => self.generator.as_ref(),
            Tier::Health => self.health.as_ref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GuardPolicy {
    pub rate: RateRule,
    /// `None` turns burst detection off.
    pub burst: Option<BurstRule>,
    pub tiers: TierPolicy,
    pub idle_ttl_secs: u64,
    pub sweep_interval_secs: u64,
}

impl Default for GuardPolicy {
    fn default() -> Self {
        Self {
            rate: RateRule::default(),
            burst: Some(BurstRule::default()),
            tiers: TierPolicy::default(),
            idle_ttl_secs: 60 * 60,
            sweep_interval_secs: 60 * 60,
        }
    }
}

impl GuardPolicy {
    pub fn validate(&self) -> anyhow::Result<()> {
        period("rate.window_secs", self.rate.window_secs)?;
        period("rate.block_secs", self.rate.block_secs)?;
        period("rate.retry_after_secs", self.rate.retry_after_secs)?;
        anyhow::ensure!(self.rate.max_requests > 0, "rate.max_requests must be > 0");
        anyhow::ensure!(self.rate.strikes_to_block > 0, "rate.strikes_to_block must be > 0");
        if let Some(b) = &self.burst {
            period("burst.window_secs", b.window_secs)?;
            period("burst.block_secs", b.block_secs)?;
            anyhow::ensure!(b.max_actions > 1, "burst.max_actions must be > 1");
        }
        for tier in [Tier::General, Tier::Generator, Tier::Health] {
            if let Some(r) = self.tiers.rule(tier) {
                period(&format!("tiers.{}.window_secs", tier.as_str()), r.window_secs)?;
                anyhow::ensure!(r.max_requests > 0, "tiers.{}.max_requests must be > 0", tier.as_str());
            }
        }
        anyhow::ensure!(
            self.idle_ttl_secs <= MAX_PERIOD_SECS,
            "idle_ttl_secs must be <= {}",
            MAX_PERIOD_SECS
        );
        period("sweep_interval_secs", self.sweep_interval_secs)?;
        Ok(())
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.rate.window_secs)
    }

    pub fn burst_window(&self) -> Option<Duration> {
        self.burst.as_ref().map(|b| Duration::from_secs(b.window_secs))
    }

    pub fn idle_ttl(&self) -> Duration {
        Duration::from_secs(self.idle_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

fn period(name: &str, secs: u64) -> anyhow::Result<()> {
    anyhow::ensure!(
        (1..=MAX_PERIOD_SECS).contains(&secs),
        "{} must be between 1 and {}",
        name,
        MAX_PERIOD_SECS
    );
    Ok(())
}
