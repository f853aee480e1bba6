use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use super::policy::Tier;

/// One fixed window of a tier cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierWindow {
    pub started: Instant,
    pub hits: u64,
}

/// Recent behaviour of one identity. Pure cache, safe to evict when idle.
#[derive(Debug, Clone)]
pub struct ClientRecord {
    pub identity: String,
    pub request_count: u64,
    pub last_request_at: Instant,
    pub suspicious_strikes: u32,
    pub blocked_until: Option<Instant>,
    /// Oldest first, never older than the burst window after `track`.
    pub recent_burst: VecDeque<Instant>,
    pub burst_blocked_until: Option<Instant>,
    pub tiers: HashMap<Tier, TierWindow>,
}

impl ClientRecord {
    pub fn new(identity: impl Into<String>, now: Instant) -> Self {
        Self {
            identity: identity.into(),
            request_count: 0,
            last_request_at: now,
            suspicious_strikes: 0,
            blocked_until: None,
            recent_burst: VecDeque::new(),
            burst_blocked_until: None,
            tiers: HashMap::new(),
        }
    }

    /// Counts one action at `now`.
    ///
    /// The per-window counter restarts after a quiet gap longer than `window`;
    /// strikes are left alone. Burst history is only kept when a burst window
    /// is given.
    pub fn track(&mut self, now: Instant, window: Duration, burst_window: Option<Duration>) {
        self.count(now, window);

        match burst_window {
            Some(w) => {
                self.prune_burst(now, w);
                self.recent_burst.push_back(now);
            }
            None => self.recent_burst.clear(),
        }
    }

    /// Counts a request against the per-window counter only.
    pub fn count(&mut self, now: Instant, window: Duration) {
        if now.saturating_duration_since(self.last_request_at) > window {
            self.request_count = 0;
        }
        self.request_count += 1;
        self.last_request_at = now;
    }

    /// Counts one hit in the current fixed window of `tier`, starting a new
    /// window once `window` has passed. Returns the hits so far in the
    /// window and the time left until it resets.
    pub fn hit_tier(&mut self, tier: Tier, now: Instant, window: Duration) -> (u64, Duration) {
        let w = self.tiers.entry(tier).or_insert(TierWindow {
            started: now,
            hits: 0,
        });
        let mut elapsed = now.saturating_duration_since(w.started);
        if elapsed >= window {
            *w = TierWindow {
                started: now,
                hits: 0,
            };
            elapsed = Duration::ZERO;
        }
        w.hits += 1;
        (w.hits, window - elapsed)
    }

    fn prune_burst(&mut self, now: Instant, window: Duration) {
        while let Some(&t) = self.recent_burst.front() {
            if now.saturating_duration_since(t) < window {
                break;
            }
            self.recent_burst.pop_front();
        }
    }

    /// Any block still running at `now`.
    pub fn is_blocked(&self, now: Instant) -> bool {
        self.blocked_until.is_some_and(|t| now < t)
            || self.burst_blocked_until.is_some_and(|t| now < t)
    }

    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_request_at)
    }
}
