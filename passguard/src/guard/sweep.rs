use std::time::{Duration, Instant};

use async_trait::async_trait;
use pingora::server::ShutdownWatch;
use pingora_core::services::background::BackgroundService;

use super::engine::AbuseGuard;
use crate::metrics::counters;

/// Periodically drops idle client records.
pub struct Sweeper {
    guard: AbuseGuard,
    interval: Duration,
}

impl Sweeper {
    pub fn new(guard: AbuseGuard, interval: Duration) -> Self {
        Self { guard, interval }
    }

    pub fn sweep_once(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    /// One pass; returns how many records were evicted.
    pub fn sweep_at(&self, now: Instant) -> usize {
        let evicted = self.guard.sweep(now);
        let tracked = self.guard.store().len();

        counters::add_evictions(evicted);
        counters::set_tracked_clients(tracked);

        if evicted > 0 {
            tracing::info!(evicted, tracked, "swept idle clients");
        } else {
            tracing::debug!(tracked, "sweep found nothing to evict");
        }
        evicted
    }
}

#[async_trait]
impl BackgroundService for Sweeper {
    async fn start(&self, mut shutdown: ShutdownWatch) {
        let mut ticker = tokio::time::interval(self.interval);
        // first tick fires immediately; nothing can be idle yet
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    tracing::info!("sweeper shutdown");
                    return;
                }
                _ = ticker.tick() => {
                    self.sweep_once();
                }
            }
        }
    }
}
