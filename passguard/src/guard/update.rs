use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use pingora::server::ShutdownWatch;
use pingora_core::services::background::BackgroundService;

use super::engine::AbuseGuard;
use crate::config::load_guard_policy;

/// Watches the config file and swaps in a new guard policy when it changes.
pub struct PolicyUpdater {
    guard: AbuseGuard,
    config_path: PathBuf,
    interval: Duration,
}

impl PolicyUpdater {
    pub fn new(guard: AbuseGuard, config_path: PathBuf, interval: Duration) -> Self {
        Self {
            guard,
            config_path,
            interval,
        }
    }

    /// Reloads if the mtime moved past `last_mtime`. Returns the mtime seen.
    async fn poll(&self, last_mtime: Option<SystemTime>) -> Option<SystemTime> {
        let meta = match tokio::fs::metadata(&self.config_path).await {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!("config metadata error: {}", e);
                return last_mtime;
            }
        };
        let mtime = match meta.modified() {
            Ok(t) => t,
            Err(_) => return last_mtime,
        };
        if last_mtime.map(|x| x >= mtime).unwrap_or(false) {
            return last_mtime;
        }

        match load_guard_policy(&self.config_path) {
            Ok(policy) => {
                if *self.guard.policy() != policy {
                    self.guard.swap_policy(policy);
                    tracing::info!("guard policy reloaded");
                }
            }
            Err(e) => {
                tracing::error!("guard policy reload failed (keep old): {:#}", e);
            }
        }
        Some(mtime)
    }
}

#[async_trait]
impl BackgroundService for PolicyUpdater {
    async fn start(&self, mut shutdown: ShutdownWatch) {
        // startup already loaded the current file
        let mut last_mtime = tokio::fs::metadata(&self.config_path)
            .await
            .and_then(|m| m.modified())
            .ok();
        let mut ticker = tokio::time::interval(self.interval);

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    tracing::info!("policy updater shutdown");
                    return;
                }
                _ = ticker.tick() => {
                    last_mtime = self.poll(last_mtime).await;
                }
            }
        }
    }
}
