use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::guard::GuardPolicy;
use crate::identity::IdentityConfig;
use crate::server::CorsPolicy;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub listen: Option<String>,

    /// Directory to write JSONL logs (app/access/events).
    /// Default: ./logs
    pub log_dir: Option<PathBuf>,

    pub max_body_bytes: Option<usize>,

    /// Poll interval for the guard section reload (seconds)
    pub hot_reload_secs: Option<u64>,

    pub identity: IdentityConfig,

    /// Browser origins allowed to call the API. Fixed at startup.
    pub cors: CorsPolicy,

    pub guard: GuardPolicy,
}

/// Only the reloadable part of the file.
#[derive(Debug, Default, Deserialize)]
struct GuardSection {
    #[serde(default)]
    guard: GuardPolicy,
}

impl AppConfig {
    pub fn listen_addr(&self) -> String {
        self.listen
            .clone()
            .unwrap_or_else(|| "0.0.0.0:3001".to_string())
    }

    pub fn max_body_bytes(&self) -> usize {
        self.max_body_bytes.unwrap_or(5 * 1024)
    }

    pub fn hot_reload_interval_secs(&self) -> u64 {
        self.hot_reload_secs.unwrap_or(3).max(1)
    }

    pub fn log_dir_path(&self) -> PathBuf {
        self.log_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("logs"))
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        let cfg: AppConfig = serde_yaml::from_str(text).context("parse config yaml")?;
        cfg.cors.validate().context("invalid cors section")?;
        cfg.guard.validate().context("invalid guard policy")?;
        Ok(cfg)
    }

    /// Reads, parses and validates the file, resolving relative paths
    /// against its directory.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config failed: {}", path.display()))?;
        let mut cfg = Self::from_yaml(&text)
            .with_context(|| format!("load config failed: {}", path.display()))?;
        cfg.resolve_paths(path.parent().unwrap_or_else(|| Path::new(".")));
        Ok(cfg)
    }

    /// Resolve all relative paths in config based on the directory containing the config file.
    pub fn resolve_paths(&mut self, base_dir: &Path) {
        if let Some(p) = &self.log_dir {
            self.log_dir = Some(resolve_path(base_dir, p));
        }
    }
}

/// Loads just the `guard` section, for hot reload.
pub fn load_guard_policy(path: &Path) -> Result<GuardPolicy> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read config failed: {}", path.display()))?;
    let section: GuardSection = serde_yaml::from_str(&text)
        .with_context(|| format!("parse guard section failed: {}", path.display()))?;
    section.guard.validate()?;
    Ok(section.guard)
}

fn resolve_path(base_dir: &Path, p: &Path) -> PathBuf {
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base_dir.join(p)
    }
}
