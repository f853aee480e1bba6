use clap::Parser;
use pingora::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use passguard::config::AppConfig;
use passguard::guard::sweep::Sweeper;
use passguard::guard::update::PolicyUpdater;
use passguard::guard::{AbuseGuard, MemoryStore};
use passguard::identity::IdentityResolver;
use passguard::server::{ApiState, ApiSvc};
use passguard::{obs, telemetry};

const DEFAULT_CONFIG: &str = "passguard.yaml";

#[derive(Debug, Parser)]
#[command(name = "passguard", version, about = "Password generator API with per-client abuse protection")]
struct Args {
    /// Path to passguard.yaml (relative paths inside it resolve against its directory)
    #[arg(long, default_value = DEFAULT_CONFIG)]
    config: PathBuf,
}

/// An explicit path is always used; the default one may be absent.
fn locate_config(p: PathBuf) -> Option<PathBuf> {
    if p.exists() || p != PathBuf::from(DEFAULT_CONFIG) {
        return Some(p);
    }

    let exe = std::env::current_exe().ok()?;
    let cand = exe.parent()?.join(DEFAULT_CONFIG);
    cand.exists().then_some(cand)
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let cfg_path = locate_config(args.config);
    let cfg = match &cfg_path {
        Some(p) => AppConfig::load(p)?,
        None => AppConfig::default(),
    };

    let log_dir = cfg.log_dir_path();
    telemetry::init_tracing("passguard", &log_dir)?;

    match &cfg_path {
        Some(p) => tracing::info!(config = %p.display(), "config loaded"),
        None => tracing::warn!("{} not found, running with built-in defaults", DEFAULT_CONFIG),
    }

    let obs = obs::ObsSink::new(&log_dir)?;

    if cfg.cors.allowed_origins.is_empty() {
        tracing::warn!("cors.allowed_origins is empty; cross-origin browser calls will be refused");
    } else {
        tracing::info!(origins = ?cfg.cors.allowed_origins, "cors allowlist");
    }

    let resolver = IdentityResolver::from_config(&cfg.identity);
    tracing::info!(strategy = resolver.strategy(), "client identity strategy");
    let guard = AbuseGuard::new(resolver, Arc::new(MemoryStore::new()), cfg.guard.clone());

    let mut my_server = Server::new(None)?;
    my_server.bootstrap();

    let api = background_service(
        "api",
        ApiSvc::new(
            cfg.listen_addr(),
            ApiState {
                guard: guard.clone(),
                cors: cfg.cors.clone(),
                obs: Some(obs),
                max_body_bytes: cfg.max_body_bytes(),
            },
        ),
    );
    my_server.add_service(api);

    // interval is fixed at startup; reloads only change the ttl
    let sweeper = background_service(
        "client-sweeper",
        Sweeper::new(guard.clone(), cfg.guard.sweep_interval()),
    );
    my_server.add_service(sweeper);

    if let Some(path) = cfg_path {
        let updater = background_service(
            "guard-policy-updater",
            PolicyUpdater::new(
                guard,
                path,
                Duration::from_secs(cfg.hot_reload_interval_secs()),
            ),
        );
        my_server.add_service(updater);
    }

    my_server.run_forever();
}
