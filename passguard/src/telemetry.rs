use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static APP_LOG_GUARD: OnceCell<WorkerGuard> = OnceCell::new();

const DEFAULT_FILTER: &str = "info";

/// Sets up the global subscriber.
///
/// - stdout: human readable lines.
/// - `<log_dir>/<service>.jsonl`: JSON lines, rolled hourly.
/// - `RUST_LOG` overrides the level, e.g. `info,passguard::guard=debug`.
///
/// The file writer's guard is parked in a static for the life of the process.
pub fn init_tracing(service: &str, log_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("create log_dir failed: {}", log_dir.display()))?;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let file_appender = tracing_appender::rolling::hourly(log_dir, format!("{service}.jsonl"));
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
    let _ = APP_LOG_GUARD.set(guard);

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_names(true);

    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(file_writer);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(json_layer)
        .try_init()
        .context("install tracing subscriber")?;

    Ok(())
}
