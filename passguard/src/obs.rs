use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::fmt::MakeWriter;

/// Two JSONL sinks: access + events
///
/// Active files:
/// - <log_dir>/access.jsonl
/// - <log_dir>/events.jsonl
///
/// Both roll hourly. The worker guards are shared by every clone and flush
/// when the last one is dropped.
#[derive(Clone)]
pub struct ObsSink {
    access: NonBlocking,
    events: NonBlocking,
    _guards: Arc<(WorkerGuard, WorkerGuard)>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccessLog {
    #[serde(rename = "@timestamp")]
    pub ts: DateTime<Utc>,
    pub request_id: String,
    pub method: String,
    pub path: String,
    pub status: u16,
    pub latency_ms: u64,
    pub identity: Option<String>,
    pub identity_source: Option<String>,
    /// Guard verdict kind, `None` for metrics scrapes and preflights.
    pub verdict: Option<&'static str>,
    pub user_agent: Option<String>,
    pub error: Option<String>,
}

/// One guard rejection or degraded admission.
#[derive(Debug, Clone, Serialize)]
pub struct GuardEvent {
    #[serde(rename = "@timestamp")]
    pub ts: DateTime<Utc>,
    pub request_id: String,
    pub identity: String,
    pub identity_source: String,
    pub kind: String,
    pub reason: String,
    pub retry_after_secs: Option<u64>,
    pub method: String,
    pub path: String,
}

#[derive(Serialize)]
struct Line<'a, T: Serialize> {
    dataset: &'static str,
    #[serde(flatten)]
    rec: &'a T,
}

impl ObsSink {
    pub fn new(log_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(log_dir)
            .with_context(|| format!("create log_dir failed: {}", log_dir.display()))?;

        let access_appender = tracing_appender::rolling::hourly(log_dir, "access.jsonl");
        let events_appender = tracing_appender::rolling::hourly(log_dir, "events.jsonl");

        let (access, ag) = tracing_appender::non_blocking(access_appender);
        let (events, eg) = tracing_appender::non_blocking(events_appender);

        Ok(Self {
            access,
            events,
            _guards: Arc::new((ag, eg)),
        })
    }

    pub fn write_access(&self, rec: &AccessLog) {
        write_line(&self.access, "access", rec);
    }

    pub fn write_event(&self, rec: &GuardEvent) {
        write_line(&self.events, "events", rec);
    }
}

fn write_line<T: Serialize>(writer: &NonBlocking, dataset: &'static str, rec: &T) {
    match serde_json::to_string(&Line { dataset, rec }) {
        Ok(json) => {
            let mut w = writer.make_writer();
            let _ = w.write_all(json.as_bytes());
            let _ = w.write_all(b"\n");
        }
        Err(e) => tracing::warn!(dataset, "serialize log line failed: {}", e),
    }
}
