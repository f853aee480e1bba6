use prometheus::{Encoder, TextEncoder};

pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Renders the default registry in the text exposition format.
pub fn gather_as_text() -> String {
    let mf = prometheus::gather();
    let encoder = TextEncoder::new();
    let mut buf = Vec::new();
    if let Err(e) = encoder.encode(&mf, &mut buf) {
        tracing::warn!("metrics encode failed: {}", e);
    }
    String::from_utf8_lossy(&buf).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::counters;

    #[test]
    fn exposes_guard_metrics() {
        counters::inc_verdict("admit");
        counters::add_evictions(0);
        let text = gather_as_text();
        assert!(text.contains("passguard_guard_verdicts_total"));
        assert!(text.contains("passguard_guard_evictions_total"));
    }
}
