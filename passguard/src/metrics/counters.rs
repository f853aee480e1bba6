use once_cell::sync::Lazy;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, register_int_gauge,
    HistogramVec, IntCounter, IntCounterVec, IntGauge,
};

pub static REQ_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "passguard_http_requests_total",
        "Total HTTP requests by route and status code",
        &["route", "code"]
    )
        .expect("register passguard_http_requests_total")
});

pub static REQ_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    let buckets = vec![0.0005, 0.001, 0.002, 0.005, 0.01, 0.02, 0.05, 0.1, 0.2, 0.5, 1.0];
    register_histogram_vec!(
        "passguard_http_request_duration_seconds",
        "Request handling duration in seconds",
        &["route"],
        buckets
    )
        .expect("register passguard_http_request_duration_seconds")
});

pub static VERDICTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "passguard_guard_verdicts_total",
        "Guard verdicts by kind",
        &["kind"]
    )
        .expect("register passguard_guard_verdicts_total")
});

pub static UNRESOLVED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "passguard_guard_unresolved_identity_total",
        "Requests admitted because no identity could be determined"
    )
        .expect("register passguard_guard_unresolved_identity_total")
});

pub static FAULTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "passguard_guard_faults_total",
        "Internal guard failures that were admitted",
        &["stage"]
    )
        .expect("register passguard_guard_faults_total")
});

pub static TRACKED_CLIENTS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "passguard_guard_tracked_clients",
        "Client records currently held"
    )
        .expect("register passguard_guard_tracked_clients")
});

pub static EVICTIONS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "passguard_guard_evictions_total",
        "Idle client records removed by the sweeper"
    )
        .expect("register passguard_guard_evictions_total")
});

pub static GENERATED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "passguard_generated_total",
        "Secrets generated by mode",
        &["mode"]
    )
        .expect("register passguard_generated_total")
});

#[inline]
pub fn on_req_end(route: &str, code: u16, secs: f64) {
    REQ_TOTAL
        .with_label_values(&[route, code.to_string().as_str()])
        .inc();
    REQ_DURATION.with_label_values(&[route]).observe(secs);
}

#[inline]
pub fn inc_verdict(kind: &str) {
    VERDICTS_TOTAL.with_label_values(&[kind]).inc();
}

#[inline]
pub fn inc_unresolved() {
    UNRESOLVED_TOTAL.inc();
}

#[inline]
pub fn inc_guard_fault(stage: &str) {
    FAULTS_TOTAL.with_label_values(&[stage]).inc();
}

#[inline]
pub fn set_tracked_clients(n: usize) {
    TRACKED_CLIENTS.set(i64::try_from(n).unwrap_or(i64::MAX));
}

#[inline]
pub fn add_evictions(n: usize) {
    EVICTIONS_TOTAL.inc_by(n as u64);
}

#[inline]
pub fn inc_generated(mode: &str, n: usize) {
    GENERATED_TOTAL.with_label_values(&[mode]).inc_by(n as u64);
}
