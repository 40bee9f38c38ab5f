use std::net::SocketAddr;
use std::time::Instant;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total HTTP operations. Labels: operation, status.
pub const REQUESTS_TOTAL: &str = "roomd_requests_total";

/// Histogram: operation latency in seconds. Labels: operation.
pub const REQUEST_DURATION_SECONDS: &str = "roomd_request_duration_seconds";

/// Counter: candidates refused by the validator or the conflict checker. Labels: reason.
pub const ADMISSION_REJECTIONS_TOTAL: &str = "roomd_admission_rejections_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "roomd_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "roomd_wal_flush_batch_size";

/// Install the Prometheus exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}

/// Record one finished operation.
pub fn record_request(operation: &'static str, ok: bool, started: Instant) {
    let status = if ok { "ok" } else { "error" };
    metrics::counter!(REQUESTS_TOTAL, "operation" => operation, "status" => status).increment(1);
    metrics::histogram!(REQUEST_DURATION_SECONDS, "operation" => operation)
        .record(started.elapsed().as_secs_f64());
}
