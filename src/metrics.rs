//! Metrics instrumentation
//!
//! Thin helpers over the `metrics` facade so call sites stay one-liners.
//! A recorder (Prometheus exporter, statsd, ...) is installed by the host
//! application; without one these are no-ops.

/// Counter helpers
pub mod counters {
    use crate::connection::Endpoint;

    /// A physical connection finished handshake + authentication
    pub fn connection_opened(endpoint: &Endpoint) {
        metrics::counter!("boltdriver_connections_opened_total", "endpoint" => endpoint.to_string())
            .increment(1);
    }

    /// A physical connection was shut down
    pub fn connection_closed(endpoint: &Endpoint) {
        metrics::counter!("boltdriver_connections_closed_total", "endpoint" => endpoint.to_string())
            .increment(1);
    }

    /// HELLO sent
    pub fn auth_attempted(scheme: &'static str) {
        metrics::counter!("boltdriver_auth_attempts_total", "scheme" => scheme).increment(1);
    }

    /// HELLO accepted
    pub fn auth_succeeded(scheme: &'static str) {
        metrics::counter!("boltdriver_auth_success_total", "scheme" => scheme).increment(1);
    }

    /// HELLO rejected
    pub fn auth_failed(scheme: &'static str) {
        metrics::counter!("boltdriver_auth_failures_total", "scheme" => scheme).increment(1);
    }

    /// A pooled connection was handed to a session
    pub fn pool_acquired(endpoint: &Endpoint, reused: bool) {
        let kind = if reused { "reused" } else { "opened" };
        metrics::counter!("boltdriver_pool_acquisitions_total",
            "endpoint" => endpoint.to_string(), "kind" => kind)
        .increment(1);
    }

    /// An acquire wait expired
    pub fn pool_exhausted(endpoint: &Endpoint) {
        metrics::counter!("boltdriver_pool_exhausted_total", "endpoint" => endpoint.to_string())
            .increment(1);
    }

    /// An idle connection aged out and was discarded
    pub fn pool_discarded_stale(endpoint: &Endpoint) {
        metrics::counter!("boltdriver_pool_stale_discards_total", "endpoint" => endpoint.to_string())
            .increment(1);
    }

    /// A RUN was accepted by the server
    pub fn query_started() {
        metrics::counter!("boltdriver_queries_total").increment(1);
    }

    /// A RUN, PULL or COMMIT drew a FAILURE
    pub fn query_failed(code: &str) {
        metrics::counter!("boltdriver_query_failures_total", "code" => code.to_string())
            .increment(1);
    }

    /// Records delivered to consumers
    pub fn records_streamed(count: u64) {
        metrics::counter!("boltdriver_records_streamed_total").increment(count);
    }
}

/// Histogram helpers
pub mod histograms {
    use crate::connection::Endpoint;

    /// Time spent waiting for a pool slot, in milliseconds
    pub fn acquire_wait(endpoint: &Endpoint, millis: u64) {
        metrics::histogram!("boltdriver_pool_acquire_wait_ms", "endpoint" => endpoint.to_string())
            .record(millis as f64);
    }

    /// Full query duration from RUN to summary, in milliseconds
    pub fn query_duration(millis: u64) {
        metrics::histogram!("boltdriver_query_duration_ms").record(millis as f64);
    }
}
