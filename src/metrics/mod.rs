//! Metrics collection for observability

use prometheus::{
    Counter, CounterVec, Histogram, HistogramOpts, Opts, Registry,
    register_counter_vec_with_registry, register_counter_with_registry,
    register_histogram_with_registry,
};
use std::sync::Arc;
use once_cell::sync::Lazy;

/// Global metrics registry
pub static METRICS: Lazy<Arc<Metrics>> = Lazy::new(|| {
    Arc::new(Metrics::new().expect("Failed to initialize metrics"))
});

/// Metrics collector
pub struct Metrics {
    registry: Registry,

    // Completion calls
    pub completion_requests: CounterVec,
    pub completion_duration: Histogram,

    // Token budget
    pub context_tokens: Histogram,
    pub messages_evicted: Counter,

    // Rate limiting
    pub rate_limit_allowed: Counter,
    pub rate_limit_rejected: Counter,

    // History persistence
    pub history_load_fallbacks: Counter,
    pub history_save_failures: Counter,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let completion_requests = register_counter_vec_with_registry!(
            Opts::new("chat_completion_requests_total", "Total completion requests"),
            &["outcome"],
            registry
        )?;

        let completion_duration = register_histogram_with_registry!(
            HistogramOpts::new(
                "chat_completion_duration_seconds",
                "Completion request duration in seconds"
            ),
            registry
        )?;

        let context_tokens = register_histogram_with_registry!(
            HistogramOpts::new(
                "chat_context_tokens",
                "Tokens in the conversation log after budget enforcement"
            )
            .buckets(vec![64.0, 256.0, 512.0, 1024.0, 2048.0, 4096.0, 8192.0, 16384.0]),
            registry
        )?;

        let messages_evicted = register_counter_with_registry!(
            Opts::new("chat_messages_evicted_total", "Messages evicted by the token budget"),
            registry
        )?;

        let rate_limit_allowed = register_counter_with_registry!(
            Opts::new("chat_rate_limit_allowed_total", "Requests admitted by the rate limiter"),
            registry
        )?;

        let rate_limit_rejected = register_counter_with_registry!(
            Opts::new("chat_rate_limit_rejected_total", "Requests rejected by the rate limiter"),
            registry
        )?;

        let history_load_fallbacks = register_counter_with_registry!(
            Opts::new(
                "chat_history_load_fallbacks_total",
                "History loads that fell back to a fresh log"
            ),
            registry
        )?;

        let history_save_failures = register_counter_with_registry!(
            Opts::new("chat_history_save_failures_total", "Failed history saves"),
            registry
        )?;

        Ok(Self {
            registry,
            completion_requests,
            completion_duration,
            context_tokens,
            messages_evicted,
            rate_limit_allowed,
            rate_limit_rejected,
            history_load_fallbacks,
            history_save_failures,
        })
    }

    /// Get the metrics registry for exporting
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Record a completion call
    pub fn record_completion(&self, outcome: &str, seconds: f64) {
        self.completion_requests.with_label_values(&[outcome]).inc();
        self.completion_duration.observe(seconds);
    }

    /// Record the result of a budget enforcement pass
    pub fn record_token_budget(&self, total_tokens: usize, evicted: usize) {
        self.context_tokens.observe(total_tokens as f64);
        if evicted > 0 {
            self.messages_evicted.inc_by(evicted as f64);
        }
    }

    /// Record rate limit event
    pub fn record_rate_limit(&self, allowed: bool) {
        if allowed {
            self.rate_limit_allowed.inc();
        } else {
            self.rate_limit_rejected.inc();
        }
    }

    pub fn record_history_load_fallback(&self) {
        self.history_load_fallbacks.inc();
    }

    pub fn record_history_save_failure(&self) {
        self.history_save_failures.inc();
    }

    /// Export metrics in Prometheus text format
    pub fn export_prometheus(&self) -> String {
        use prometheus::Encoder;

        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();

        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer).unwrap_or_default();

        String::from_utf8(buffer).unwrap_or_default()
    }
}
