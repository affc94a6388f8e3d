//! Metrics collection for observability

use prometheus::{
    Counter, CounterVec, HistogramVec, Opts, Registry,
    register_counter_vec_with_registry, register_counter_with_registry,
    register_histogram_vec_with_registry,
};
use std::sync::Arc;
use std::time::Duration;
use once_cell::sync::Lazy;

/// Global metrics registry
pub static METRICS: Lazy<Arc<Metrics>> = Lazy::new(|| {
    Arc::new(Metrics::new().expect("Failed to initialize metrics"))
});

/// Metrics collector
pub struct Metrics {
    registry: Registry,

    // Relay API metrics
    pub relay_requests: CounterVec,
    pub relay_request_duration: HistogramVec,

    // Gemini upstream metrics
    pub gemini_requests: CounterVec,
    pub gemini_request_duration: HistogramVec,

    // Image acquisition metrics
    pub image_acquisitions: CounterVec,

    // Session metrics
    pub sessions_created: Counter,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let registry = Registry::new();

        let relay_requests = register_counter_vec_with_registry!(
            Opts::new("relay_requests_total", "Total relay API requests"),
            &["endpoint", "status"],
            registry
        )?;

        let relay_request_duration = register_histogram_vec_with_registry!(
            "relay_request_duration_seconds",
            "Relay API request duration in seconds",
            &["endpoint"],
            registry
        )?;

        let gemini_requests = register_counter_vec_with_registry!(
            Opts::new("gemini_requests_total", "Total Gemini API calls"),
            &["operation", "status"],
            registry
        )?;

        let gemini_request_duration = register_histogram_vec_with_registry!(
            "gemini_request_duration_seconds",
            "Gemini API call duration in seconds",
            &["operation"],
            registry
        )?;

        let image_acquisitions = register_counter_vec_with_registry!(
            Opts::new("image_acquisitions_total", "Total image acquisitions"),
            &["source", "status"],
            registry
        )?;

        let sessions_created = register_counter_with_registry!(
            Opts::new("sessions_created_total", "Total chat sessions created"),
            registry
        )?;

        Ok(Self {
            registry,
            relay_requests,
            relay_request_duration,
            gemini_requests,
            gemini_request_duration,
            image_acquisitions,
            sessions_created,
        })
    }

    /// Record a finished relay request
    pub fn record_request(&self, endpoint: &str, status: u16, elapsed: Duration) {
        self.relay_requests
            .with_label_values(&[endpoint, &status.to_string()])
            .inc();
        self.relay_request_duration
            .with_label_values(&[endpoint])
            .observe(elapsed.as_secs_f64());
    }

    /// Record a Gemini API call
    pub fn record_gemini(&self, operation: &str, success: bool, elapsed: Duration) {
        let status = if success { "success" } else { "error" };
        self.gemini_requests
            .with_label_values(&[operation, status])
            .inc();
        self.gemini_request_duration
            .with_label_values(&[operation])
            .observe(elapsed.as_secs_f64());
    }

    /// Record an image acquisition attempt
    pub fn record_image(&self, source: &str, success: bool) {
        let status = if success { "success" } else { "error" };
        self.image_acquisitions
            .with_label_values(&[source, status])
            .inc();
    }

    /// Record a new session
    pub fn record_session_created(&self) {
        self.sessions_created.inc();
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_initialization() {
        let metrics = Metrics::new();
        assert!(metrics.is_ok());
    }

    #[test]
    fn test_record_request() {
        let metrics = Metrics::new().unwrap();
        metrics.record_request("query", 200, Duration::from_millis(12));
        metrics.record_request("query", 404, Duration::from_millis(1));

        let value = metrics
            .relay_requests
            .with_label_values(&["query", "404"])
            .get();
        assert_eq!(value, 1.0);
    }

    #[test]
    fn test_export_contains_registered_metrics() {
        let metrics = Metrics::new().unwrap();
        metrics.record_gemini("generate", true, Duration::from_millis(40));
        metrics.record_image("url", false);
        metrics.record_session_created();

        let text = metrics.export_prometheus();
        assert!(text.contains("gemini_requests_total"));
        assert!(text.contains("image_acquisitions_total"));
        assert!(text.contains("sessions_created_total 1"));
    }
}
