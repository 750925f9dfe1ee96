//! Prometheus metrics collection for the Camera service
//!
//! Tracks request counters, latency histograms, live stream gauge and the
//! outcome of stop requests.

use prometheus::{CounterVec, HistogramOpts, HistogramVec, IntCounter, IntGauge, Opts, Registry};
use std::sync::Arc;
use std::time::Instant;

/// Prometheus metrics for the Camera service
#[derive(Clone)]
pub struct ServiceMetrics {
    /// Total requests processed (labeled by RPC method and status)
    pub requests_total: CounterVec,

    /// Time until the RPC produced its response, in seconds (labeled by RPC method)
    pub request_duration_seconds: HistogramVec,

    /// Status feeds currently running
    pub active_streams: IntGauge,

    /// Status messages delivered to callers
    pub status_messages_total: IntCounter,

    /// Stream failures (labeled by error kind)
    pub stream_errors_total: CounterVec,

    /// Stop requests (labeled by outcome)
    pub stop_results_total: CounterVec,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl ServiceMetrics {
    /// Create new metrics with a custom registry
    pub fn new(registry: Registry) -> Result<Self, prometheus::Error> {
        let requests_total = CounterVec::new(
            Opts::new(
                "camera_provider_requests_total",
                "Total number of gRPC requests processed",
            ),
            &["method", "status"],
        )?;

        // StreamRTP waits for the camera handshake, so buckets reach into seconds
        let request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "camera_provider_request_duration_seconds",
                "Request latency distribution in seconds",
            )
            .buckets(vec![
                0.001, 0.005, 0.01, 0.05, // 1ms .. 50ms
                0.1, 0.25, 0.5, 1.0, // 100ms .. 1s
                2.5, 5.0, 10.0, 15.0, // handshake range
            ]),
            &["method"],
        )?;

        let active_streams = IntGauge::new(
            "camera_provider_active_streams",
            "Number of running status feeds",
        )?;

        let status_messages_total = IntCounter::new(
            "camera_provider_status_messages_total",
            "Total status messages delivered",
        )?;

        let stream_errors_total = CounterVec::new(
            Opts::new(
                "camera_provider_stream_errors_total",
                "Total stream start and runtime failures",
            ),
            &["kind"],
        )?;

        let stop_results_total = CounterVec::new(
            Opts::new(
                "camera_provider_stop_results_total",
                "Total stop requests by outcome",
            ),
            &["outcome"],
        )?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(request_duration_seconds.clone()))?;
        registry.register(Box::new(active_streams.clone()))?;
        registry.register(Box::new(status_messages_total.clone()))?;
        registry.register(Box::new(stream_errors_total.clone()))?;
        registry.register(Box::new(stop_results_total.clone()))?;

        Ok(Self {
            requests_total,
            request_duration_seconds,
            active_streams,
            status_messages_total,
            stream_errors_total,
            stop_results_total,
            registry: Arc::new(registry),
        })
    }

    /// Create with a fresh registry
    pub fn with_default_registry() -> Result<Self, prometheus::Error> {
        Self::new(Registry::new())
    }

    /// Record RPC request start (returns start time for duration calculation)
    pub fn record_request_start(&self) -> Instant {
        Instant::now()
    }

    /// Record RPC request completion
    pub fn record_request_end(&self, method: &str, status: &str, start: Instant) {
        self.requests_total
            .with_label_values(&[method, status])
            .inc();
        self.request_duration_seconds
            .with_label_values(&[method])
            .observe(start.elapsed().as_secs_f64());
    }

    pub fn record_stream_error(&self, kind: &str) {
        self.stream_errors_total.with_label_values(&[kind]).inc();
    }

    pub fn record_stop(&self, outcome: &str) {
        self.stop_results_total.with_label_values(&[outcome]).inc();
    }

    pub fn record_stream_start(&self) {
        self.active_streams.inc();
    }

    pub fn record_stream_end(&self) {
        self.active_streams.dec();
    }

    /// Render every metric in the Prometheus text exposition format
    pub fn render(&self) -> Result<String, prometheus::Error> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_accounting() {
        let metrics = ServiceMetrics::with_default_registry().unwrap();
        let start = metrics.record_request_start();
        metrics.record_request_end("StopRTPStream", "ok", start);
        metrics.record_stop("ok");

        assert_eq!(
            metrics
                .requests_total
                .with_label_values(&["StopRTPStream", "ok"])
                .get(),
            1.0
        );
        assert_eq!(metrics.stop_results_total.with_label_values(&["ok"]).get(), 1.0);
    }

    #[test]
    fn test_stream_gauge() {
        let metrics = ServiceMetrics::with_default_registry().unwrap();
        metrics.record_stream_start();
        metrics.record_stream_start();
        metrics.record_stream_end();
        assert_eq!(metrics.active_streams.get(), 1);
    }

    #[test]
    fn test_render() {
        let metrics = ServiceMetrics::with_default_registry().unwrap();
        metrics.record_stream_error("StartupFailure");
        let text = metrics.render().unwrap();
        assert!(text.contains("camera_provider_stream_errors_total"));
        assert!(text.contains("StartupFailure"));
    }

    #[test]
    fn test_independent_registries() {
        assert!(ServiceMetrics::with_default_registry().is_ok());
        assert!(ServiceMetrics::with_default_registry().is_ok());
    }
}
