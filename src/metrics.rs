//! Metrics collection and export module

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, Opts, Registry, TextEncoder};
use std::time::Instant;

/// Process-wide launch metrics
pub struct Metrics {
    registry: Registry,

    // Counters
    pub transactions_built: IntCounter,
    pub bundles_submitted: IntCounter,
    pub bundles_rejected: IntCounter,
    pub simulation_failures: IntCounter,
    pub poll_iterations: IntCounter,
    pub retry_attempts: IntCounter,

    // Histograms
    pub relay_latency: Histogram,
    pub poll_wait_seconds: Histogram,
}

impl Metrics {
    /// Create new metrics instance
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let transactions_built = IntCounter::with_opts(Opts::new(
            "transactions_built_total",
            "Signed transactions produced by the builder",
        ))?;

        let bundles_submitted = IntCounter::with_opts(Opts::new(
            "bundles_submitted_total",
            "Bundles accepted by the relay",
        ))?;

        let bundles_rejected = IntCounter::with_opts(Opts::new(
            "bundles_rejected_total",
            "Bundles rejected by the relay or lost in transport",
        ))?;

        let simulation_failures = IntCounter::with_opts(Opts::new(
            "simulation_failures_total",
            "Pre-submission simulations that reported an error",
        ))?;

        let poll_iterations = IntCounter::with_opts(Opts::new(
            "poll_iterations_total",
            "State checks performed by poll loops",
        ))?;

        let retry_attempts = IntCounter::with_opts(Opts::new(
            "retry_attempts_total",
            "Retries issued by the retry policy",
        ))?;

        let relay_latency = Histogram::with_opts(
            HistogramOpts::new("relay_latency_seconds", "Bundle submission round trip")
                .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.0, 5.0]),
        )?;

        let poll_wait_seconds = Histogram::with_opts(
            HistogramOpts::new("poll_wait_seconds", "Time until a polled condition was met")
                .buckets(vec![1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 300.0]),
        )?;

        registry.register(Box::new(transactions_built.clone()))?;
        registry.register(Box::new(bundles_submitted.clone()))?;
        registry.register(Box::new(bundles_rejected.clone()))?;
        registry.register(Box::new(simulation_failures.clone()))?;
        registry.register(Box::new(poll_iterations.clone()))?;
        registry.register(Box::new(retry_attempts.clone()))?;
        registry.register(Box::new(relay_latency.clone()))?;
        registry.register(Box::new(poll_wait_seconds.clone()))?;

        Ok(Self {
            registry,
            transactions_built,
            bundles_submitted,
            bundles_rejected,
            simulation_failures,
            poll_iterations,
            retry_attempts,
            relay_latency,
            poll_wait_seconds,
        })
    }

    /// Get the registry for exporting
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Prometheus text exposition of every registered metric
    pub fn render(&self) -> String {
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buffer) {
            tracing::warn!(error = %e, "Failed to encode metrics");
            return String::new();
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

/// Global metrics instance
pub fn metrics() -> &'static Metrics {
    static METRICS: once_cell::sync::Lazy<Metrics> = once_cell::sync::Lazy::new(|| {
        Metrics::new().expect("static metric definitions are valid")
    });
    &METRICS
}

/// Timer helper for measuring operation duration
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn observe_duration(&self, histogram: &Histogram) {
        histogram.observe(self.elapsed_secs());
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        metrics.bundles_submitted.inc();
        assert_eq!(metrics.bundles_submitted.get(), 1);
        assert_eq!(metrics.bundles_rejected.get(), 0);
    }

    #[test]
    fn test_render_contains_counters() {
        let metrics = Metrics::new().unwrap();
        metrics.simulation_failures.inc_by(2);
        let text = metrics.render();
        assert!(text.contains("simulation_failures_total 2"));
        assert!(text.contains("bundles_submitted_total"));
    }

    #[test]
    fn test_timer() {
        let metrics = Metrics::new().unwrap();
        let timer = Timer::start();
        timer.observe_duration(&metrics.relay_latency);
        assert_eq!(metrics.relay_latency.get_sample_count(), 1);
        assert!(timer.elapsed_secs() >= 0.0);
    }
}
