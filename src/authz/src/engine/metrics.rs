//! Prometheus-style metrics for decision calls

use parking_lot::RwLock;
use std::time::Duration;

/// Maximum latency samples kept for percentile calculation
const MAX_SAMPLES: usize = 10_000;

/// Samples dropped at once when the buffer overflows
const DRAIN_SAMPLES: usize = 1_000;

/// Engine decision metrics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineMetrics {
    /// Decision calls (`is_allowed` or one `check_resources` entry)
    pub total_requests: u64,

    /// Action outcomes that were allowed
    pub allowed_actions: u64,

    /// Action outcomes that were denied
    pub denied_actions: u64,

    /// Requests for a resource kind with no policy
    pub unknown_kind_requests: u64,

    /// Latency percentiles (p50, p90, p95, p99, p99.9)
    pub latency_p50_ms: f64,
    pub latency_p90_ms: f64,
    pub latency_p95_ms: f64,
    pub latency_p99_ms: f64,
    pub latency_p999_ms: f64,

    /// Average latency
    pub avg_latency_ms: f64,
}

impl EngineMetrics {
    /// Share of action outcomes that were allowed
    pub fn allow_rate(&self) -> f64 {
        let total = self.allowed_actions + self.denied_actions;
        if total == 0 {
            0.0
        } else {
            self.allowed_actions as f64 / total as f64
        }
    }
}

/// Thread-safe metrics collector
#[derive(Debug)]
pub struct MetricsCollector {
    metrics: RwLock<EngineMetrics>,
    latency_samples: RwLock<Vec<f64>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            metrics: RwLock::new(EngineMetrics::default()),
            latency_samples: RwLock::new(Vec::with_capacity(MAX_SAMPLES)),
        }
    }

    /// Record one decision call and its per-action outcomes
    pub fn record_request(&self, allowed: usize, denied: usize) {
        let mut metrics = self.metrics.write();
        metrics.total_requests += 1;
        metrics.allowed_actions += allowed as u64;
        metrics.denied_actions += denied as u64;
    }

    /// Record a request whose resource kind has no policy
    pub fn record_unknown_kind(&self) {
        self.metrics.write().unknown_kind_requests += 1;
    }

    /// Record decision latency
    ///
    /// The sample buffer stays locked until the percentiles are published,
    /// so the snapshot always reflects the latest buffer.
    pub fn record_latency(&self, latency: Duration) {
        let latency_ms = latency.as_secs_f64() * 1000.0;

        let mut samples = self.latency_samples.write();
        samples.push(latency_ms);
        if samples.len() > MAX_SAMPLES {
            samples.drain(0..DRAIN_SAMPLES);
        }

        let mut sorted = samples.clone();
        sorted.sort_by(f64::total_cmp);
        let avg = sorted.iter().sum::<f64>() / sorted.len() as f64;

        let mut metrics = self.metrics.write();
        metrics.avg_latency_ms = avg;
        metrics.latency_p50_ms = Self::percentile(&sorted, 0.50);
        metrics.latency_p90_ms = Self::percentile(&sorted, 0.90);
        metrics.latency_p95_ms = Self::percentile(&sorted, 0.95);
        metrics.latency_p99_ms = Self::percentile(&sorted, 0.99);
        metrics.latency_p999_ms = Self::percentile(&sorted, 0.999);
    }

    /// Current metrics snapshot
    pub fn get_metrics(&self) -> EngineMetrics {
        self.metrics.read().clone()
    }

    pub fn reset(&self) {
        // Same lock order as record_latency
        let mut samples = self.latency_samples.write();
        *self.metrics.write() = EngineMetrics::default();
        samples.clear();
    }

    /// Export metrics in Prometheus text format
    pub fn export_prometheus(&self) -> String {
        let metrics = self.metrics.read();

        format!(
            r#"# HELP authz_requests_total Total number of decision calls
# TYPE authz_requests_total counter
authz_requests_total {}

# HELP authz_allowed_total Number of allowed action outcomes
# TYPE authz_allowed_total counter
authz_allowed_total {}

# HELP authz_denied_total Number of denied action outcomes
# TYPE authz_denied_total counter
authz_denied_total {}

# HELP authz_unknown_kind_total Requests for resource kinds without a policy
# TYPE authz_unknown_kind_total counter
authz_unknown_kind_total {}

# HELP authz_latency_seconds Decision latency percentiles
# TYPE authz_latency_seconds summary
authz_latency_seconds{{quantile="0.5"}} {}
authz_latency_seconds{{quantile="0.9"}} {}
authz_latency_seconds{{quantile="0.95"}} {}
authz_latency_seconds{{quantile="0.99"}} {}
authz_latency_seconds{{quantile="0.999"}} {}
"#,
            metrics.total_requests,
            metrics.allowed_actions,
            metrics.denied_actions,
            metrics.unknown_kind_requests,
            metrics.latency_p50_ms / 1000.0,
            metrics.latency_p90_ms / 1000.0,
            metrics.latency_p95_ms / 1000.0,
            metrics.latency_p99_ms / 1000.0,
            metrics.latency_p999_ms / 1000.0,
        )
    }

    fn percentile(sorted: &[f64], p: f64) -> f64 {
        if sorted.is_empty() {
            return 0.0;
        }

        let idx = ((sorted.len() as f64) * p) as usize;
        sorted[idx.min(sorted.len() - 1)]
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
