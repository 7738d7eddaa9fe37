//! Prometheus metrics for authorization decisions and cache behavior.
//!
//! Metrics register on a lazy global registry; the host service exposes them
//! on its /metrics endpoint via [`gather_metrics`].

use prometheus::{
    register_counter_vec_with_registry, register_histogram_vec_with_registry, CounterVec, Encoder,
    HistogramVec, Registry, TextEncoder,
};

/// Global metrics registry
pub static REGISTRY: std::sync::LazyLock<Registry> = std::sync::LazyLock::new(Registry::new);

/// Authorization decisions by outcome ("allowed", "denied", "error")
pub static DECISIONS_TOTAL: std::sync::LazyLock<CounterVec> = std::sync::LazyLock::new(|| {
    register_counter_vec_with_registry!(
        "authz_decisions_total",
        "Total number of authorization decisions",
        &["outcome"],
        REGISTRY.clone()
    )
    .expect("Failed to register DECISIONS_TOTAL")
});

/// Effective-set evaluation duration
pub static EVALUATION_DURATION: std::sync::LazyLock<HistogramVec> = std::sync::LazyLock::new(|| {
    register_histogram_vec_with_registry!(
        "authz_evaluation_duration_seconds",
        "Effective permission set evaluation duration in seconds",
        &["path"],
        REGISTRY.clone()
    )
    .expect("Failed to register EVALUATION_DURATION")
});

/// Permission cache hits
pub static CACHE_HITS: std::sync::LazyLock<CounterVec> = std::sync::LazyLock::new(|| {
    register_counter_vec_with_registry!(
        "authz_cache_hits_total",
        "Total number of permission cache hits",
        &["cache_type"],
        REGISTRY.clone()
    )
    .expect("Failed to register CACHE_HITS")
});

/// Permission cache misses
pub static CACHE_MISSES: std::sync::LazyLock<CounterVec> = std::sync::LazyLock::new(|| {
    register_counter_vec_with_registry!(
        "authz_cache_misses_total",
        "Total number of permission cache misses",
        &["cache_type"],
        REGISTRY.clone()
    )
    .expect("Failed to register CACHE_MISSES")
});

/// Encode all registered metrics in the Prometheus text format.
pub fn gather_metrics() -> anyhow::Result<String> {
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_register_and_gather() {
        DECISIONS_TOTAL.with_label_values(&["allowed"]).inc();
        CACHE_HITS.with_label_values(&["permission"]).inc();
        CACHE_MISSES.with_label_values(&["permission"]).inc();

        let text = gather_metrics().expect("gather failed");
        assert!(text.contains("authz_decisions_total"));
        assert!(text.contains("authz_cache_hits_total"));
    }
}
