use crate::error::{Error, Result};
use prometheus::{Encoder, Registry, TextEncoder};

/// Renders every metric in `registry` in the Prometheus text format.
pub fn export(registry: &Registry) -> Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = registry.gather();
    let mut buffer = Vec::new();

    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| Error::Metrics(format!("Failed to encode metrics: {}", e)))?;

    String::from_utf8(buffer)
        .map_err(|e| Error::Metrics(format!("Failed to convert metrics to string: {}", e)))
}

/// Current value of the gauge named `name`, if registered.
pub fn gauge_value(registry: &Registry, name: &str) -> Option<f64> {
    registry
        .gather()
        .iter()
        .find(|f| f.get_name() == name)
        .and_then(|f| f.get_metric().first().map(|m| m.get_gauge().get_value()))
}

/// Sample count and cumulative bucket counts (upper bound, count) of the
/// histogram named `name`, if registered.
pub fn histogram_buckets(registry: &Registry, name: &str) -> Option<(u64, Vec<(f64, u64)>)> {
    registry
        .gather()
        .iter()
        .find(|f| f.get_name() == name)
        .and_then(|f| f.get_metric().first().map(|m| m.get_histogram().clone()))
        .map(|h| {
            let buckets = h
                .get_bucket()
                .iter()
                .map(|b| (b.get_upper_bound(), b.get_cumulative_count()))
                .collect();
            (h.get_sample_count(), buckets)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::{Gauge, Histogram, HistogramOpts};

    #[test]
    fn test_export_and_lookup() {
        let registry = Registry::new();
        let gauge = Gauge::new("test_gauge", "A test gauge").unwrap();
        registry.register(Box::new(gauge.clone())).unwrap();
        gauge.set(3.5);

        let histogram = Histogram::with_opts(
            HistogramOpts::new("test_histogram", "A test histogram").buckets(vec![1.0, 10.0]),
        )
        .unwrap();
        registry.register(Box::new(histogram.clone())).unwrap();
        histogram.observe(0.5);
        histogram.observe(5.0);

        let text = export(&registry).unwrap();
        assert!(text.contains("test_gauge 3.5"));
        assert!(text.contains("test_histogram_bucket"));

        assert_eq!(gauge_value(&registry, "test_gauge"), Some(3.5));
        assert_eq!(gauge_value(&registry, "missing"), None);

        let (count, buckets) = histogram_buckets(&registry, "test_histogram").unwrap();
        assert_eq!(count, 2);
        assert_eq!(buckets, vec![(1.0, 1), (10.0, 2)]);
    }
}
