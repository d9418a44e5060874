use parking_lot::Mutex;
use std::collections::HashMap;

/// Summary statistics for one named metric's recorded values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricSummary {
    pub count: usize,
    pub sum: f64,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

/// Collects scalar metrics under a name and reports summary statistics.
///
/// Guarded by a single [`parking_lot::Mutex`] since metrics are written from
/// every stage worker concurrently with the engine's own bookkeeping.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    values: Mutex<HashMap<String, Vec<f64>>>,
}

impl MetricsCollector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, metric_name: &str, value: f64) {
        let mut guard = self.values.lock();
        guard.entry(metric_name.to_string()).or_default().push(value);
    }

    #[must_use]
    pub fn summary(&self) -> HashMap<String, MetricSummary> {
        let guard = self.values.lock();
        guard
            .iter()
            .filter(|(_, values)| !values.is_empty())
            .map(|(name, values)| {
                let count = values.len();
                let sum: f64 = values.iter().sum();
                let mean = sum / count as f64;
                let min = values.iter().copied().fold(f64::INFINITY, f64::min);
                let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                (
                    name.clone(),
                    MetricSummary {
                        count,
                        sum,
                        mean,
                        min,
                        max,
                    },
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_aggregates_recorded_values() {
        let collector = MetricsCollector::new();
        collector.record("tokens", 10.0);
        collector.record("tokens", 20.0);
        collector.record("tokens", 30.0);

        let summary = collector.summary();
        let tokens = summary.get("tokens").expect("metric present");
        assert_eq!(tokens.count, 3);
        assert_eq!(tokens.sum, 60.0);
        assert_eq!(tokens.mean, 20.0);
        assert_eq!(tokens.min, 10.0);
        assert_eq!(tokens.max, 30.0);
    }

    #[test]
    fn unknown_metric_is_absent_from_summary() {
        let collector = MetricsCollector::new();
        assert!(collector.summary().get("missing").is_none());
    }
}
