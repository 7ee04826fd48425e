use super::Cost;
use crate::error::Result;
use prometheus::{Gauge, IntCounterVec, Opts, Registry};
use std::fmt::{self, Debug};

/// Observes an enforcer as cost is charged to it.
pub trait EnforcerReporter: Send + Sync + Debug {
    /// Called after every charge with the new cumulative cost.
    fn report_current(&self, cost: Cost);

    /// Called when a charge leaves the total at or over the threshold.
    /// `enabled` tells whether the breach was surfaced as an error.
    fn report_over_limit(&self, enabled: bool);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEnforcerReporter;

impl EnforcerReporter for NoopEnforcerReporter {
    #[inline]
    fn report_current(&self, _cost: Cost) {}

    #[inline]
    fn report_over_limit(&self, _enabled: bool) {}
}

#[derive(Clone)]
pub struct PrometheusEnforcerReporter {
    current: Gauge,
    over_limit: IntCounterVec,
}

impl PrometheusEnforcerReporter {
    /// Registers `<namespace>_current_cost` and `<namespace>_over_limit_total`.
    pub fn new(registry: &Registry, namespace: &str) -> Result<Self> {
        let current = Gauge::with_opts(
            Opts::new("current_cost", "Cumulative cost currently held by the enforcer")
                .namespace(namespace),
        )?;
        registry.register(Box::new(current.clone()))?;

        let over_limit = IntCounterVec::new(
            Opts::new("over_limit_total", "Charges that left the enforcer over its threshold")
                .namespace(namespace),
            &["enabled"],
        )?;
        registry.register(Box::new(over_limit.clone()))?;

        Ok(Self { current, over_limit })
    }
}

impl fmt::Debug for PrometheusEnforcerReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrometheusEnforcerReporter")
            .field("current", &self.current.get())
            .finish_non_exhaustive()
    }
}

impl EnforcerReporter for PrometheusEnforcerReporter {
    #[inline]
    fn report_current(&self, cost: Cost) {
        self.current.set(cost);
    }

    fn report_over_limit(&self, enabled: bool) {
        let label = if enabled { "true" } else { "false" };
        self.over_limit.with_label_values(&[label]).inc();
    }
}
