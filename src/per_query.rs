//! Per-query cost enforcement on top of a process-wide budget.
//!
//! A [`PerQueryEnforcerFactory`] holds one global [`Enforcer`] shared by every
//! query and a template enforcer describing the per-query policy. Each query
//! gets a [`PerQueryEnforcer`] that charges both. When the query ends the
//! per-query total is handed back to the global budget.

use crate::cost::{Cost, CostEnforcer, Enforcer, Limit, Report};
use crate::error::{Error, Result};
use prometheus::{Gauge, Histogram, HistogramOpts, Opts, Registry};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

pub const DEFAULT_METRICS_NAMESPACE: &str = "cost";

/// Exponential buckets starting at 1 and doubling, 20 of them.
pub fn default_datapoints_distro_buckets() -> Vec<f64> {
    (0..20).map(|i| 2f64.powi(i)).collect()
}

#[derive(Clone)]
pub struct PerQueryEnforcerOptions {
    value_buckets: Vec<f64>,
    registry: Registry,
    namespace: String,
}

impl PerQueryEnforcerOptions {
    pub fn new(registry: Registry) -> Self {
        Self {
            value_buckets: default_datapoints_distro_buckets(),
            registry,
            namespace: DEFAULT_METRICS_NAMESPACE.to_string(),
        }
    }

    /// Histogram buckets for the per-query datapoint distribution.
    pub fn with_datapoints_distro_buckets(mut self, buckets: Vec<f64>) -> Self {
        self.value_buckets = buckets;
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn datapoints_distro_buckets(&self) -> &[f64] {
        &self.value_buckets
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

impl fmt::Debug for PerQueryEnforcerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PerQueryEnforcerOptions")
            .field("value_buckets", &self.value_buckets)
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

impl Default for PerQueryEnforcerOptions {
    fn default() -> Self {
        Self::new(Registry::new())
    }
}

#[derive(Clone)]
struct PerQueryMetrics {
    global_datapoints: Gauge,
    per_query_datapoints_distro: Histogram,
}

impl PerQueryMetrics {
    fn build(opts: &PerQueryEnforcerOptions) -> Result<Self> {
        let global_datapoints = Gauge::with_opts(
            Opts::new("datapoints", "Datapoints currently charged to the global budget")
                .namespace(opts.namespace.as_str())
                .subsystem("global"),
        )?;

        let per_query_datapoints_distro = Histogram::with_opts(
            HistogramOpts::new(
                "datapoints_distro",
                "Distribution of datapoints charged per query",
            )
            .namespace(opts.namespace.as_str())
            .subsystem("per_query")
            .buckets(opts.value_buckets.clone()),
        )?;

        Ok(Self {
            global_datapoints,
            per_query_datapoints_distro,
        })
    }

    fn register(&self, registry: &Registry) -> Result<()> {
        registry.register(Box::new(self.global_datapoints.clone()))?;
        registry.register(Box::new(self.per_query_datapoints_distro.clone()))?;
        Ok(())
    }
}

impl fmt::Debug for PerQueryMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PerQueryMetrics")
            .field("global_datapoints", &self.global_datapoints.get())
            .finish_non_exhaustive()
    }
}

/// Builds [`PerQueryEnforcer`]s that share one global enforcer.
#[derive(Debug)]
pub struct PerQueryEnforcerFactory {
    global: Arc<Enforcer>,
    local: Enforcer,
    metrics: PerQueryMetrics,
}

impl PerQueryEnforcerFactory {
    /// `global` is shared by every enforcer this factory builds. Only the
    /// policy of `local` matters: it is forked with a zeroed total for each
    /// query.
    pub fn new(
        global: Arc<Enforcer>,
        local: Enforcer,
        opts: Option<PerQueryEnforcerOptions>,
    ) -> Result<Self> {
        let opts = opts.unwrap_or_default();
        let metrics = PerQueryMetrics::build(&opts)?;
        metrics.register(&opts.registry)?;

        debug!(
            "Created per-query enforcer factory (namespace {}, global limit {:?}, per-query limit {:?})",
            opts.namespace,
            global.state().1,
            local.state().1
        );

        Ok(Self {
            global,
            local,
            metrics,
        })
    }

    /// A fresh per-query enforcer bound to the shared global enforcer.
    pub fn new_enforcer(&self) -> PerQueryEnforcer {
        PerQueryEnforcer {
            local: self.local.fork(),
            global: Arc::clone(&self.global),
            metrics: self.metrics.clone(),
            breached: AtomicBool::new(false),
        }
    }

    pub fn global_enforcer(&self) -> &Arc<Enforcer> {
        &self.global
    }
}

lazy_static::lazy_static! {
    static ref NOOP_FACTORY: PerQueryEnforcerFactory = PerQueryEnforcerFactory {
        global: Arc::new(Enforcer::noop()),
        local: Enforcer::noop(),
        metrics: PerQueryMetrics::build(&PerQueryEnforcerOptions::default())
            .expect("default per-query metric options are valid"),
    };
}

/// A shared factory whose enforcers track nothing and never error.
pub fn noop_per_query_enforcer_factory() -> &'static PerQueryEnforcerFactory {
    &NOOP_FACTORY
}

/// Enforces a per-query budget and the shared global budget together.
///
/// Dropping the enforcer returns its per-query total to the global budget, so
/// a query that ends by error or cancellation cannot leak budget.
/// [`PerQueryEnforcer::release`] does the same thing explicitly.
#[derive(Debug)]
pub struct PerQueryEnforcer {
    local: Enforcer,
    global: Arc<Enforcer>,
    metrics: PerQueryMetrics,
    breached: AtomicBool,
}

impl PerQueryEnforcer {
    /// Charges both budgets. A per-query breach is reported in preference to
    /// a global one. On a global breach the returned cost is the global
    /// total.
    /// A non-finite cost charges neither budget.
    pub fn add(&self, cost: Cost) -> Report {
        if !cost.is_finite() {
            return self.local.add(cost);
        }

        // Each side is individually atomic; the pair is not.
        let local_r = self.local.add(cost);
        let global_r = self.global.add(cost);

        if let Some(err) = local_r.error {
            if self.first_breach() {
                warn!("Query exceeded per-query cost limit: {}", err);
            } else {
                debug!("Query still over per-query cost limit: {}", err);
            }
            return Report {
                cost: local_r.cost,
                error: Some(Error::PerQueryLimitExceeded(Box::new(err))),
            };
        }

        if let Some(err) = global_r.error {
            if self.first_breach() {
                warn!("Query exceeded global cost limit: {}", err);
            } else {
                debug!("Query still over global cost limit: {}", err);
            }
            return Report {
                cost: global_r.cost,
                error: Some(Error::GlobalLimitExceeded(Box::new(err))),
            };
        }

        Report::new(local_r.cost)
    }

    /// This query's own total and policy.
    pub fn state(&self) -> (Report, Limit) {
        self.local.state()
    }

    /// Publishes the global total and records this query's total in the
    /// per-query distribution. Safe to call any number of times.
    pub fn report(&self) {
        let (global_r, _) = self.global.state();
        self.metrics.global_datapoints.set(global_r.cost);

        let (local_r, _) = self.local.state();
        self.metrics
            .per_query_datapoints_distro
            .observe(local_r.cost);
    }

    /// Returns this query's total to the global budget.
    pub fn release(self) {
        debug!("Releasing per-query cost {}", self.local.state().0.cost);
    }

    pub fn global_enforcer(&self) -> &Arc<Enforcer> {
        &self.global
    }

    pub fn local_enforcer(&self) -> &Enforcer {
        &self.local
    }

    /// True only for the first breach seen by this query.
    fn first_breach(&self) -> bool {
        !self.breached.swap(true, Ordering::Relaxed)
    }
}

impl Drop for PerQueryEnforcer {
    fn drop(&mut self) {
        let (r, _) = self.local.state();
        self.global.add(-r.cost);
    }
}

impl CostEnforcer for PerQueryEnforcer {
    #[inline]
    fn add(&self, cost: Cost) -> Report {
        PerQueryEnforcer::add(self, cost)
    }

    #[inline]
    fn state(&self) -> (Report, Limit) {
        PerQueryEnforcer::state(self)
    }
}
