//! Limit configuration and wiring of the enforcement engine.

use crate::cost::{
    AtomicTracker, Cost, DynamicLimitManager, Enforcer, EnforcerOptions, Limit, LimitManager,
    LimitManagerOptions, PrometheusEnforcerReporter,
};
use crate::error::{Error, Result};
use crate::per_query::{PerQueryEnforcerFactory, PerQueryEnforcerOptions, DEFAULT_METRICS_NAMESPACE};
use prometheus::Registry;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// One budget. A non-positive `max_fetched_datapoints` disables enforcement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LimitConfig {
    pub max_fetched_datapoints: i64,
}

impl LimitConfig {
    pub fn new(max_fetched_datapoints: i64) -> Self {
        Self {
            max_fetched_datapoints,
        }
    }

    pub fn as_limit(&self) -> Limit {
        if self.max_fetched_datapoints > 0 {
            Limit::new(self.max_fetched_datapoints as Cost)
        } else {
            Limit::disabled()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LimitsConfig {
    pub per_query: LimitConfig,
    pub global: LimitConfig,
    pub datapoints_distro_buckets: Option<Vec<f64>>,
    pub metrics_namespace: String,
    pub cost_exceeded_message: Option<String>,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            per_query: LimitConfig::default(),
            global: LimitConfig::default(),
            datapoints_distro_buckets: None,
            metrics_namespace: DEFAULT_METRICS_NAMESPACE.to_string(),
            cost_exceeded_message: None,
        }
    }
}

impl LimitsConfig {
    pub fn from_json_str(s: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::Config(format!("failed to read {}: {}", path.as_ref().display(), e))
        })?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        if self.metrics_namespace.is_empty() {
            return Err(Error::Config("metricsNamespace must not be empty".to_string()));
        }

        if let Some(ref buckets) = self.datapoints_distro_buckets {
            if buckets.is_empty() {
                return Err(Error::Config(
                    "datapointsDistroBuckets must not be empty".to_string(),
                ));
            }
            if buckets.windows(2).any(|w| w[0] >= w[1]) {
                return Err(Error::Config(
                    "datapointsDistroBuckets must be strictly increasing".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Builds the global enforcer, the per-query factory and their limit
    /// managers, registering all metrics on `registry`.
    pub fn build(&self, registry: &Registry) -> Result<CostEnforcement> {
        self.validate()?;
        let ns = self.metrics_namespace.as_str();

        let global_limits = Arc::new(DynamicLimitManager::new(
            LimitManagerOptions::new()
                .with_default_limit(self.global.as_limit())
                .with_metrics(registry, &format!("{}_global", ns)),
        )?);
        let per_query_limits = Arc::new(DynamicLimitManager::new(
            LimitManagerOptions::new()
                .with_default_limit(self.per_query.as_limit())
                .with_metrics(registry, &format!("{}_per_query", ns)),
        )?);

        let mut enforcer_opts = EnforcerOptions::new();
        if let Some(ref message) = self.cost_exceeded_message {
            enforcer_opts = enforcer_opts.with_cost_exceeded_message(message.as_str());
        }

        let reporter = PrometheusEnforcerReporter::new(registry, &format!("{}_global_enforcer", ns))?;
        let global = Arc::new(Enforcer::new(
            global_limits.clone(),
            Box::new(AtomicTracker::new()),
            Some(enforcer_opts.clone().with_reporter(Arc::new(reporter))),
        ));
        let local = Enforcer::new(
            per_query_limits.clone(),
            Box::new(AtomicTracker::new()),
            Some(enforcer_opts),
        );

        let mut factory_opts = PerQueryEnforcerOptions::new(registry.clone()).with_namespace(ns);
        if let Some(ref buckets) = self.datapoints_distro_buckets {
            factory_opts = factory_opts.with_datapoints_distro_buckets(buckets.clone());
        }
        let factory = PerQueryEnforcerFactory::new(global, local, Some(factory_opts))?;

        info!(
            "Cost enforcement configured: global {:?}, per query {:?}",
            global_limits.limit(),
            per_query_limits.limit()
        );

        Ok(CostEnforcement {
            factory,
            global_limits,
            per_query_limits,
        })
    }
}

/// The assembled engine plus handles for changing limits at runtime.
#[derive(Debug)]
pub struct CostEnforcement {
    pub factory: PerQueryEnforcerFactory,
    pub global_limits: Arc<DynamicLimitManager>,
    pub per_query_limits: Arc<DynamicLimitManager>,
}

impl CostEnforcement {
    /// Publishes both limits to their gauges.
    pub fn report_limits(&self) {
        self.global_limits.report();
        self.per_query_limits.report();
    }
}
