use super::{Cost, Limit};
use crate::error::{Error, Result};
use parking_lot::RwLock;
use prometheus::{Gauge, Opts, Registry};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

pub type ValidateLimitFn = Arc<dyn Fn(&Limit) -> Result<()> + Send + Sync>;

/// Supplies the current [`Limit`] to every enforcer that shares it.
pub trait LimitManager: Send + Sync + fmt::Debug {
    fn limit(&self) -> Limit;

    /// Publishes the current limit to the metrics backend, if any.
    fn report(&self) {}

    /// Stops any further limit changes.
    fn close(&self) {}
}

#[derive(Clone)]
pub struct LimitManagerOptions {
    default_limit: Limit,
    validate_limit_fn: Option<ValidateLimitFn>,
    metrics: Option<(Registry, String)>,
}

impl LimitManagerOptions {
    pub fn new() -> Self {
        Self {
            default_limit: Limit::disabled(),
            validate_limit_fn: None,
            metrics: None,
        }
    }

    pub fn with_default_limit(mut self, limit: Limit) -> Self {
        self.default_limit = limit;
        self
    }

    /// Extra validation run after [`Limit::validate`] on every new limit.
    pub fn with_validate_limit_fn(mut self, f: ValidateLimitFn) -> Self {
        self.validate_limit_fn = Some(f);
        self
    }

    /// Registers `<namespace>_limit_threshold` and `<namespace>_limit_enabled`
    /// gauges on `registry`.
    pub fn with_metrics(mut self, registry: &Registry, namespace: &str) -> Self {
        self.metrics = Some((registry.clone(), namespace.to_string()));
        self
    }

    pub fn default_limit(&self) -> Limit {
        self.default_limit
    }

    fn validate(&self, limit: &Limit) -> Result<()> {
        limit.validate()?;
        if let Some(ref f) = self.validate_limit_fn {
            f(limit)?;
        }
        Ok(())
    }
}

impl Default for LimitManagerOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LimitManagerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LimitManagerOptions")
            .field("default_limit", &self.default_limit)
            .field("validate_limit_fn", &self.validate_limit_fn.is_some())
            .field("metrics", &self.metrics.as_ref().map(|(_, ns)| ns))
            .finish()
    }
}

#[derive(Clone)]
struct LimitMetrics {
    threshold: Gauge,
    enabled: Gauge,
}

impl LimitMetrics {
    fn register(registry: &Registry, namespace: &str) -> Result<Self> {
        let threshold = Gauge::with_opts(
            Opts::new("limit_threshold", "Current cost limit threshold").namespace(namespace),
        )?;
        registry.register(Box::new(threshold.clone()))?;

        let enabled = Gauge::with_opts(
            Opts::new("limit_enabled", "Whether the cost limit is enforced (1) or not (0)")
                .namespace(namespace),
        )?;
        registry.register(Box::new(enabled.clone()))?;

        Ok(Self { threshold, enabled })
    }

    fn from_options(opts: &LimitManagerOptions) -> Result<Option<Self>> {
        match opts.metrics {
            Some((ref registry, ref namespace)) => Ok(Some(Self::register(registry, namespace)?)),
            None => Ok(None),
        }
    }

    fn update(&self, limit: &Limit) {
        // An unbounded threshold is not useful on a dashboard.
        let threshold = if limit.threshold == Cost::MAX { 0.0 } else { limit.threshold };
        self.threshold.set(threshold);
        self.enabled.set(if limit.enabled { 1.0 } else { 0.0 });
    }
}

impl fmt::Debug for LimitMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LimitMetrics")
            .field("threshold", &self.threshold.get())
            .field("enabled", &self.enabled.get())
            .finish()
    }
}

/// A limit fixed at construction.
#[derive(Debug, Clone)]
pub struct StaticLimitManager {
    limit: Limit,
    metrics: Option<LimitMetrics>,
}

impl StaticLimitManager {
    pub fn new(opts: LimitManagerOptions) -> Result<Self> {
        let limit = opts.default_limit;
        opts.validate(&limit)?;
        Ok(Self {
            limit,
            metrics: LimitMetrics::from_options(&opts)?,
        })
    }

    /// Shorthand for a static manager with no validation hook or metrics.
    pub fn from_limit(limit: Limit) -> Self {
        Self {
            limit,
            metrics: None,
        }
    }
}

impl LimitManager for StaticLimitManager {
    #[inline]
    fn limit(&self) -> Limit {
        self.limit
    }

    fn report(&self) {
        if let Some(ref m) = self.metrics {
            m.update(&self.limit);
        }
    }
}

/// A limit that can be replaced at runtime by an administrative path.
///
/// Readers always observe a whole `Limit`, never a threshold from one update
/// paired with the enabled flag of another.
pub struct DynamicLimitManager {
    current: RwLock<Limit>,
    opts: LimitManagerOptions,
    metrics: Option<LimitMetrics>,
    closed: AtomicBool,
}

impl DynamicLimitManager {
    pub fn new(opts: LimitManagerOptions) -> Result<Self> {
        let limit = opts.default_limit;
        opts.validate(&limit)?;
        let metrics = LimitMetrics::from_options(&opts)?;
        Ok(Self {
            current: RwLock::new(limit),
            opts,
            metrics,
            closed: AtomicBool::new(false),
        })
    }

    /// Validates and installs `limit`. Enforcers sharing this manager see the
    /// new limit on their next call; accumulated cost is untouched.
    pub fn update(&self, limit: Limit) -> Result<()> {
        if let Err(e) = self.opts.validate(&limit) {
            warn!("Rejected cost limit update {:?}: {}", limit, e);
            return Err(e);
        }

        // `close` flips the flag under the same lock.
        let mut current = self.current.write();
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::Closed);
        }
        let previous = std::mem::replace(&mut *current, limit);
        drop(current);

        info!(
            "Cost limit updated: threshold {} -> {}, enabled {} -> {}",
            previous.threshold, limit.threshold, previous.enabled, limit.enabled
        );
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl LimitManager for DynamicLimitManager {
    #[inline]
    fn limit(&self) -> Limit {
        *self.current.read()
    }

    fn report(&self) {
        if let Some(ref m) = self.metrics {
            m.update(&self.limit());
        }
    }

    fn close(&self) {
        let _guard = self.current.write();
        self.closed.store(true, Ordering::Release);
    }
}

impl fmt::Debug for DynamicLimitManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicLimitManager")
            .field("current", &self.limit())
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_static_limit_manager() {
        let opts = LimitManagerOptions::new().with_default_limit(Limit::new(5.0));
        let manager = StaticLimitManager::new(opts).unwrap();
        assert_eq!(manager.limit(), Limit::new(5.0));
    }

    #[test]
    fn test_static_limit_manager_rejects_invalid_default() {
        let opts = LimitManagerOptions::new().with_default_limit(Limit::new(Cost::NAN));
        assert!(StaticLimitManager::new(opts).is_err());
    }

    #[test]
    fn test_dynamic_update() {
        let manager = DynamicLimitManager::new(
            LimitManagerOptions::new().with_default_limit(Limit::new(5.0)),
        )
        .unwrap();

        manager.update(Limit::new(50.0)).unwrap();
        assert_eq!(manager.limit(), Limit::new(50.0));

        manager
            .update(Limit {
                threshold: 50.0,
                enabled: false,
            })
            .unwrap();
        assert!(!manager.limit().enabled);
    }

    #[test]
    fn test_dynamic_update_runs_validation_hook() {
        let validate: ValidateLimitFn = Arc::new(|limit: &Limit| {
            if limit.threshold < 0.0 {
                return Err(Error::InvalidLimit("negative threshold".to_string()));
            }
            Ok(())
        });
        let manager = DynamicLimitManager::new(
            LimitManagerOptions::new()
                .with_default_limit(Limit::new(5.0))
                .with_validate_limit_fn(validate),
        )
        .unwrap();

        assert!(manager.update(Limit::new(-1.0)).is_err());
        assert_eq!(manager.limit(), Limit::new(5.0));
    }

    #[test]
    fn test_closed_manager_rejects_updates() {
        let manager = DynamicLimitManager::new(LimitManagerOptions::new()).unwrap();
        manager.close();
        assert!(manager.is_closed());
        assert_eq!(manager.update(Limit::new(1.0)), Err(Error::Closed));
        assert_eq!(manager.limit(), Limit::disabled());

        // A bad limit is still reported as such after close.
        assert!(matches!(
            manager.update(Limit::new(Cost::NAN)),
            Err(Error::InvalidLimit(_))
        ));
    }

    #[test]
    fn test_concurrent_reads_see_whole_limits() {
        let manager = Arc::new(
            DynamicLimitManager::new(
                LimitManagerOptions::new().with_default_limit(Limit::new(1.0)),
            )
            .unwrap(),
        );

        let writer = {
            let manager = Arc::clone(&manager);
            thread::spawn(move || {
                for i in 0..1000 {
                    // Odd thresholds are always enabled, even thresholds never.
                    let limit = Limit {
                        threshold: (i * 2 + 1) as Cost,
                        enabled: true,
                    };
                    manager.update(limit).unwrap();
                    manager
                        .update(Limit {
                            threshold: (i * 2) as Cost,
                            enabled: false,
                        })
                        .unwrap();
                }
            })
        };

        for _ in 0..5000 {
            let limit = manager.limit();
            let odd = (limit.threshold as u64) % 2 == 1;
            assert_eq!(odd, limit.enabled);
        }

        writer.join().unwrap();
    }

    #[test]
    fn test_report_publishes_gauges() {
        let registry = Registry::new();
        let manager = StaticLimitManager::new(
            LimitManagerOptions::new()
                .with_default_limit(Limit::new(42.0))
                .with_metrics(&registry, "test_static"),
        )
        .unwrap();
        manager.report();

        let families = registry.gather();
        let threshold = families
            .iter()
            .find(|f| f.get_name() == "test_static_limit_threshold")
            .expect("threshold gauge registered");
        assert_eq!(threshold.get_metric()[0].get_gauge().get_value(), 42.0);

        let enabled = families
            .iter()
            .find(|f| f.get_name() == "test_static_limit_enabled")
            .expect("enabled gauge registered");
        assert_eq!(enabled.get_metric()[0].get_gauge().get_value(), 1.0);
    }
}
