//! Cost accounting primitives.
//!
//! An [`Enforcer`] pairs a [`LimitManager`] (the policy) with a [`Tracker`]
//! (the running total). Every call to [`Enforcer::add`] charges the tracker
//! unconditionally and reports whether the new total breaches the current
//! limit. Stopping further work is left to the caller.

use crate::error::Error;
use std::sync::Arc;

pub mod enforcer;
pub mod limit_manager;
pub mod reporter;
pub mod tracker;

pub use enforcer::{Enforcer, EnforcerOptions};
pub use limit_manager::{
    DynamicLimitManager, LimitManager, LimitManagerOptions, StaticLimitManager, ValidateLimitFn,
};
pub use reporter::{EnforcerReporter, NoopEnforcerReporter, PrometheusEnforcerReporter};
pub use tracker::{AtomicTracker, NoopTracker, Tracker};

/// Signed resource units. Positive values consume budget, negative values
/// release it.
pub type Cost = f64;

/// A threshold and whether breaching it is reported.
///
/// A disabled limit still lets the tracker accumulate; only the error is
/// suppressed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Limit {
    pub threshold: Cost,
    pub enabled: bool,
}

impl Limit {
    pub fn new(threshold: Cost) -> Self {
        Self {
            threshold,
            enabled: true,
        }
    }

    pub fn disabled() -> Self {
        Self {
            threshold: Cost::MAX,
            enabled: false,
        }
    }

    /// Returns true when `cost` should be reported as over this limit.
    #[inline]
    pub fn is_exceeded_by(&self, cost: Cost) -> bool {
        self.enabled && cost >= self.threshold
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.threshold.is_nan() {
            return Err(Error::InvalidLimit("threshold must be a number".to_string()));
        }
        Ok(())
    }
}

impl Default for Limit {
    fn default() -> Self {
        Self::disabled()
    }
}

/// Outcome of charging or inspecting an enforcer.
///
/// `cost` is always the cumulative total, never the delta just added.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Report {
    pub cost: Cost,
    pub error: Option<Error>,
}

impl Report {
    pub fn new(cost: Cost) -> Self {
        Self { cost, error: None }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Anything that can be charged cost and inspected.
///
/// Implemented by [`Enforcer`] and by
/// [`PerQueryEnforcer`](crate::per_query::PerQueryEnforcer), so streaming
/// wrappers can be bound to either.
pub trait CostEnforcer: Send + Sync {
    fn add(&self, cost: Cost) -> Report;

    fn state(&self) -> (Report, Limit);
}

impl<T: CostEnforcer + ?Sized> CostEnforcer for &T {
    fn add(&self, cost: Cost) -> Report {
        (**self).add(cost)
    }

    fn state(&self) -> (Report, Limit) {
        (**self).state()
    }
}

impl<T: CostEnforcer + ?Sized> CostEnforcer for Arc<T> {
    fn add(&self, cost: Cost) -> Report {
        (**self).add(cost)
    }

    fn state(&self) -> (Report, Limit) {
        (**self).state()
    }
}
