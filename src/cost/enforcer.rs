use super::{
    AtomicTracker, CostEnforcer, Cost, EnforcerReporter, Limit, LimitManager,
    NoopEnforcerReporter, NoopTracker, Report, StaticLimitManager, Tracker,
};
use crate::error::Error;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct EnforcerOptions {
    reporter: Arc<dyn EnforcerReporter>,
    cost_exceeded_message: String,
}

impl EnforcerOptions {
    pub fn new() -> Self {
        Self {
            reporter: Arc::new(NoopEnforcerReporter),
            cost_exceeded_message: String::new(),
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn EnforcerReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Text appended verbatim to every limit error, e.g. a hint on how to
    /// narrow the request.
    pub fn with_cost_exceeded_message(mut self, message: impl Into<String>) -> Self {
        self.cost_exceeded_message = message.into();
        self
    }

    pub fn cost_exceeded_message(&self) -> &str {
        &self.cost_exceeded_message
    }
}

impl Default for EnforcerOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// A limit policy paired with its own running total.
///
/// Not `Clone`: [`Enforcer::fork`] is the only way to derive a sibling, and it
/// always starts from zero.
pub struct Enforcer {
    limit_manager: Arc<dyn LimitManager>,
    tracker: Box<dyn Tracker>,
    opts: EnforcerOptions,
}

impl Enforcer {
    pub fn new(
        limit_manager: Arc<dyn LimitManager>,
        tracker: Box<dyn Tracker>,
        opts: Option<EnforcerOptions>,
    ) -> Self {
        Self {
            limit_manager,
            tracker,
            opts: opts.unwrap_or_default(),
        }
    }

    /// An enforcer that never tracks and never errors.
    pub fn noop() -> Self {
        Self::new(
            Arc::new(StaticLimitManager::from_limit(Limit::disabled())),
            Box::new(NoopTracker),
            None,
        )
    }

    /// Charges `cost` and reports the new cumulative total.
    ///
    /// The charge is never refused for taking the total past the threshold;
    /// that error is advisory. A non-finite cost is refused outright and
    /// leaves the total untouched.
    pub fn add(&self, cost: Cost) -> Report {
        if !cost.is_finite() {
            return Report {
                cost: self.tracker.current(),
                error: Some(Error::InvalidCost(cost)),
            };
        }

        let limit = self.limit_manager.limit();
        let total = self.tracker.add(cost);
        self.opts.reporter.report_current(total);

        if total >= limit.threshold {
            self.opts.reporter.report_over_limit(limit.enabled);
        }

        Report {
            cost: total,
            error: if limit.is_exceeded_by(total) {
                Some(self.limit_error(total, &limit))
            } else {
                None
            },
        }
    }

    /// Current total and limit. Never carries an error.
    pub fn state(&self) -> (Report, Limit) {
        (
            Report::new(self.tracker.current()),
            self.limit_manager.limit(),
        )
    }

    /// A new enforcer sharing this one's limit manager and options, with a
    /// zeroed atomic tracker. The tracker of `self` plays no part, so forking
    /// a noop enforcer still yields one that counts.
    pub fn fork(&self) -> Self {
        Self {
            limit_manager: Arc::clone(&self.limit_manager),
            tracker: Box::new(AtomicTracker::new()),
            opts: self.opts.clone(),
        }
    }

    pub fn limit_manager(&self) -> &Arc<dyn LimitManager> {
        &self.limit_manager
    }

    pub fn options(&self) -> &EnforcerOptions {
        &self.opts
    }

    fn limit_error(&self, cost: Cost, limit: &Limit) -> Error {
        Error::LimitExceeded {
            cost,
            threshold: limit.threshold,
            message: self.opts.cost_exceeded_message.clone(),
        }
    }
}

impl CostEnforcer for Enforcer {
    #[inline]
    fn add(&self, cost: Cost) -> Report {
        Enforcer::add(self, cost)
    }

    #[inline]
    fn state(&self) -> (Report, Limit) {
        Enforcer::state(self)
    }
}

impl fmt::Debug for Enforcer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Enforcer")
            .field("limit", &self.limit_manager.limit())
            .field("cost", &self.tracker.current())
            .finish()
    }
}
