#![allow(dead_code)]

use prometheus::Registry;
use query_cost::{
    AtomicTracker, Cost, CostEnforcer, Enforcer, Limit, PerQueryEnforcerFactory,
    PerQueryEnforcerOptions, Report, StaticLimitManager,
};
use std::sync::Arc;

pub fn new_test_enforcer(limit: Limit) -> Enforcer {
    Enforcer::new(
        Arc::new(StaticLimitManager::from_limit(limit)),
        Box::new(AtomicTracker::new()),
        None,
    )
}

pub fn new_test_factory(global: Cost, local: Cost) -> PerQueryEnforcerFactory {
    PerQueryEnforcerFactory::new(
        Arc::new(new_test_enforcer(Limit::new(global))),
        new_test_enforcer(Limit::new(local)),
        None,
    )
    .expect("factory with a private registry")
}

pub fn new_test_factory_with_registry(
    global: Cost,
    local: Cost,
    registry: &Registry,
    buckets: Vec<f64>,
) -> PerQueryEnforcerFactory {
    PerQueryEnforcerFactory::new(
        Arc::new(new_test_enforcer(Limit::new(global))),
        new_test_enforcer(Limit::new(local)),
        Some(PerQueryEnforcerOptions::new(registry.clone()).with_datapoints_distro_buckets(buckets)),
    )
    .expect("factory metrics register")
}

pub fn assert_cur_cost(expected: Cost, e: &impl CostEnforcer) {
    let (actual, _) = e.state();
    assert_eq!(actual, Report::new(expected));
}
