//! Hierarchical cost enforcement for streaming queries.
//!
//! Every datapoint a query reads is charged to the query's own budget and to
//! a budget shared by the whole process. Reads stop as soon as either budget
//! is used up, and a finished query hands its share back to the process.
//!
//! ```
//! use query_cost::{AccountedSeriesIter, LimitsConfig, SeriesIterator, VecSeriesIterator};
//!
//! let config = LimitsConfig::from_json_str(
//!     r#"{ "perQuery": { "maxFetchedDatapoints": 3 }, "global": { "maxFetchedDatapoints": 100 } }"#,
//! )
//! .unwrap();
//! let engine = config.build(&prometheus::Registry::new()).unwrap();
//!
//! let query = engine.factory.new_enforcer();
//! let mut series = AccountedSeriesIter::new(VecSeriesIterator::with_sequence("cpu", 10), &query);
//! let mut read = 0;
//! while series.next() {
//!     read += 1;
//! }
//! assert_eq!(read, 3);
//! assert!(series.err().unwrap().is_limit_exceeded());
//!
//! drop(series);
//! query.release();
//! assert_eq!(engine.factory.global_enforcer().state().0.cost, 0.0);
//! ```

pub mod config;
pub mod cost;
pub mod error;
pub mod metrics;
pub mod per_query;
pub mod storage;

pub use config::{CostEnforcement, LimitConfig, LimitsConfig};
pub use cost::{
    AtomicTracker, Cost, CostEnforcer, DynamicLimitManager, Enforcer, EnforcerOptions, Limit,
    LimitManager, LimitManagerOptions, Report, StaticLimitManager, Tracker,
};
pub use error::{Error, Result};
pub use per_query::{
    noop_per_query_enforcer_factory, PerQueryEnforcer, PerQueryEnforcerFactory,
    PerQueryEnforcerOptions,
};
pub use storage::{AccountedSeriesIter, DataPoint, SeriesIterator, TimeUnit, VecSeriesIterator};
