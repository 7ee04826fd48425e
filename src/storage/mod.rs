//! Series read paths and the cost-accounted wrapper around them.

pub mod accounted_series_iter;
pub mod series;

pub use accounted_series_iter::AccountedSeriesIter;
pub use series::{DataPoint, SeriesIterator, TimeUnit, VecSeriesIterator};
