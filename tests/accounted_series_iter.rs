mod common;

use common::{assert_cur_cost, new_test_enforcer, new_test_factory};
use query_cost::{
    AccountedSeriesIter, Cost, DataPoint, Enforcer, Error, Limit, SeriesIterator,
    VecSeriesIterator,
};

fn enforcer_with_limit(limit: Cost) -> Enforcer {
    new_test_enforcer(Limit::new(limit))
}

fn series_with_err(num_values: usize) -> VecSeriesIterator {
    VecSeriesIterator::with_sequence("failing", num_values)
        .with_error(Error::Series("test error".to_string()))
}

#[test]
fn test_next_adds_to_enforcer() {
    let enforcer = enforcer_with_limit(5.0);
    let mut iter = AccountedSeriesIter::new(VecSeriesIterator::with_sequence("s", 5), &enforcer);
    iter.next();
    assert_cur_cost(1.0, &enforcer);
}

#[test]
fn test_next_returns_all_values() {
    let enforcer = enforcer_with_limit(6.0);
    let mut iter = AccountedSeriesIter::new(VecSeriesIterator::with_sequence("s", 5), &enforcer);

    let mut values: Vec<DataPoint> = Vec::new();
    while iter.next() {
        let (dp, _, _) = iter.current();
        values.push(dp);
    }

    assert!(iter.err().is_none());
    assert_eq!(values.len(), 5);
    for (i, dp) in values.iter().enumerate() {
        assert_eq!(dp.value, i as f64);
    }
}

#[test]
fn test_next_sets_error_on_enforcer_error() {
    let enforcer = enforcer_with_limit(2.0);
    let mut iter = AccountedSeriesIter::new(VecSeriesIterator::with_sequence("s", 5), &enforcer);

    assert!(iter.next());
    assert!(iter.err().is_none());

    assert!(iter.next());
    assert_eq!(iter.err().unwrap().to_string(), "2 exceeds limit of 2");
}

#[test]
fn test_next_returns_false_after_enforcer_error() {
    let enforcer = enforcer_with_limit(2.0);
    let mut iter = AccountedSeriesIter::new(VecSeriesIterator::with_sequence("s", 5), &enforcer);

    iter.next();
    iter.next();
    assert_eq!(iter.err().unwrap().to_string(), "2 exceeds limit of 2");

    assert!(!iter.next());
    assert!(iter.inner_mut().next());
}

#[test]
fn test_next_delegates_on_wrapped_error() {
    let enforcer = enforcer_with_limit(5.0);
    let mut iter = AccountedSeriesIter::new(series_with_err(5), &enforcer);
    assert!(
        iter.next(),
        "the wrapped iterator returns true, so the accounted iterator should too"
    );
}

#[test]
fn test_err_prefers_wrapped_error_over_enforcer_error() {
    let enforcer = enforcer_with_limit(1.0);
    let mut iter = AccountedSeriesIter::new(series_with_err(5), &enforcer);
    iter.next();
    assert!(iter.is_halted());
    assert_eq!(iter.err(), Some(&Error::Series("test error".to_string())));
}

#[test]
fn test_err_returns_enforcer_error() {
    let enforcer = enforcer_with_limit(1.0);
    let mut iter = AccountedSeriesIter::new(VecSeriesIterator::with_sequence("s", 3), &enforcer);
    iter.next();
    assert_eq!(iter.err().unwrap().to_string(), "1 exceeds limit of 1");
}

#[test]
fn test_wraps_borrowed_iterator() {
    let enforcer = enforcer_with_limit(2.0);
    let mut wrapped = VecSeriesIterator::with_sequence("s", 5);
    {
        let mut iter = AccountedSeriesIter::new(&mut wrapped, &enforcer);
        while iter.next() {}
        assert!(iter.err().is_some());
    }
    assert_eq!(wrapped.remaining(), 3);
    assert!(wrapped.next());
    assert_eq!(wrapped.current().0.value, 2.0);
}

#[test]
fn test_per_query_enforcer_halts_on_global_budget() {
    let pef = new_test_factory(6.0, 100.0);
    let q1 = pef.new_enforcer();
    let q2 = pef.new_enforcer();

    let mut first = AccountedSeriesIter::new(VecSeriesIterator::with_sequence("a", 4), &q1);
    let mut read = 0;
    while first.next() {
        read += 1;
    }
    assert_eq!(read, 4);
    assert!(first.err().is_none());

    let mut second = AccountedSeriesIter::new(VecSeriesIterator::with_sequence("b", 4), &q2);
    let mut read = 0;
    while second.next() {
        read += 1;
    }
    assert_eq!(read, 2);
    assert_eq!(
        second.err().unwrap().to_string(),
        "exceeded global limit: 6 exceeds limit of 6"
    );

    drop(first);
    drop(second);
    q1.release();
    q2.release();
    assert_cur_cost(0.0, pef.global_enforcer());
}
