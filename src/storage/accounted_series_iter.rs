use super::series::{DataPoint, SeriesIterator, TimeUnit};
use crate::cost::CostEnforcer;
use crate::error::Error;

/// Charges one unit of cost per datapoint pulled through it.
///
/// Once a charge breaches a limit the value that caused it is still handed
/// out, and every later `next` returns false without touching the wrapped
/// iterator. The wrapped iterator keeps its own cursor and error and can still
/// be driven directly through [`inner_mut`](Self::inner_mut).
pub struct AccountedSeriesIter<'a, I, E: ?Sized> {
    iter: I,
    enforcer: &'a E,
    enforcer_err: Option<Error>,
}

impl<'a, I, E> AccountedSeriesIter<'a, I, E>
where
    I: SeriesIterator,
    E: CostEnforcer + ?Sized,
{
    pub fn new(iter: I, enforcer: &'a E) -> Self {
        Self {
            iter,
            enforcer,
            enforcer_err: None,
        }
    }

    pub fn inner(&self) -> &I {
        &self.iter
    }

    pub fn inner_mut(&mut self) -> &mut I {
        &mut self.iter
    }

    pub fn into_inner(self) -> I {
        self.iter
    }

    /// True once the enforcer has stopped this wrapper.
    pub fn is_halted(&self) -> bool {
        self.enforcer_err.is_some()
    }
}

impl<'a, I, E> SeriesIterator for AccountedSeriesIter<'a, I, E>
where
    I: SeriesIterator,
    E: CostEnforcer + ?Sized,
{
    fn next(&mut self) -> bool {
        if self.enforcer_err.is_some() {
            return false;
        }

        if !self.iter.next() {
            return false;
        }

        let r = self.enforcer.add(1.0);
        if r.error.is_some() {
            self.enforcer_err = r.error;
        }
        true
    }

    fn current(&self) -> (DataPoint, TimeUnit, Option<&[u8]>) {
        self.iter.current()
    }

    /// The wrapped iterator's error wins over a limit error.
    fn err(&self) -> Option<&Error> {
        self.iter.err().or(self.enforcer_err.as_ref())
    }

    fn id(&self) -> &str {
        self.iter.id()
    }

    fn namespace(&self) -> &str {
        self.iter.namespace()
    }

    fn close(&mut self) {
        self.iter.close()
    }
}
