use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DataPoint {
    pub timestamp: u64,
    pub value: f64,
}

impl DataPoint {
    pub fn new(timestamp: u64, value: f64) -> Self {
        Self { timestamp, value }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeUnit {
    Second,
    #[default]
    Millisecond,
    Microsecond,
    Nanosecond,
}

/// Cursor over the datapoints of one series.
///
/// `next` advances and reports whether a value is available; `current` reads
/// it. Once `next` returns false, `err` tells whether the series ended
/// normally.
pub trait SeriesIterator {
    fn next(&mut self) -> bool;

    /// The value under the cursor. Only meaningful after `next` returned true.
    fn current(&self) -> (DataPoint, TimeUnit, Option<&[u8]>);

    fn err(&self) -> Option<&Error>;

    fn id(&self) -> &str;

    fn namespace(&self) -> &str;

    fn close(&mut self) {}
}

impl<I: SeriesIterator + ?Sized> SeriesIterator for &mut I {
    fn next(&mut self) -> bool {
        (**self).next()
    }

    fn current(&self) -> (DataPoint, TimeUnit, Option<&[u8]>) {
        (**self).current()
    }

    fn err(&self) -> Option<&Error> {
        (**self).err()
    }

    fn id(&self) -> &str {
        (**self).id()
    }

    fn namespace(&self) -> &str {
        (**self).namespace()
    }

    fn close(&mut self) {
        (**self).close()
    }
}

impl<I: SeriesIterator + ?Sized> SeriesIterator for Box<I> {
    fn next(&mut self) -> bool {
        (**self).next()
    }

    fn current(&self) -> (DataPoint, TimeUnit, Option<&[u8]>) {
        (**self).current()
    }

    fn err(&self) -> Option<&Error> {
        (**self).err()
    }

    fn id(&self) -> &str {
        (**self).id()
    }

    fn namespace(&self) -> &str {
        (**self).namespace()
    }

    fn close(&mut self) {
        (**self).close()
    }
}

/// A series held in memory.
#[derive(Debug, Clone)]
pub struct VecSeriesIterator {
    id: String,
    namespace: String,
    points: Vec<DataPoint>,
    unit: TimeUnit,
    // None before the first `next`, `Some(points.len())` once exhausted.
    pos: Option<usize>,
    err: Option<Error>,
    closed: bool,
}

impl VecSeriesIterator {
    pub fn new(id: impl Into<String>, namespace: impl Into<String>, points: Vec<DataPoint>) -> Self {
        Self {
            id: id.into(),
            namespace: namespace.into(),
            points,
            unit: TimeUnit::default(),
            pos: None,
            err: None,
            closed: false,
        }
    }

    /// `count` points one second apart with values 0, 1, 2, ...
    pub fn with_sequence(id: impl Into<String>, count: usize) -> Self {
        let points = (0..count)
            .map(|i| DataPoint::new(i as u64 * 1000, i as f64))
            .collect();
        Self::new(id, "default", points)
    }

    pub fn with_unit(mut self, unit: TimeUnit) -> Self {
        self.unit = unit;
        self
    }

    /// Reports `err` from `err()` regardless of how far the cursor has moved,
    /// as a decoder that failed part-way would.
    pub fn with_error(mut self, err: Error) -> Self {
        self.err = Some(err);
        self
    }

    pub fn remaining(&self) -> usize {
        match self.pos {
            Some(p) => self.points.len().saturating_sub(p + 1),
            None => self.points.len(),
        }
    }
}

impl SeriesIterator for VecSeriesIterator {
    fn next(&mut self) -> bool {
        if self.closed {
            return false;
        }
        let next = self.pos.map_or(0, |p| p + 1);
        if next >= self.points.len() {
            self.pos = Some(self.points.len());
            return false;
        }
        self.pos = Some(next);
        true
    }

    fn current(&self) -> (DataPoint, TimeUnit, Option<&[u8]>) {
        let point = self
            .pos
            .and_then(|p| self.points.get(p))
            .copied()
            .unwrap_or_default();
        (point, self.unit, None)
    }

    fn err(&self) -> Option<&Error> {
        self.err.as_ref()
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn close(&mut self) {
        self.closed = true;
    }
}
