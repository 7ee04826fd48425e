use super::Cost;
use std::fmt::Debug;
use std::hint::spin_loop;
use std::sync::atomic::{AtomicU64, Ordering};

/// A running total of cost.
pub trait Tracker: Send + Sync + Debug {
    /// Adds `cost` (which may be negative) and returns the new total.
    fn add(&self, cost: Cost) -> Cost;

    fn current(&self) -> Cost;
}

/// Lock-free tracker storing the `f64` total as raw bits.
///
/// Updates are a CAS loop, so concurrent adds are never lost and reads never
/// observe a torn value.
#[derive(Debug, Default)]
pub struct AtomicTracker {
    bits: AtomicU64,
}

impl AtomicTracker {
    pub fn new() -> Self {
        Self {
            bits: AtomicU64::new(0.0f64.to_bits()),
        }
    }
}

impl Tracker for AtomicTracker {
    #[inline]
    fn add(&self, cost: Cost) -> Cost {
        let mut cur = self.bits.load(Ordering::Relaxed);
        loop {
            let next = f64::from_bits(cur) + cost;
            match self.bits.compare_exchange_weak(
                cur,
                next.to_bits(),
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return next,
                Err(actual) => {
                    cur = actual;
                    spin_loop();
                }
            }
        }
    }

    #[inline]
    fn current(&self) -> Cost {
        f64::from_bits(self.bits.load(Ordering::Acquire))
    }
}

/// Tracker that records nothing and always reports zero.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTracker;

impl Tracker for NoopTracker {
    #[inline]
    fn add(&self, _cost: Cost) -> Cost {
        0.0
    }

    #[inline]
    fn current(&self) -> Cost {
        0.0
    }
}
