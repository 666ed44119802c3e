use crate::heap::Heap;
use crate::metrics::{Algorithm, CycleResult};

/// Common interface implemented by every collection strategy.
///
/// A collector borrows the heap for exactly one stop-the-world cycle,
/// mutates it in place and reports what it did. Strategies share no state
/// with each other except through the heap itself, so they can be run
/// interchangeably against the same session.
pub trait Collector {
    fn algorithm(&self) -> Algorithm;

    /// Runs one collection cycle to completion. Never fails on a
    /// structurally valid heap; an empty heap yields all-zero counts.
    fn collect(&mut self, heap: &mut Heap) -> CycleResult;
}
