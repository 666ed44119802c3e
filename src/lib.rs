//! Simulated heap and classical garbage collection strategies.
//!
//! The crate models a heap as a table of [`Block`] records connected by
//! directed reference edges, and runs four collection strategies over it:
//! mark-sweep, reference counting with cycle detection, a two-generation
//! collector, and a semi-space copying collector. Collectors mutate the
//! heap in place and report a [`CycleResult`]; a [`MetricsTracker`]
//! aggregates results across cycles.
//!
//! Nothing here touches real memory; block ids stand in for addresses.
//! That keeps every strategy observable: snapshots expose the whole
//! graph, and the space accounting is checkable after every operation.
//!
//! ```
//! use gcsim::{Algorithm, HeapConfig, Simulator};
//!
//! let mut sim = Simulator::new(HeapConfig::default());
//! let root = sim.allocate(2, true).unwrap();
//! let child = sim.allocate(3, false).unwrap();
//! sim.add_reference(root, child).unwrap();
//!
//! let result = sim.collect(Algorithm::MarkSweep);
//! assert_eq!(result.objects_freed, 0); // child is reachable via root
//! ```

mod block;
mod gc_base;
mod generational;
mod heap;
mod marking;
mod marksweep;
mod metrics;
mod refcount;
mod semispace;
mod session;
mod workload;

#[cfg(test)]
mod tests;

pub use block::{Block, BlockId, BlockView};
pub use gc_base::Collector;
pub use generational::{Generational, DEFAULT_PROMOTION_AGE};
pub use heap::{Heap, HeapStats};
pub use marksweep::MarkSweep;
pub use metrics::{
    Algorithm, AlgorithmStats, CollectionDetail, CollectionKind, CycleRecord, CycleResult,
    MetricsSummary, MetricsTracker,
};
pub use refcount::RefCounting;
pub use semispace::Copying;
pub use session::{shared, HeapError, SharedSimulator, Simulator};
pub use workload::WorkloadGenerator;

/// Configuration for heap constructor.
#[derive(Debug, Clone, Copy)]
pub struct HeapConfig {
    /// Total simulated heap size in bytes.
    pub total_size: usize,
    /// Bytes represented by one heap unit; capacity in units is
    /// `total_size / unit_size`.
    pub unit_size: usize,
    /// Survived-cycle threshold at which the generational collector
    /// promotes a young block.
    pub promotion_age: u32,
}

impl Default for HeapConfig {
    fn default() -> Self {
        Self {
            total_size: 1024,
            unit_size: 16,
            promotion_age: DEFAULT_PROMOTION_AGE,
        }
    }
}
