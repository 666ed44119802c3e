use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

use crate::block::{BlockId, BlockView};
use crate::gc_base::Collector;
use crate::generational::Generational;
use crate::heap::{Heap, HeapStats};
use crate::marksweep::MarkSweep;
use crate::metrics::{
    Algorithm, AlgorithmStats, CollectionKind, CycleRecord, CycleResult, MetricsSummary,
    MetricsTracker,
};
use crate::refcount::RefCounting;
use crate::semispace::Copying;
use crate::HeapConfig;

/// Local, recoverable failure conditions of the heap surface. None of
/// these leave the heap in a partial state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HeapError {
    #[error("not enough free space: {requested} units requested, {available} available")]
    OutOfMemory { requested: usize, available: usize },
    #[error("unknown block {0}")]
    NotFound(BlockId),
    #[error("no reference from {from} to {to}")]
    InvalidReference { from: BlockId, to: BlockId },
}

/// One heap session: the heap, the four collectors and the metrics history,
/// owned as a single value the caller passes around.
///
/// The session is single-threaded and synchronous; every call runs to
/// completion. Where the heap itself answers with absent values or
/// booleans, the session maps those to [`HeapError`] so embedding layers
/// get a typed error to surface.
#[derive(Debug)]
pub struct Simulator {
    heap: Heap,
    tracker: MetricsTracker,
    marksweep: MarkSweep,
    refcount: RefCounting,
    generational: Generational,
    copying: Copying,
}

impl Simulator {
    pub fn new(config: HeapConfig) -> Self {
        let heap = Heap::new(&config);
        let copying = Copying::new(&heap);
        Self {
            heap,
            tracker: MetricsTracker::new(),
            marksweep: MarkSweep::new(),
            refcount: RefCounting::new(),
            generational: Generational::with_promotion_age(config.promotion_age),
            copying,
        }
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    /// Direct heap access, for workload generators and tests. Must not be
    /// interleaved with a `collect` call on another handle; the session
    /// does no internal locking (see [`SharedSimulator`]).
    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    pub fn allocate(&mut self, size: usize, root: bool) -> Result<BlockId, HeapError> {
        let available = self.heap.free_units();
        self.heap
            .allocate(size, root)
            .ok_or(HeapError::OutOfMemory {
                requested: size,
                available,
            })
    }

    pub fn deallocate(&mut self, id: BlockId) -> Result<(), HeapError> {
        if self.heap.deallocate(id) {
            Ok(())
        } else {
            Err(HeapError::NotFound(id))
        }
    }

    pub fn add_reference(&mut self, from: BlockId, to: BlockId) -> Result<(), HeapError> {
        if !self.heap.contains(from) {
            return Err(HeapError::NotFound(from));
        }
        if !self.heap.contains(to) {
            return Err(HeapError::NotFound(to));
        }
        self.heap.add_reference(from, to);
        Ok(())
    }

    pub fn remove_reference(&mut self, from: BlockId, to: BlockId) -> Result<(), HeapError> {
        if !self.heap.contains(from) {
            return Err(HeapError::NotFound(from));
        }
        if self.heap.remove_reference(from, to) {
            Ok(())
        } else {
            Err(HeapError::InvalidReference { from, to })
        }
    }

    pub fn stats(&self) -> HeapStats {
        self.heap.stats()
    }

    pub fn snapshot(&self) -> Vec<BlockView> {
        self.heap.snapshot()
    }

    /// Clears the heap and realigns the copying collector's space views
    /// with the now-empty block table. Metrics history is kept.
    pub fn reset_heap(&mut self) {
        self.heap.reset();
        self.copying.resync(&self.heap);
    }

    /// Runs one collection cycle of the chosen strategy, records the
    /// result and returns it. Generational cycles run in minor scope.
    pub fn collect(&mut self, algorithm: Algorithm) -> CycleResult {
        let result = match algorithm {
            Algorithm::MarkSweep => self.marksweep.collect(&mut self.heap),
            Algorithm::RefCounting => self.refcount.collect(&mut self.heap),
            Algorithm::Generational => self.generational.collect(&mut self.heap),
            Algorithm::Copying => self.copying.collect(&mut self.heap),
        };
        self.tracker.record(result.clone());
        result
    }

    /// Runs a major generational cycle (young and old generations).
    pub fn collect_major(&mut self) -> CycleResult {
        let result = self
            .generational
            .collect_kind(&mut self.heap, CollectionKind::Major);
        self.tracker.record(result.clone());
        result
    }

    pub fn cycles(&self) -> &[CycleRecord] {
        self.tracker.cycles()
    }

    pub fn summary(&self) -> MetricsSummary {
        self.tracker.summary()
    }

    pub fn comparison(&self) -> BTreeMap<Algorithm, AlgorithmStats> {
        self.tracker.comparison()
    }

    pub fn export_csv(&self) -> String {
        self.tracker.export()
    }

    pub fn reset_metrics(&mut self) {
        self.tracker.reset();
    }
}

/// Shared handle over a session for embedding layers that serve it from
/// multiple tasks. The mutex serializes every public call, the access
/// discipline the single-threaded core requires.
pub type SharedSimulator = Arc<Mutex<Simulator>>;

pub fn shared(config: HeapConfig) -> SharedSimulator {
    Arc::new(Mutex::new(Simulator::new(config)))
}
