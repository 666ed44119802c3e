use std::collections::BTreeSet;

use chrono::Utc;

use crate::block::BlockId;
use crate::gc_base::Collector;
use crate::heap::Heap;
use crate::marking::mark_from_roots;
use crate::metrics::{Algorithm, CollectionDetail, CollectionKind, CycleResult, PauseTimer};

pub const DEFAULT_PROMOTION_AGE: u32 = 2;

/// Two-generation collector: generation 0 (young) and generation 1 (old).
///
/// Every cycle runs one full-heap mark from the roots; there is no write
/// barrier or remembered set, so a minor cycle pays the full mark cost and
/// only the sweep is scoped to the young generation. Young survivors age and
/// are promoted once they have survived `promotion_age` cycles. A major
/// cycle additionally sweeps the old generation with the same mark
/// results; blocks promoted within the cycle are left alone.
#[derive(Debug)]
pub struct Generational {
    promotion_age: u32,
}

impl Default for Generational {
    fn default() -> Self {
        Self {
            promotion_age: DEFAULT_PROMOTION_AGE,
        }
    }
}

impl Generational {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_promotion_age(promotion_age: u32) -> Self {
        Self { promotion_age }
    }

    pub fn promotion_age(&self) -> u32 {
        self.promotion_age
    }

    /// Runs one cycle of the requested scope.
    pub fn collect_kind(&mut self, heap: &mut Heap, kind: CollectionKind) -> CycleResult {
        let timer = PauseTimer::start();
        let scanned = heap.object_count();

        mark_from_roots(heap);

        let (mut freed, mut bytes_reclaimed, promoted) = self.sweep_young(heap);
        if kind == CollectionKind::Major {
            let (old_freed, old_bytes) = self.sweep_old(heap, &promoted);
            freed += old_freed;
            bytes_reclaimed += old_bytes;
        }

        // Generations the sweep did not touch still carry mark flags.
        for id in heap.ids() {
            if let Some(block) = heap.block_mut(id) {
                block.marked = false;
            }
        }

        log::debug!(
            "generational {}: {} freed, {} promoted, {} bytes reclaimed",
            kind,
            freed,
            promoted.len(),
            bytes_reclaimed
        );

        CycleResult {
            algorithm: Algorithm::Generational,
            objects_scanned: scanned,
            objects_freed: freed,
            bytes_reclaimed,
            pause_ms: timer.stop_ms(),
            timestamp: Utc::now(),
            detail: CollectionDetail::Generational {
                objects_promoted: promoted.len(),
                collection_type: kind,
            },
        }
    }

    fn sweep_young(&self, heap: &mut Heap) -> (usize, usize, BTreeSet<BlockId>) {
        let mut doomed = Vec::new();
        let mut promoted = BTreeSet::new();

        for id in heap.ids() {
            if let Some(block) = heap.block_mut(id) {
                if block.generation != 0 {
                    continue;
                }
                if block.marked {
                    block.marked = false;
                    block.age += 1;
                    if block.age >= self.promotion_age {
                        block.generation = 1;
                        promoted.insert(id);
                    }
                } else {
                    doomed.push(id);
                }
            }
        }

        let bytes = free_doomed(heap, &doomed);
        (doomed.len(), bytes, promoted)
    }

    fn sweep_old(&self, heap: &mut Heap, promoted: &BTreeSet<BlockId>) -> (usize, usize) {
        let mut doomed = Vec::new();

        for id in heap.ids() {
            if promoted.contains(&id) {
                continue;
            }
            if let Some(block) = heap.block_mut(id) {
                if block.generation != 1 {
                    continue;
                }
                if block.marked {
                    block.marked = false;
                    block.age += 1;
                } else {
                    doomed.push(id);
                }
            }
        }

        let bytes = free_doomed(heap, &doomed);
        (doomed.len(), bytes)
    }
}

fn free_doomed(heap: &mut Heap, doomed: &[BlockId]) -> usize {
    let mut bytes = 0;
    for &id in doomed {
        if let Some(block) = heap.block(id) {
            bytes += block.size() * heap.unit_size();
        }
        heap.deallocate(id);
    }
    bytes
}

impl Collector for Generational {
    fn algorithm(&self) -> Algorithm {
        Algorithm::Generational
    }

    /// A bare `collect` is a minor cycle, the common case.
    fn collect(&mut self, heap: &mut Heap) -> CycleResult {
        self.collect_kind(heap, CollectionKind::Minor)
    }
}
