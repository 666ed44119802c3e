use chrono::Utc;

use crate::gc_base::Collector;
use crate::heap::Heap;
use crate::marking::mark_from_roots;
use crate::metrics::{Algorithm, CollectionDetail, CycleResult, PauseTimer};

/// Classic stop-the-world mark-sweep. No state is carried between cycles;
/// everything the sweep needs lives in the heap.
#[derive(Debug, Default)]
pub struct MarkSweep;

impl MarkSweep {
    pub fn new() -> Self {
        Self
    }
}

impl Collector for MarkSweep {
    fn algorithm(&self) -> Algorithm {
        Algorithm::MarkSweep
    }

    fn collect(&mut self, heap: &mut Heap) -> CycleResult {
        let timer = PauseTimer::start();
        let scanned = heap.object_count();

        let marked = mark_from_roots(heap);

        // Sweep: survivors have their scratch flag cleared and age a cycle,
        // everything unmarked is doomed.
        let mut doomed = Vec::new();
        for id in heap.ids() {
            if let Some(block) = heap.block_mut(id) {
                if block.marked {
                    block.marked = false;
                    block.age += 1;
                } else {
                    doomed.push(id);
                }
            }
        }

        let mut bytes_reclaimed = 0;
        for &id in &doomed {
            if let Some(block) = heap.block(id) {
                bytes_reclaimed += block.size() * heap.unit_size();
            }
            heap.deallocate(id);
        }

        log::debug!(
            "mark-sweep: {} marked, {} freed, {} bytes reclaimed",
            marked.len(),
            doomed.len(),
            bytes_reclaimed
        );

        CycleResult {
            algorithm: Algorithm::MarkSweep,
            objects_scanned: scanned,
            objects_freed: doomed.len(),
            bytes_reclaimed,
            pause_ms: timer.stop_ms(),
            timestamp: Utc::now(),
            detail: CollectionDetail::MarkSweep {
                marked_objects: marked.len(),
            },
        }
    }
}
