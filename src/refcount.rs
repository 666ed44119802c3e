use std::collections::{BTreeMap, BTreeSet};

use chrono::Utc;

use crate::block::BlockId;
use crate::gc_base::Collector;
use crate::heap::Heap;
use crate::metrics::{Algorithm, CollectionDetail, CycleResult, PauseTimer};

/// Reference-counting collection with cycle detection.
///
/// Counts are recomputed from scratch every cycle: one incoming edge per
/// referencing block, plus an implicit self-edge for every root. Blocks
/// that end up at zero, or that the cycle scan flags, are freed. Roots are
/// never deallocated by this strategy, though they still count toward
/// `objects_freed` when flagged.
#[derive(Debug, Default)]
pub struct RefCounting {
    counts: BTreeMap<BlockId, usize>,
}

struct Frame {
    id: BlockId,
    refs: Vec<BlockId>,
    next: usize,
}

impl RefCounting {
    pub fn new() -> Self {
        Self::default()
    }

    fn update_counts(&mut self, heap: &Heap) {
        self.counts.clear();
        for id in heap.ids() {
            self.counts.insert(id, 0);
        }
        for root in heap.roots() {
            if let Some(count) = self.counts.get_mut(&root) {
                *count += 1;
            }
        }
        for id in heap.ids() {
            if let Some(block) = heap.block(id) {
                for target in block.references() {
                    // Dangling targets have no count slot and are skipped.
                    if let Some(count) = self.counts.get_mut(&target) {
                        *count += 1;
                    }
                }
            }
        }
    }
}

/// Depth-first cycle scan over the whole block set, iterative with explicit
/// frames.
///
/// Flagging is an over-approximation: when an edge leads back into the
/// active search path, every node on that path is flagged, not only the
/// cycle's own members, and the path set is kept as-is for the remaining
/// starts. Nodes with live external references can therefore end up
/// flagged as cycle-involved.
fn detect_cycles(heap: &Heap) -> BTreeSet<BlockId> {
    let mut cycles = BTreeSet::new();
    let mut visited: BTreeSet<BlockId> = BTreeSet::new();
    let mut on_path: BTreeSet<BlockId> = BTreeSet::new();

    for start in heap.ids() {
        if visited.contains(&start) {
            continue;
        }
        visited.insert(start);
        on_path.insert(start);
        let mut stack = vec![frame_for(heap, start)];

        'walk: while !stack.is_empty() {
            let top = stack.len() - 1;
            let target = {
                let frame = &mut stack[top];
                if frame.next == frame.refs.len() {
                    on_path.remove(&frame.id);
                    stack.pop();
                    continue 'walk;
                }
                frame.next += 1;
                frame.refs[frame.next - 1]
            };

            if !visited.contains(&target) {
                // Unknown targets are skipped without being visited.
                if heap.contains(target) {
                    visited.insert(target);
                    on_path.insert(target);
                    stack.push(frame_for(heap, target));
                }
            } else if on_path.contains(&target) {
                // Edge back into the active path: flag the whole path that
                // led here and abandon this start, leaving the path set
                // populated.
                for frame in &stack {
                    cycles.insert(frame.id);
                }
                break 'walk;
            }
        }
    }

    cycles
}

fn frame_for(heap: &Heap, id: BlockId) -> Frame {
    let refs = heap
        .block(id)
        .map(|block| block.references().collect())
        .unwrap_or_default();
    Frame { id, refs, next: 0 }
}

impl Collector for RefCounting {
    fn algorithm(&self) -> Algorithm {
        Algorithm::RefCounting
    }

    fn collect(&mut self, heap: &mut Heap) -> CycleResult {
        let timer = PauseTimer::start();

        self.update_counts(heap);
        let cycles = detect_cycles(heap);

        let mut doomed = Vec::new();
        for (&id, &count) in &self.counts {
            if count == 0 || cycles.contains(&id) {
                doomed.push(id);
            }
        }

        let mut bytes_reclaimed = 0;
        for &id in &doomed {
            match heap.block(id) {
                Some(block) if !block.is_root() => {
                    bytes_reclaimed += block.size() * heap.unit_size();
                    heap.deallocate(id);
                }
                _ => {}
            }
        }

        for id in heap.ids() {
            if let Some(block) = heap.block_mut(id) {
                block.age += 1;
            }
        }

        log::debug!(
            "refcount: {} candidates, {} cycle-flagged, {} bytes reclaimed",
            doomed.len(),
            cycles.len(),
            bytes_reclaimed
        );

        CycleResult {
            algorithm: Algorithm::RefCounting,
            objects_scanned: self.counts.len(),
            objects_freed: doomed.len(),
            bytes_reclaimed,
            pause_ms: timer.stop_ms(),
            timestamp: Utc::now(),
            detail: CollectionDetail::RefCounting {
                cycles_detected: cycles.len(),
            },
        }
    }
}
