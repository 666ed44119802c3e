use std::collections::{BTreeMap, BTreeSet};

use chrono::Utc;

use crate::block::BlockId;
use crate::gc_base::Collector;
use crate::heap::Heap;
use crate::metrics::{Algorithm, CollectionDetail, CycleResult, PauseTimer};

/// Semi-space copying collector.
///
/// Ids stand in for addresses: evacuating a block means giving it a fresh
/// id and rebuilding its reference set under the forwarded ids, so every
/// cycle renumbers the live graph while preserving its topology. The two
/// space views track which ids belong to the current half-space;
/// `from_space` is captured at construction and replaced by the copied id
/// set after every cycle.
#[derive(Debug)]
pub struct Copying {
    from_space: BTreeSet<BlockId>,
    to_space: BTreeSet<BlockId>,
}

impl Copying {
    pub fn new(heap: &Heap) -> Self {
        Self {
            from_space: heap.ids().into_iter().collect(),
            to_space: BTreeSet::new(),
        }
    }

    /// Re-captures the current block set as the from-space. Called after an
    /// external heap reset, which invalidates both space views.
    pub fn resync(&mut self, heap: &Heap) {
        self.from_space = heap.ids().into_iter().collect();
        self.to_space.clear();
    }

    pub fn from_space(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.from_space.iter().copied()
    }

    /// First pass: walk reachability from the roots and reserve a fresh id
    /// for every block found. The forwarding map doubles as the visited
    /// set, so cyclic graphs terminate and nothing is copied twice.
    fn forward_reachable(&mut self, heap: &mut Heap) -> BTreeMap<BlockId, BlockId> {
        let mut forwarding = BTreeMap::new();
        let mut work: Vec<BlockId> = heap.roots().collect();

        while let Some(old) = work.pop() {
            if forwarding.contains_key(&old) || !heap.contains(old) {
                continue;
            }
            let new_id = heap.reserve_id();
            forwarding.insert(old, new_id);
            self.to_space.insert(new_id);
            if let Some(block) = heap.block(old) {
                work.extend(block.references());
            }
        }

        forwarding
    }
}

impl Collector for Copying {
    fn algorithm(&self) -> Algorithm {
        Algorithm::Copying
    }

    fn collect(&mut self, heap: &mut Heap) -> CycleResult {
        let timer = PauseTimer::start();
        let scanned = heap.object_count();

        self.to_space.clear();
        let forwarding = self.forward_reachable(heap);

        // Second pass: move each record under its forwarded id. References
        // are rewritten through the forwarding map; ids that were already
        // dangling stay as they were. Root-set entries follow the move.
        for (&old, &new) in &forwarding {
            if let Some(src) = heap.take_relocated(old) {
                let references = src
                    .references
                    .iter()
                    .map(|id| forwarding.get(id).copied().unwrap_or(*id))
                    .collect();
                heap.install_relocated(new, src.size, src.generation, src.root, src.age + 1, references);
            }
        }

        // Whatever the old space still holds was not reached: discard it.
        let mut freed = 0;
        let mut bytes_reclaimed = 0;
        for &old in &self.from_space {
            if forwarding.contains_key(&old) {
                continue;
            }
            if let Some(block) = heap.block(old) {
                bytes_reclaimed += block.size() * heap.unit_size();
                heap.deallocate(old);
                freed += 1;
            }
        }

        self.from_space = std::mem::take(&mut self.to_space);

        log::debug!(
            "copying: {} copied, {} freed, {} bytes reclaimed",
            forwarding.len(),
            freed,
            bytes_reclaimed
        );

        CycleResult {
            algorithm: Algorithm::Copying,
            objects_scanned: scanned,
            objects_freed: freed,
            bytes_reclaimed,
            pause_ms: timer.stop_ms(),
            timestamp: Utc::now(),
            detail: CollectionDetail::Copying {
                objects_copied: forwarding.len(),
                compaction: true,
            },
        }
    }
}
