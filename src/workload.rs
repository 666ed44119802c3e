use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::block::BlockId;
use crate::heap::Heap;

/// Convenience populator producing allocation patterns for exercising the
/// collectors. Not part of the collection core; tests and the demo binary
/// use it. Seedable so test runs are reproducible.
#[derive(Debug)]
pub struct WorkloadGenerator {
    rng: StdRng,
}

impl WorkloadGenerator {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Allocates `count` blocks of 1-3 units each; each is a root with
    /// probability `root_prob`. Allocations that no longer fit are dropped.
    pub fn random_allocation(&mut self, heap: &mut Heap, count: usize, root_prob: f64) -> Vec<BlockId> {
        let mut allocated = Vec::new();
        for _ in 0..count {
            let size = self.rng.gen_range(1..=3);
            let root = self.rng.gen_bool(root_prob.clamp(0.0, 1.0));
            if let Some(id) = heap.allocate(size, root) {
                allocated.push(id);
            }
        }
        allocated
    }

    /// Wires random edges between the given blocks with density
    /// `ref_density` per ordered pair.
    pub fn create_references(&mut self, heap: &mut Heap, blocks: &[BlockId], ref_density: f64) {
        let density = ref_density.clamp(0.0, 1.0);
        for &from in blocks {
            for &to in blocks {
                if from != to && self.rng.gen_bool(density) {
                    heap.add_reference(from, to);
                }
            }
        }
    }

    /// Allocates an unrooted ring of `len` single-unit blocks, each
    /// referencing the next. Classic refcount-defeating garbage.
    pub fn create_circular_reference(&mut self, heap: &mut Heap, len: usize) -> Vec<BlockId> {
        let mut blocks = Vec::new();
        for _ in 0..len {
            if let Some(id) = heap.allocate(1, false) {
                blocks.push(id);
            }
        }
        for i in 0..blocks.len() {
            let next = (i + 1) % blocks.len();
            heap.add_reference(blocks[i], blocks[next]);
        }
        blocks
    }

    /// Rooted blocks of 2-5 units, standing in for long-lived data.
    pub fn long_lived(&mut self, heap: &mut Heap, count: usize) -> Vec<BlockId> {
        let mut blocks = Vec::new();
        for _ in 0..count {
            let size = self.rng.gen_range(2..=5);
            if let Some(id) = heap.allocate(size, true) {
                blocks.push(id);
            }
        }
        blocks
    }

    /// Unrooted single-unit blocks, garbage from the next cycle on.
    pub fn short_lived(&mut self, heap: &mut Heap, count: usize) -> Vec<BlockId> {
        let mut blocks = Vec::new();
        for _ in 0..count {
            if let Some(id) = heap.allocate(1, false) {
                blocks.push(id);
            }
        }
        blocks
    }

    /// 3 long-lived plus 7 short-lived blocks, with the first two
    /// long-lived ones each keeping 3 sampled short-lived blocks alive.
    pub fn mixed_workload(&mut self, heap: &mut Heap) -> (Vec<BlockId>, Vec<BlockId>) {
        let long_lived = self.long_lived(heap, 3);
        let short_lived = self.short_lived(heap, 7);

        for &keeper in long_lived.iter().take(2) {
            let picks: Vec<BlockId> = short_lived
                .choose_multiple(&mut self.rng, 3.min(short_lived.len()))
                .copied()
                .collect();
            for kept in picks {
                heap.add_reference(keeper, kept);
            }
        }

        (long_lived, short_lived)
    }
}

impl Default for WorkloadGenerator {
    fn default() -> Self {
        Self::new()
    }
}
