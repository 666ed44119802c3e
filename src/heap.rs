use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::block::{Block, BlockId, BlockView};
use crate::HeapConfig;

/// Point-in-time accounting numbers for a heap.
///
/// `fragmentation` is an internal consistency check: declared capacity minus
/// tracked used and free space, as a percentage of capacity. It reads 0.0
/// under correct bookkeeping; anything else is a regression signal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HeapStats {
    pub total_bytes: usize,
    pub unit_size: usize,
    pub capacity_units: usize,
    pub free_units: usize,
    pub used_units: usize,
    pub total_objects: usize,
    pub root_objects: usize,
    pub fragmentation: f64,
}

/// The simulated heap: block table, root set and space accounting.
///
/// The heap is the only place block records are mutated. Collectors borrow
/// it mutably for the duration of one cycle and go through its accessors,
/// so the counter invariant `free_units + used_units == capacity_units`
/// holds after every public operation.
#[derive(Debug)]
pub struct Heap {
    unit_size: usize,
    capacity_units: usize,
    free_units: usize,
    used_units: usize,
    blocks: BTreeMap<BlockId, Block>,
    roots: BTreeSet<BlockId>,
    next_id: u64,
}

impl Heap {
    pub fn new(config: &HeapConfig) -> Self {
        let unit_size = config.unit_size.max(1);
        let capacity_units = config.total_size / unit_size;
        Self {
            unit_size,
            capacity_units,
            free_units: capacity_units,
            used_units: 0,
            blocks: BTreeMap::new(),
            roots: BTreeSet::new(),
            next_id: 0,
        }
    }

    /// Allocates a block of `size` heap units. Returns `None` when the
    /// request cannot be satisfied; counters are untouched in that case.
    pub fn allocate(&mut self, size: usize, root: bool) -> Option<BlockId> {
        if size == 0 || self.free_units < size {
            log::trace!(
                "allocation of {} units refused ({} free)",
                size,
                self.free_units
            );
            return None;
        }

        let id = self.fresh_id();
        self.blocks.insert(id, Block::new(id, size, root));
        self.free_units -= size;
        self.used_units += size;
        if root {
            self.roots.insert(id);
        }
        log::trace!("allocated {} ({} units, root: {})", id, size, root);
        Some(id)
    }

    /// Frees a block, returning its units to the free pool. Returns `false`
    /// for an unknown or already-freed id, leaving the heap unchanged.
    pub fn deallocate(&mut self, id: BlockId) -> bool {
        let block = match self.blocks.remove(&id) {
            Some(block) => block,
            None => return false,
        };
        self.free_units += block.size;
        self.used_units -= block.size;
        self.roots.remove(&id);
        log::trace!("deallocated {} ({} units)", id, block.size);
        true
    }

    /// Inserts the directed edge `from -> to`. Idempotent; fails only when
    /// either endpoint is unknown.
    pub fn add_reference(&mut self, from: BlockId, to: BlockId) -> bool {
        if !self.blocks.contains_key(&to) {
            return false;
        }
        match self.blocks.get_mut(&from) {
            Some(block) => {
                block.references.insert(to);
                true
            }
            None => false,
        }
    }

    /// Removes the edge `from -> to`. Fails when `from` is unknown or the
    /// edge does not exist.
    pub fn remove_reference(&mut self, from: BlockId, to: BlockId) -> bool {
        match self.blocks.get_mut(&from) {
            Some(block) => block.references.remove(&to),
            None => false,
        }
    }

    pub fn stats(&self) -> HeapStats {
        let total_bytes = self.capacity_units * self.unit_size;
        let used_bytes = self.used_units * self.unit_size;
        let free_bytes = self.free_units * self.unit_size;
        let fragmentation = if total_bytes == 0 {
            0.0
        } else {
            let leak = total_bytes as f64 - used_bytes as f64 - free_bytes as f64;
            (leak / total_bytes as f64 * 10_000.0).round() / 100.0
        };
        HeapStats {
            total_bytes,
            unit_size: self.unit_size,
            capacity_units: self.capacity_units,
            free_units: self.free_units,
            used_units: self.used_units,
            total_objects: self.blocks.len(),
            root_objects: self.roots.len(),
            fragmentation,
        }
    }

    /// Drops every block and restores full free capacity.
    pub fn reset(&mut self) {
        self.blocks.clear();
        self.roots.clear();
        self.free_units = self.capacity_units;
        self.used_units = 0;
        log::debug!("heap reset ({} units free)", self.free_units);
    }

    /// Read-only copies of every block, in ascending id order.
    pub fn snapshot(&self) -> Vec<BlockView> {
        self.blocks.values().map(Block::view).collect()
    }

    pub fn contains(&self, id: BlockId) -> bool {
        self.blocks.contains_key(&id)
    }

    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.blocks.get(&id)
    }

    pub fn object_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn roots(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.roots.iter().copied()
    }

    pub fn root_count(&self) -> usize {
        self.roots.len()
    }

    pub fn unit_size(&self) -> usize {
        self.unit_size
    }

    pub fn capacity_units(&self) -> usize {
        self.capacity_units
    }

    pub fn free_units(&self) -> usize {
        self.free_units
    }

    pub fn used_units(&self) -> usize {
        self.used_units
    }

    pub(crate) fn block_mut(&mut self, id: BlockId) -> Option<&mut Block> {
        self.blocks.get_mut(&id)
    }

    /// Current block ids in ascending (allocation) order.
    pub(crate) fn ids(&self) -> Vec<BlockId> {
        self.blocks.keys().copied().collect()
    }

    fn fresh_id(&mut self) -> BlockId {
        let id = BlockId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Reserves a fresh id without creating a record. Used by the copying
    /// collector to build its forwarding map before any block moves.
    pub(crate) fn reserve_id(&mut self) -> BlockId {
        self.fresh_id()
    }

    /// Installs a relocated block under a previously reserved id. Counters
    /// are untouched: a relocation replaces a record of identical size.
    pub(crate) fn install_relocated(
        &mut self,
        id: BlockId,
        size: usize,
        generation: u8,
        root: bool,
        age: u32,
        references: BTreeSet<BlockId>,
    ) {
        debug_assert!(!self.blocks.contains_key(&id));
        let block = Block {
            id,
            size,
            allocated: true,
            marked: false,
            generation,
            references,
            age,
            root,
        };
        self.blocks.insert(id, block);
        if root {
            self.roots.insert(id);
        }
    }

    /// Removes the copied-from record of a relocation, counters untouched.
    pub(crate) fn take_relocated(&mut self, id: BlockId) -> Option<Block> {
        let block = self.blocks.remove(&id)?;
        self.roots.remove(&id);
        Some(block)
    }
}
