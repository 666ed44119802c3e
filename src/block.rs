use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

/// Handle to a simulated heap block.
///
/// Ids are handed out by the heap from a monotonically increasing counter
/// and are never reused within one heap session, so ascending id order is
/// allocation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct BlockId(pub(crate) u64);

impl BlockId {
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A simulated heap object. Owned exclusively by [`Heap`](crate::Heap);
/// collectors reach it only through the heap.
#[derive(Debug, Clone)]
pub struct Block {
    pub(crate) id: BlockId,
    /// Heap units occupied, always >= 1.
    pub(crate) size: usize,
    pub(crate) allocated: bool,
    /// Scratch flag for the mark phase. False outside an in-progress cycle.
    pub(crate) marked: bool,
    /// 0 = young, 1 = old. Only the generational collector moves it.
    pub(crate) generation: u8,
    /// Outgoing edges. Targets may dangle after a deallocation; traversals
    /// skip ids that no longer resolve.
    pub(crate) references: BTreeSet<BlockId>,
    /// Collection cycles survived.
    pub(crate) age: u32,
    pub(crate) root: bool,
}

impl Block {
    pub(crate) fn new(id: BlockId, size: usize, root: bool) -> Self {
        Self {
            id,
            size,
            allocated: true,
            marked: false,
            generation: 0,
            references: BTreeSet::new(),
            age: 0,
            root,
        }
    }

    pub fn id(&self) -> BlockId {
        self.id
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn generation(&self) -> u8 {
        self.generation
    }

    pub fn age(&self) -> u32 {
        self.age
    }

    pub fn is_root(&self) -> bool {
        self.root
    }

    pub fn is_marked(&self) -> bool {
        self.marked
    }

    pub fn references(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.references.iter().copied()
    }

    pub fn view(&self) -> BlockView {
        BlockView {
            id: self.id,
            size: self.size,
            allocated: self.allocated,
            marked: self.marked,
            generation: self.generation,
            references: self.references.iter().copied().collect(),
            age: self.age,
            root: self.root,
        }
    }
}

/// Read-only copy of one block, the unit of [`Heap::snapshot`](crate::Heap::snapshot).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockView {
    pub id: BlockId,
    pub size: usize,
    pub allocated: bool,
    pub marked: bool,
    pub generation: u8,
    pub references: Vec<BlockId>,
    pub age: u32,
    pub root: bool,
}
