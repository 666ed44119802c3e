use std::collections::BTreeSet;

use crate::block::BlockId;
use crate::heap::Heap;

/// Depth-first reachability walk over the reference graph, starting from
/// the root set. Sets the scratch `marked` flag on every reached block and
/// returns the reached ids.
///
/// Uses an explicit work stack: traversal depth is bounded by the live-set
/// size, not the call stack, so deep or adversarial graphs are safe. Ids
/// that no longer resolve (dangling references) are skipped, and the
/// visited set makes cyclic graphs terminate.
pub(crate) fn mark_from_roots(heap: &mut Heap) -> BTreeSet<BlockId> {
    let mut marked = BTreeSet::new();
    let mut work: Vec<BlockId> = heap.roots().collect();

    while let Some(id) = work.pop() {
        if marked.contains(&id) {
            continue;
        }
        let block = match heap.block_mut(id) {
            Some(block) => block,
            None => continue,
        };
        marked.insert(id);
        block.marked = true;
        work.extend(block.references.iter().copied());
    }

    log::trace!("mark phase reached {} blocks", marked.len());
    marked
}
