use crate::{
    Algorithm, Collector, CollectionKind, Copying, Generational, Heap, HeapConfig, HeapError,
    MarkSweep, MetricsTracker, RefCounting, Simulator, WorkloadGenerator,
};

fn small_config() -> HeapConfig {
    // 160 bytes at 16 bytes/unit = 10 units.
    HeapConfig {
        total_size: 160,
        unit_size: 16,
        promotion_age: 2,
    }
}

fn small_heap() -> Heap {
    Heap::new(&small_config())
}

fn assert_accounting(heap: &Heap) {
    assert_eq!(heap.free_units() + heap.used_units(), heap.capacity_units());
    let sum: usize = heap.snapshot().iter().map(|b| b.size).sum();
    assert_eq!(sum, heap.used_units());
    assert!(heap.snapshot().iter().all(|b| !b.marked));
}

#[test]
fn allocate_and_deallocate_accounting() {
    let mut heap = small_heap();
    assert_eq!(heap.capacity_units(), 10);

    let a = heap.allocate(4, true).unwrap();
    assert_eq!(heap.free_units(), 6);
    assert_eq!(heap.used_units(), 4);
    assert_eq!(heap.root_count(), 1);
    assert_accounting(&heap);

    assert!(heap.deallocate(a));
    assert_eq!(heap.free_units(), 10);
    assert_eq!(heap.root_count(), 0);
    assert!(!heap.deallocate(a), "double free must fail");
    assert_accounting(&heap);
}

#[test]
fn allocate_refuses_oversized_requests() {
    let mut heap = small_heap();
    heap.allocate(8, false).unwrap();
    assert!(heap.allocate(3, false).is_none());
    // Counters untouched by the refused request.
    assert_eq!(heap.free_units(), 2);
    assert_eq!(heap.used_units(), 8);
    assert!(heap.allocate(0, false).is_none());
    assert_accounting(&heap);
}

#[test]
fn reference_edits() {
    let mut heap = small_heap();
    let a = heap.allocate(1, true).unwrap();
    let b = heap.allocate(1, false).unwrap();

    assert!(heap.add_reference(a, b));
    assert!(heap.add_reference(a, b), "add_reference is idempotent");
    assert!(heap.add_reference(a, a), "self-reference is permitted");
    assert!(!heap.add_reference(b, crate::BlockId(999)));

    assert!(heap.remove_reference(a, b));
    assert!(!heap.remove_reference(a, b), "edge already gone");
    assert!(!heap.remove_reference(crate::BlockId(999), a));
    assert_accounting(&heap);
}

#[test]
fn stats_and_reset() {
    let mut heap = small_heap();
    assert_eq!(heap.stats().fragmentation, 0.0);

    heap.allocate(3, true).unwrap();
    heap.allocate(2, false).unwrap();
    let stats = heap.stats();
    assert_eq!(stats.total_bytes, 160);
    assert_eq!(stats.used_units, 5);
    assert_eq!(stats.total_objects, 2);
    assert_eq!(stats.root_objects, 1);
    assert_eq!(stats.fragmentation, 0.0);

    heap.reset();
    assert!(heap.is_empty());
    assert_eq!(heap.free_units(), 10);
    assert_eq!(heap.stats().fragmentation, 0.0);
}

#[test]
fn mark_sweep_keeps_rooted_chain() {
    let mut heap = small_heap();
    let a = heap.allocate(2, true).unwrap();
    let b = heap.allocate(3, false).unwrap();
    heap.add_reference(a, b);

    let result = MarkSweep::new().collect(&mut heap);
    assert_eq!(result.objects_freed, 0);
    assert_eq!(result.objects_scanned, 2);
    assert_eq!(result.marked_objects(), Some(2));
    assert!(heap.contains(a) && heap.contains(b));
    assert_accounting(&heap);
}

#[test]
fn mark_sweep_collects_unrooted_cycle() {
    let mut heap = small_heap();
    let c = heap.allocate(1, false).unwrap();
    let d = heap.allocate(1, false).unwrap();
    heap.add_reference(c, d);
    heap.add_reference(d, c);

    let result = MarkSweep::new().collect(&mut heap);
    assert_eq!(result.objects_freed, 2);
    assert_eq!(result.bytes_reclaimed, 32);
    assert!(heap.is_empty());
    assert_accounting(&heap);
}

#[test]
fn mark_sweep_ages_survivors_and_is_idempotent() {
    let mut heap = small_heap();
    let a = heap.allocate(1, true).unwrap();
    let b = heap.allocate(1, false).unwrap();
    heap.add_reference(a, b);
    heap.allocate(1, false).unwrap(); // garbage

    let mut gc = MarkSweep::new();
    let first = gc.collect(&mut heap);
    assert_eq!(first.objects_freed, 1);
    let survivors = heap.object_count();

    let second = gc.collect(&mut heap);
    assert_eq!(second.objects_freed, 0);
    assert_eq!(second.marked_objects(), Some(survivors));
    assert_eq!(heap.block(a).unwrap().age(), 2);
    assert_eq!(heap.block(b).unwrap().age(), 2);
}

#[test]
fn collect_on_empty_heap_is_all_zero() {
    let mut heap = small_heap();
    let results = [
        MarkSweep::new().collect(&mut heap),
        RefCounting::new().collect(&mut heap),
        Generational::new().collect(&mut heap),
        Copying::new(&heap).collect(&mut heap),
    ];
    for result in &results {
        assert_eq!(result.objects_scanned, 0);
        assert_eq!(result.objects_freed, 0);
        assert_eq!(result.bytes_reclaimed, 0);
    }
}

#[test]
fn dangling_references_are_skipped() {
    let mut heap = small_heap();
    let a = heap.allocate(1, true).unwrap();
    let b = heap.allocate(1, false).unwrap();
    heap.add_reference(a, b);
    heap.deallocate(b);

    let result = MarkSweep::new().collect(&mut heap);
    assert_eq!(result.objects_freed, 0);
    assert!(heap.contains(a));

    let result = RefCounting::new().collect(&mut heap);
    assert_eq!(result.objects_freed, 0);

    let result = Copying::new(&heap).collect(&mut heap);
    assert_eq!(result.objects_copied(), Some(1));
    assert_accounting(&heap);
}

#[test]
fn refcount_collects_unrooted_cycle() {
    let mut heap = small_heap();
    let c = heap.allocate(1, false).unwrap();
    let d = heap.allocate(1, false).unwrap();
    heap.add_reference(c, d);
    heap.add_reference(d, c);

    let result = RefCounting::new().collect(&mut heap);
    assert_eq!(result.cycles_detected(), Some(2));
    assert_eq!(result.objects_freed, 2);
    assert_eq!(result.bytes_reclaimed, 32);
    assert!(heap.is_empty());
}

#[test]
fn refcount_flags_path_into_cycle() {
    // x -> y -> z -> y: x is not on the cycle but sits on the path that
    // reaches it, and gets flagged along with the cycle members.
    let mut heap = small_heap();
    let x = heap.allocate(1, false).unwrap();
    let y = heap.allocate(1, false).unwrap();
    let z = heap.allocate(1, false).unwrap();
    heap.add_reference(x, y);
    heap.add_reference(y, z);
    heap.add_reference(z, y);

    let result = RefCounting::new().collect(&mut heap);
    assert_eq!(result.cycles_detected(), Some(3));
    assert_eq!(result.objects_freed, 3);
    assert!(heap.is_empty());
}

#[test]
fn refcount_never_deallocates_roots() {
    // r (root) -> x -> y -> x: the whole path is cycle-flagged, r included.
    // r counts toward objects_freed but stays allocated.
    let mut heap = small_heap();
    let r = heap.allocate(1, true).unwrap();
    let x = heap.allocate(1, false).unwrap();
    let y = heap.allocate(1, false).unwrap();
    heap.add_reference(r, x);
    heap.add_reference(x, y);
    heap.add_reference(y, x);

    let result = RefCounting::new().collect(&mut heap);
    assert_eq!(result.cycles_detected(), Some(3));
    assert_eq!(result.objects_freed, 3);
    assert!(heap.contains(r));
    assert!(!heap.contains(x) && !heap.contains(y));
    assert_eq!(result.bytes_reclaimed, 32);
    assert_accounting(&heap);
}

#[test]
fn refcount_keeps_externally_referenced_blocks() {
    let mut heap = small_heap();
    let r = heap.allocate(1, true).unwrap();
    let a = heap.allocate(1, false).unwrap();
    heap.add_reference(r, a);
    let garbage = heap.allocate(1, false).unwrap();

    let result = RefCounting::new().collect(&mut heap);
    assert_eq!(result.objects_freed, 1);
    assert!(heap.contains(a));
    assert!(!heap.contains(garbage));
    assert_eq!(heap.block(a).unwrap().age(), 1);
}

#[test]
fn generational_promotes_at_threshold() {
    let mut heap = small_heap();
    let e = heap.allocate(1, true).unwrap();
    let mut gc = Generational::with_promotion_age(2);

    let first = gc.collect_kind(&mut heap, CollectionKind::Minor);
    assert_eq!(first.objects_promoted(), Some(0));
    assert_eq!(heap.block(e).unwrap().age(), 1);
    assert_eq!(heap.block(e).unwrap().generation(), 0);

    let second = gc.collect_kind(&mut heap, CollectionKind::Minor);
    assert_eq!(second.objects_promoted(), Some(1));
    assert_eq!(heap.block(e).unwrap().age(), 2);
    assert_eq!(heap.block(e).unwrap().generation(), 1);
    assert_accounting(&heap);
}

#[test]
fn generational_minor_ignores_old_generation() {
    let mut heap = small_heap();
    let e = heap.allocate(1, true).unwrap();
    let f = heap.allocate(1, false).unwrap();
    heap.add_reference(e, f);
    let mut gc = Generational::with_promotion_age(2);

    // Two minors promote both to the old generation.
    gc.collect_kind(&mut heap, CollectionKind::Minor);
    gc.collect_kind(&mut heap, CollectionKind::Minor);
    assert_eq!(heap.block(f).unwrap().generation(), 1);

    // f becomes unreachable; a minor cycle must not touch it.
    heap.remove_reference(e, f);
    let minor = gc.collect_kind(&mut heap, CollectionKind::Minor);
    assert_eq!(minor.objects_freed, 0);
    assert!(heap.contains(f));

    let major = gc.collect_kind(&mut heap, CollectionKind::Major);
    assert_eq!(major.objects_freed, 1);
    assert!(!heap.contains(f));
    assert_accounting(&heap);
}

#[test]
fn generational_major_does_not_double_age_fresh_promotions() {
    let mut heap = small_heap();
    let e = heap.allocate(1, true).unwrap();
    let mut gc = Generational::with_promotion_age(1);

    let result = gc.collect_kind(&mut heap, CollectionKind::Major);
    assert_eq!(result.objects_promoted(), Some(1));
    assert_eq!(heap.block(e).unwrap().age(), 1);
}

#[test]
fn copying_relocates_rooted_chain() {
    let mut heap = small_heap();
    let a = heap.allocate(1, true).unwrap();
    let b = heap.allocate(2, false).unwrap();
    let c = heap.allocate(3, false).unwrap();
    heap.add_reference(a, b);
    heap.add_reference(b, c);

    let mut gc = Copying::new(&heap);
    let result = gc.collect(&mut heap);
    assert_eq!(result.objects_scanned, 3);
    assert_eq!(result.objects_copied(), Some(3));
    assert_eq!(result.objects_freed, 0);

    // All three ids changed.
    for old in [a, b, c] {
        assert!(!heap.contains(old));
    }
    assert_eq!(heap.object_count(), 3);

    // The root moved with the copy and the chain shape survived; the sizes
    // identify which block is which under the new ids.
    let new_a = heap.roots().next().unwrap();
    let view_a = heap.block(new_a).unwrap().view();
    assert_eq!(view_a.size, 1);
    assert_eq!(view_a.age, 1);
    assert_eq!(view_a.references.len(), 1);
    let view_b = heap.block(view_a.references[0]).unwrap().view();
    assert_eq!(view_b.size, 2);
    let view_c = heap.block(view_b.references[0]).unwrap().view();
    assert_eq!(view_c.size, 3);
    assert!(view_c.references.is_empty());
    assert_accounting(&heap);
}

#[test]
fn copying_terminates_on_cycles_and_discards_garbage() {
    let mut heap = small_heap();
    let r = heap.allocate(1, true).unwrap();
    let s = heap.allocate(1, false).unwrap();
    heap.add_reference(r, s);
    heap.add_reference(s, r);
    let garbage = heap.allocate(2, false).unwrap();

    let mut gc = Copying::new(&heap);
    let result = gc.collect(&mut heap);
    assert_eq!(result.objects_copied(), Some(2));
    assert_eq!(result.objects_freed, 1);
    assert_eq!(result.bytes_reclaimed, 32);
    assert!(!heap.contains(garbage));

    // The ring survived under new ids.
    let new_r = heap.roots().next().unwrap();
    let view_r = heap.block(new_r).unwrap().view();
    let new_s = view_r.references[0];
    let view_s = heap.block(new_s).unwrap().view();
    assert_eq!(view_s.references, vec![new_r]);

    // The from-space view now holds exactly the relocated ids.
    let space: Vec<_> = gc.from_space().collect();
    assert_eq!(space, vec![new_r.min(new_s), new_r.max(new_s)]);

    // Second cycle on the stable graph frees nothing more.
    let again = gc.collect(&mut heap);
    assert_eq!(again.objects_freed, 0);
    assert_eq!(again.objects_copied(), Some(2));
    assert_accounting(&heap);
}

#[test]
fn copying_preserves_generation_and_root_flags() {
    let mut heap = small_heap();
    let r = heap.allocate(2, true).unwrap();
    heap.block_mut(r).unwrap().generation = 1;
    heap.block_mut(r).unwrap().age = 3;

    let mut gc = Copying::new(&heap);
    gc.collect(&mut heap);

    let new_r = heap.roots().next().unwrap();
    let block = heap.block(new_r).unwrap();
    assert!(block.is_root());
    assert_eq!(block.generation(), 1);
    assert_eq!(block.age(), 4);
    assert_eq!(block.size(), 2);
}

#[test]
fn tracker_records_and_summarizes() {
    let mut heap = small_heap();
    heap.allocate(1, false).unwrap();
    heap.allocate(1, false).unwrap();

    let mut tracker = MetricsTracker::new();
    assert_eq!(tracker.summary().total_cycles, 0);
    assert_eq!(tracker.summary().total_objects_freed, 0);
    assert_eq!(tracker.export(), "");

    let mut gc = MarkSweep::new();
    let id = tracker.record(gc.collect(&mut heap));
    assert_eq!(id, 1);
    let id = tracker.record(gc.collect(&mut heap));
    assert_eq!(id, 2);

    let summary = tracker.summary();
    assert_eq!(summary.total_cycles, 2);
    assert_eq!(summary.total_objects_freed, 2);
    assert_eq!(summary.total_bytes_reclaimed, 32);
    assert!(summary.min_pause_ms <= summary.avg_pause_ms);
    assert!(summary.avg_pause_ms <= summary.max_pause_ms);

    tracker.reset();
    assert_eq!(tracker.cycles().len(), 0);
    assert_eq!(tracker.record(gc.collect(&mut heap)), 1);
}

#[test]
fn tracker_comparison_groups_by_algorithm() {
    let mut heap = small_heap();
    let mut tracker = MetricsTracker::new();
    let mut marksweep = MarkSweep::new();
    let mut refcount = RefCounting::new();

    heap.allocate(1, false).unwrap();
    tracker.record(marksweep.collect(&mut heap));
    heap.allocate(1, false).unwrap();
    heap.allocate(1, false).unwrap();
    tracker.record(marksweep.collect(&mut heap));
    heap.allocate(1, false).unwrap();
    tracker.record(refcount.collect(&mut heap));

    let comparison = tracker.comparison();
    assert_eq!(comparison.len(), 2);
    let ms = &comparison[&Algorithm::MarkSweep];
    assert_eq!(ms.cycles, 2);
    assert_eq!(ms.total_objects_freed, 3);
    assert_eq!(ms.throughput, 1.5);
    let rc = &comparison[&Algorithm::RefCounting];
    assert_eq!(rc.cycles, 1);
    assert_eq!(rc.total_objects_freed, 1);
}

#[test]
fn tracker_export_is_fixed_column_csv() {
    let mut heap = small_heap();
    heap.allocate(1, false).unwrap();
    let mut tracker = MetricsTracker::new();
    tracker.record(MarkSweep::new().collect(&mut heap));
    tracker.record(RefCounting::new().collect(&mut heap));

    let export = tracker.export();
    let lines: Vec<&str> = export.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(
        lines[0],
        "cycle_id,algorithm,timestamp,objects_scanned,objects_freed,bytes_reclaimed,pause_duration"
    );
    assert!(lines[1].starts_with("1,Mark-Sweep,"));
    assert!(lines[2].starts_with("2,Reference Counting,"));
}

#[test]
fn cycle_result_serializes_flat() {
    let mut heap = small_heap();
    heap.allocate(1, true).unwrap();

    let result = MarkSweep::new().collect(&mut heap);
    let value = serde_json::to_value(&result).unwrap();
    assert_eq!(value["algorithm"], "Mark-Sweep");
    assert_eq!(value["objects_freed"], 0);
    assert_eq!(value["marked_objects"], 1);
    assert!(value["pause_duration"].is_number());
    assert!(value["timestamp"].is_string());

    let mut heap = small_heap();
    heap.allocate(1, true).unwrap();
    let result = Generational::new().collect(&mut heap);
    let value = serde_json::to_value(&result).unwrap();
    assert_eq!(value["collection_type"], "Minor");
    assert_eq!(value["objects_promoted"], 0);

    let result = Copying::new(&heap).collect(&mut heap);
    let value = serde_json::to_value(&result).unwrap();
    assert_eq!(value["compaction"], true);
}

#[test]
fn session_maps_failures_to_errors() {
    let mut sim = Simulator::new(small_config());
    let a = sim.allocate(8, true).unwrap();

    assert_eq!(
        sim.allocate(3, false),
        Err(HeapError::OutOfMemory {
            requested: 3,
            available: 2
        })
    );

    let b = sim.allocate(1, false).unwrap();
    sim.add_reference(a, b).unwrap();
    assert_eq!(
        sim.add_reference(a, crate::BlockId(999)),
        Err(HeapError::NotFound(crate::BlockId(999)))
    );
    assert_eq!(
        sim.remove_reference(b, a),
        Err(HeapError::InvalidReference { from: b, to: a })
    );

    sim.deallocate(b).unwrap();
    assert_eq!(sim.deallocate(b), Err(HeapError::NotFound(b)));
}

#[test]
fn session_collects_and_tracks() {
    let mut sim = Simulator::new(small_config());
    let a = sim.allocate(1, true).unwrap();
    sim.allocate(1, false).unwrap();

    let result = sim.collect(Algorithm::MarkSweep);
    assert_eq!(result.objects_freed, 1);
    assert_eq!(sim.cycles().len(), 1);
    assert_eq!(sim.cycles()[0].cycle_id, 1);

    let result = sim.collect_major();
    assert_eq!(result.algorithm, Algorithm::Generational);
    assert_eq!(sim.cycles().len(), 2);

    assert!(sim.heap().contains(a));
    assert_eq!(sim.summary().total_cycles, 2);
    assert!(!sim.export_csv().is_empty());

    sim.reset_metrics();
    assert_eq!(sim.summary().total_cycles, 0);
}

#[test]
fn session_reset_resyncs_copying_spaces() {
    let mut sim = Simulator::new(small_config());
    sim.allocate(1, true).unwrap();
    sim.allocate(1, false).unwrap();
    sim.collect(Algorithm::Copying);

    sim.reset_heap();
    assert!(sim.heap().is_empty());
    assert_eq!(sim.stats().free_units, 10);

    // Stale from-space entries must not leak into the next cycle.
    sim.allocate(1, true).unwrap();
    let result = sim.collect(Algorithm::Copying);
    assert_eq!(result.objects_copied(), Some(1));
    assert_eq!(result.objects_freed, 0);
}

#[test]
fn shared_session_serializes_calls() {
    let sim = crate::shared(small_config());
    let id = sim.lock().allocate(1, true).unwrap();
    let result = sim.lock().collect(Algorithm::MarkSweep);
    assert_eq!(result.objects_freed, 0);
    assert!(sim.lock().heap().contains(id));
}

#[test]
fn workload_is_deterministic_under_a_seed() {
    let config = HeapConfig::default();
    let mut heap_a = Heap::new(&config);
    let mut heap_b = Heap::new(&config);
    let mut gen_a = WorkloadGenerator::with_seed(7);
    let mut gen_b = WorkloadGenerator::with_seed(7);

    let ids_a = gen_a.random_allocation(&mut heap_a, 10, 0.3);
    let ids_b = gen_b.random_allocation(&mut heap_b, 10, 0.3);
    assert_eq!(ids_a, ids_b);
    gen_a.create_references(&mut heap_a, &ids_a, 0.3);
    gen_b.create_references(&mut heap_b, &ids_b, 0.3);
    assert_eq!(heap_a.snapshot(), heap_b.snapshot());
}

#[test]
fn workload_shapes() {
    let mut heap = Heap::new(&HeapConfig::default());
    let mut workload = WorkloadGenerator::with_seed(42);

    let ring = workload.create_circular_reference(&mut heap, 3);
    assert_eq!(ring.len(), 3);
    for (i, &id) in ring.iter().enumerate() {
        let refs: Vec<_> = heap.block(id).unwrap().references().collect();
        assert_eq!(refs, vec![ring[(i + 1) % ring.len()]]);
    }

    let (long_lived, short_lived) = workload.mixed_workload(&mut heap);
    assert_eq!(long_lived.len(), 3);
    assert_eq!(short_lived.len(), 7);
    assert!(long_lived.iter().all(|&id| heap.block(id).unwrap().is_root()));
    for &keeper in long_lived.iter().take(2) {
        assert_eq!(heap.block(keeper).unwrap().references().count(), 3);
    }
    assert_accounting(&heap);

    // The ring is garbage, the kept short-lived blocks are not. The two
    // keepers may have sampled overlapping blocks, so count the union.
    let kept: std::collections::BTreeSet<_> = long_lived
        .iter()
        .take(2)
        .flat_map(|&keeper| heap.block(keeper).unwrap().references().collect::<Vec<_>>())
        .collect();
    let result = MarkSweep::new().collect(&mut heap);
    assert_eq!(result.objects_freed, 3 + short_lived.len() - kept.len());
}

#[test]
fn snapshot_views_match_blocks() {
    let mut heap = small_heap();
    let a = heap.allocate(2, true).unwrap();
    let b = heap.allocate(1, false).unwrap();
    heap.add_reference(a, b);

    let snapshot = heap.snapshot();
    assert_eq!(snapshot.len(), 2);
    let view_a = snapshot.iter().find(|v| v.id == a).unwrap();
    assert!(view_a.root && view_a.allocated && !view_a.marked);
    assert_eq!(view_a.references, vec![b]);
    assert_eq!(view_a.generation, 0);
    assert_eq!(view_a.age, 0);
}
