//! Protection-stack discipline under a stressed collector: every
//! allocation runs a collection pass, so a missing or misplaced protect
//! fails deterministically instead of intermittently.

use hostbridge::{BridgeError, Heap, Kind, ProtectScope};

fn init() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

#[test]
fn protected_values_survive_arbitrary_allocation_pressure() {
    init();
    let mut heap = Heap::new();
    heap.set_stress(true);

    let v = heap.int_vector(&[4, 8, 15, 16, 23, 42]);
    heap.protect(v);

    for _ in 0..200 {
        let _ = heap.alloc_vector(Kind::Real, 16).unwrap();
    }

    assert!(heap.is_live(v));
    assert_eq!(heap.int_slice(v).unwrap(), &[4, 8, 15, 16, 23, 42]);
    heap.unprotect(1).unwrap();
}

#[test]
fn unprotected_value_is_reclaimed() {
    init();
    let mut heap = Heap::new();
    heap.set_stress(true);

    let v = heap.int_vector(&[1, 2, 3]);
    // No protection: the very next allocation collects it, and the stale
    // handle ends up aliasing the replacement object
    let w = heap.alloc_vector(Kind::Real, 1).unwrap();
    assert_eq!(v, w);
    assert_eq!(heap.kind_of(v), Kind::Real);
}

#[test]
fn value_released_from_scope_is_collectible_again() {
    init();
    let mut heap = Heap::new();
    heap.set_stress(true);
    let roots = heap.roots().clone();

    let v;
    {
        let scope = ProtectScope::new(&roots);
        v = scope.protect(heap.int_vector(&[9]));
        let _ = heap.alloc_vector(Kind::Real, 1).unwrap();
        assert!(heap.is_live(v));
    }
    // Scope dropped: v is no longer rooted
    heap.collect();
    assert!(!heap.is_live(v));
}

#[test]
fn reprotect_tracks_a_changing_value_at_fixed_depth() {
    init();
    let mut heap = Heap::new();
    heap.set_stress(true);
    let roots = heap.roots().clone();

    let mut acc = heap.scalar_int(0);
    let slot = roots.protect(acc);
    let depth = roots.depth();

    // Rebuild the accumulator each iteration; the protection slot is
    // redirected instead of growing the stack
    for i in 1..=10 {
        let prev = heap.as_integer(acc).unwrap();
        acc = heap.scalar_int(prev + i);
        roots.reprotect(slot, acc).unwrap();
    }

    assert_eq!(roots.depth(), depth);
    assert_eq!(heap.as_integer(acc).unwrap(), 55);
    roots.unprotect(1).unwrap();
}

#[test]
fn conditionally_allocated_values_release_out_of_order() {
    init();
    let mut heap = Heap::new();
    heap.set_stress(true);
    let roots = heap.roots().clone();

    let a = heap.scalar_int(1);
    let ha = roots.protect(a);
    let b = heap.scalar_int(2);
    let _hb = roots.protect(b);
    let c = heap.scalar_int(3);
    let _hc = roots.protect(c);

    // The first value is no longer needed, the later two still are
    roots.unprotect_handle(ha).unwrap();
    heap.collect();

    assert!(!heap.is_live(a));
    assert!(heap.is_live(b));
    assert!(heap.is_live(c));
    roots.unprotect(2).unwrap();
}

#[test]
fn partially_built_structures_need_their_own_protection() {
    init();
    let mut heap = Heap::new();
    heap.set_stress(true);
    let roots = heap.roots().clone();
    let scope = ProtectScope::new(&roots);

    // A child not yet installed into a protected parent is only safe
    // because it is independently protected across the parent's allocation
    let child = scope.protect(heap.int_vector(&[7]));
    let parent = scope.protect(heap.alloc_list(1));
    heap.set_list_elt(parent, 0, child).unwrap();

    for _ in 0..16 {
        let _ = heap.alloc_vector(Kind::Real, 1).unwrap();
    }
    assert!(heap.is_live(child));
    assert_eq!(heap.int_slice(heap.list_elt(parent, 0).unwrap()).unwrap(), &[7]);
}

#[test]
fn growing_a_chain_under_stress_with_reprotection() {
    init();
    let mut heap = Heap::new();
    heap.set_stress(true);
    let roots = heap.roots().clone();

    let mut chain = heap.nil();
    let slot = roots.protect(chain);
    for i in 0..32 {
        let elt = heap.scalar_int(i);
        let helt = roots.protect(elt);
        chain = heap.cons(None, elt, chain);
        roots.reprotect(slot, chain).unwrap();
        roots.unprotect_handle(helt).unwrap();
    }

    assert_eq!(heap.len(chain), 32);
    // Every cell and element survived; values come back newest-first
    for i in 0..32 {
        let elt = heap.nth(chain, i);
        assert_eq!(heap.as_integer(elt).unwrap(), 31 - i as i32);
    }
    roots.unprotect(1).unwrap();
}

#[test]
fn over_unprotect_is_detected_not_corrupting() {
    init();
    let mut heap = Heap::new();
    let v = heap.scalar_int(1);
    heap.protect(v);

    let err = heap.unprotect(2).unwrap_err();
    assert!(matches!(err, BridgeError::StackImbalance { .. }));

    // The original entry is intact and still roots its value
    heap.set_stress(true);
    let _ = heap.alloc_vector(Kind::Real, 1).unwrap();
    assert!(heap.is_live(v));
    heap.unprotect(1).unwrap();
}
