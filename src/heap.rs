//! The per-context value heap and its collector.
//!
//! Values live in an index-addressed slot arena; a [`Value`] handle is a
//! slot index. A mark-and-sweep pass runs synchronously inside allocation
//! (every allocation is a potential collection point), seeding from the
//! protection stack, the host-side roots, and nil, then tracing list
//! elements, cons-cell links, and attribute chains. Interned strings and
//! symbols live in process-wide pools and are never collected.
//!
//! The heap exists to make the rooting discipline real: with
//! [`set_stress`](Heap::set_stress) enabled a collection pass runs at every
//! allocation, so any value left unprotected across an allocation is
//! reclaimed immediately rather than "usually surviving".
//!
//! Accessing a reclaimed slot panics with a diagnostic. This is a contract
//! violation (a missing protection), the same class of defect as an
//! out-of-bounds index, not a recoverable error.

use std::rc::Rc;

use tracing::trace;

use crate::error::BridgeError;
use crate::intern::{CharRef, Symbol};
use crate::protect::{ProtectHandle, ProtectStack};
use crate::value::{Complex, Kind, Logical, Value, ValueData};

pub(crate) struct Node {
    pub(crate) data: ValueData,
    /// Attribute pairlist; nil when the value has no attributes
    pub(crate) attrs: Value,
}

/// Default number of allocations between collection passes
const DEFAULT_GC_TRIGGER: usize = 512;

/// A garbage-collected value heap, scoped to one execution context.
///
/// The heap owns the slot arena and the context's [`ProtectStack`]. It is
/// deliberately not `Send` or `Sync`: one native call stack per context,
/// protection state never shared across contexts.
pub struct Heap {
    slots: Vec<Option<Node>>,
    free: Vec<usize>,
    roots: Rc<ProtectStack>,
    /// Values rooted by the host itself: call arguments for the duration of
    /// a native call, and returned results
    host_roots: Vec<Value>,
    allocs_since_gc: usize,
    gc_trigger: usize,
    stress: bool,
}

impl Heap {
    pub fn new() -> Self {
        Self::with_gc_trigger(DEFAULT_GC_TRIGGER)
    }

    /// Create a heap that collects after every `gc_trigger` allocations
    pub fn with_gc_trigger(gc_trigger: usize) -> Self {
        Heap {
            // Slot 0 is always nil and is never swept
            slots: vec![Some(Node {
                data: ValueData::Nil,
                attrs: Value::NIL,
            })],
            free: Vec::new(),
            roots: Rc::new(ProtectStack::new()),
            host_roots: Vec::new(),
            allocs_since_gc: 0,
            gc_trigger: gc_trigger.max(1),
            stress: false,
        }
    }

    /// Force a collection pass at every allocation. Testing aid: makes any
    /// missing protection fail immediately instead of intermittently.
    pub fn set_stress(&mut self, stress: bool) {
        self.stress = stress;
    }

    /// The context's protection stack. Clone the `Rc` to hold the stack
    /// across mutable heap borrows (e.g. for a
    /// [`ProtectScope`](crate::protect::ProtectScope)).
    pub fn roots(&self) -> &Rc<ProtectStack> {
        &self.roots
    }

    /// Convenience for `self.roots().protect(value)`
    pub fn protect(&self, value: Value) -> ProtectHandle {
        self.roots.protect(value)
    }

    /// Convenience for `self.roots().unprotect(count)`
    pub fn unprotect(&self, count: usize) -> Result<(), BridgeError> {
        self.roots.unprotect(count)
    }

    /// The nil value
    pub fn nil(&self) -> Value {
        Value::NIL
    }

    // ------------------------------------------------------------------
    // Slot access
    // ------------------------------------------------------------------

    pub(crate) fn node(&self, v: Value) -> &Node {
        match &self.slots[v.index()] {
            Some(node) => node,
            None => panic!(
                "{:?} accessed after reclamation; it was not protected across an allocation",
                v
            ),
        }
    }

    pub(crate) fn node_mut(&mut self, v: Value) -> &mut Node {
        match &mut self.slots[v.index()] {
            Some(node) => node,
            None => panic!(
                "{:?} accessed after reclamation; it was not protected across an allocation",
                v
            ),
        }
    }

    /// O(1) kind tag read; never scans content
    pub fn kind_of(&self, v: Value) -> Kind {
        self.node(v).data.kind()
    }

    /// Length of a value, as the wide index type.
    ///
    /// Vector and list lengths are their cell counts; pairlist and language
    /// chains are walked to their terminating nil; nil is 0 and a symbol
    /// is 1.
    pub fn len(&self, v: Value) -> usize {
        match &self.node(v).data {
            ValueData::Nil => 0,
            ValueData::Logical(xs) => xs.len(),
            ValueData::Int(xs) => xs.len(),
            ValueData::Real(xs) => xs.len(),
            ValueData::Complex(xs) => xs.len(),
            ValueData::Raw(xs) => xs.len(),
            ValueData::Str(xs) => xs.len(),
            ValueData::List(xs) => xs.len(),
            ValueData::Pair { .. } | ValueData::Lang { .. } => self.chain_len(v),
            ValueData::Symbol(_) => 1,
        }
    }

    pub fn is_empty(&self, v: Value) -> bool {
        self.len(v) == 0
    }

    fn chain_len(&self, mut v: Value) -> usize {
        let mut n = 0;
        loop {
            match &self.node(v).data {
                ValueData::Pair { tail, .. } | ValueData::Lang { tail, .. } => {
                    n += 1;
                    v = *tail;
                }
                _ => return n,
            }
        }
    }

    /// True if `v` currently refers to a live slot. Diagnostic aid for
    /// tests; production code must rely on protection, not on probing.
    pub fn is_live(&self, v: Value) -> bool {
        v.index() < self.slots.len() && self.slots[v.index()].is_some()
    }

    /// Number of live slots, nil included
    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    // ------------------------------------------------------------------
    // Allocation
    // ------------------------------------------------------------------

    pub(crate) fn alloc_node(&mut self, data: ValueData) -> Value {
        if self.stress || self.allocs_since_gc >= self.gc_trigger {
            self.collect();
        }
        self.allocs_since_gc += 1;
        let node = Node {
            data,
            attrs: Value::NIL,
        };
        match self.free.pop() {
            Some(i) => {
                self.slots[i] = Some(node);
                Value(i as u32)
            }
            None => {
                self.slots.push(Some(node));
                Value((self.slots.len() - 1) as u32)
            }
        }
    }

    /// Allocate a vector of the requested kind and length.
    ///
    /// Cell content is unspecified until written; callers needing defined
    /// initial content must say so via [`alloc_vector_zeroed`]
    /// (Heap::alloc_vector_zeroed). Like every allocation, this may run a
    /// collection pass first, so anything the caller still depends on must
    /// already be protected.
    pub fn alloc_vector(&mut self, kind: Kind, len: usize) -> Result<Value, BridgeError> {
        let data = match kind {
            Kind::Logical => ValueData::Logical(vec![Logical::False; len]),
            Kind::Int => ValueData::Int(vec![0; len]),
            Kind::Real => ValueData::Real(vec![0.0; len]),
            Kind::Complex => ValueData::Complex(vec![Complex::default(); len]),
            Kind::Raw => ValueData::Raw(vec![0; len]),
            Kind::Str => ValueData::Str(vec![CharRef::Na; len]),
            Kind::Nil
            | Kind::List
            | Kind::Pair
            | Kind::Lang
            | Kind::Symbol => {
                return Err(BridgeError::InvalidArgument(format!(
                    "alloc_vector: {} is not an atomic vector kind",
                    kind
                )))
            }
        };
        Ok(self.alloc_node(data))
    }

    /// Allocate a vector with defined initial content: numeric kinds zero,
    /// logical false, string cells the empty string.
    pub fn alloc_vector_zeroed(&mut self, kind: Kind, len: usize) -> Result<Value, BridgeError> {
        let v = self.alloc_vector(kind, len)?;
        if let ValueData::Str(cells) = &mut self.node_mut(v).data {
            let blank = CharRef::intern("");
            cells.fill(blank);
        }
        Ok(v)
    }

    /// Allocate a heterogeneous list of `len` slots, each initialized to nil
    pub fn alloc_list(&mut self, len: usize) -> Value {
        self.alloc_node(ValueData::List(vec![Value::NIL; len]))
    }

    /// Allocate a symbol value for `name`. The symbol table entry itself is
    /// interned and permanent; the heap slot only wraps it.
    pub fn alloc_symbol(&mut self, name: Symbol) -> Value {
        self.alloc_node(ValueData::Symbol(name))
    }

    // ------------------------------------------------------------------
    // Duplication (copy-on-modify support)
    // ------------------------------------------------------------------

    /// Deep copy: every nested value and the attribute chain are copied.
    ///
    /// Required before mutating anything native code did not itself just
    /// allocate, because other live bindings may share the storage. Symbols
    /// and nil are globally unique and returned as-is.
    pub fn duplicate(&mut self, v: Value) -> Value {
        match &self.node(v).data {
            ValueData::Nil | ValueData::Symbol(_) => return v,
            _ => {}
        }

        let base = self.roots.depth();
        let out = match self.node(v).data.clone() {
            ValueData::Nil | ValueData::Symbol(_) => unreachable!(),
            data @ (ValueData::Logical(_)
            | ValueData::Int(_)
            | ValueData::Real(_)
            | ValueData::Complex(_)
            | ValueData::Raw(_)
            | ValueData::Str(_)) => self.alloc_node(data),
            ValueData::List(items) => {
                let out = self.alloc_node(ValueData::List(vec![Value::NIL; items.len()]));
                self.roots.protect(out);
                for (i, child) in items.into_iter().enumerate() {
                    // Each copy is installed into the protected parent
                    // before the next allocation can collect it
                    let copy = self.duplicate(child);
                    if let ValueData::List(slots) = &mut self.node_mut(out).data {
                        slots[i] = copy;
                    }
                }
                out
            }
            ValueData::Pair { tag, head, tail } => {
                let head_copy = self.duplicate(head);
                self.roots.protect(head_copy);
                let tail_copy = self.duplicate(tail);
                self.roots.protect(tail_copy);
                self.alloc_node(ValueData::Pair {
                    tag,
                    head: head_copy,
                    tail: tail_copy,
                })
            }
            ValueData::Lang { head, tail } => {
                let head_copy = self.duplicate(head);
                self.roots.protect(head_copy);
                let tail_copy = self.duplicate(tail);
                self.roots.protect(tail_copy);
                self.alloc_node(ValueData::Lang {
                    head: head_copy,
                    tail: tail_copy,
                })
            }
        };

        let attrs = self.node(v).attrs;
        if !attrs.is_nil() {
            self.roots.protect(out);
            let attrs_copy = self.duplicate(attrs);
            self.node_mut(out).attrs = attrs_copy;
        }

        self.roots.pop_to(base);
        out
    }

    /// Shallow copy: only the top-level container is copied; nested value
    /// handles and the attribute chain are shared with the original.
    pub fn shallow_duplicate(&mut self, v: Value) -> Value {
        match &self.node(v).data {
            ValueData::Nil | ValueData::Symbol(_) => return v,
            _ => {}
        }
        let data = self.node(v).data.clone();
        let attrs = self.node(v).attrs;
        let out = self.alloc_node(data);
        self.node_mut(out).attrs = attrs;
        out
    }

    // ------------------------------------------------------------------
    // Host-side rooting (call boundary)
    // ------------------------------------------------------------------

    /// Root `value` on the host's behalf: call arguments for the duration
    /// of a native call, and values returned to the host.
    pub fn host_root(&mut self, value: Value) {
        self.host_roots.push(value);
    }

    /// Release the `count` most recently added host roots
    pub fn host_unroot(&mut self, count: usize) {
        let len = self.host_roots.len();
        self.host_roots.truncate(len.saturating_sub(count));
    }

    // ------------------------------------------------------------------
    // Collection
    // ------------------------------------------------------------------

    /// Run a mark-and-sweep pass now.
    ///
    /// Live set: nil, every value on the protection stack, every host root,
    /// and everything transitively reachable from those through list
    /// elements, cons links, and attribute chains.
    pub fn collect(&mut self) {
        let slot_count = self.slots.len();
        let mut marks = vec![false; slot_count];
        let mut work: Vec<usize> = Vec::new();
        marks[0] = true;

        {
            let mut seed = |v: Value| {
                let i = v.index();
                if i < slot_count && !marks[i] {
                    marks[i] = true;
                    work.push(i);
                }
            };
            let roots = Rc::clone(&self.roots);
            roots.for_each_root(&mut seed);
            for &v in &self.host_roots {
                seed(v);
            }
        }

        while let Some(i) = work.pop() {
            let node = match &self.slots[i] {
                Some(node) => node,
                None => continue,
            };
            let mut touch = |v: Value| {
                let j = v.index();
                if j < slot_count && !marks[j] {
                    marks[j] = true;
                    work.push(j);
                }
            };
            touch(node.attrs);
            match &node.data {
                ValueData::List(items) => {
                    for &child in items {
                        touch(child);
                    }
                }
                ValueData::Pair { head, tail, .. } | ValueData::Lang { head, tail } => {
                    touch(*head);
                    touch(*tail);
                }
                ValueData::Nil
                | ValueData::Logical(_)
                | ValueData::Int(_)
                | ValueData::Real(_)
                | ValueData::Complex(_)
                | ValueData::Raw(_)
                | ValueData::Str(_)
                | ValueData::Symbol(_) => {}
            }
        }

        let mut reclaimed = 0usize;
        for i in 1..slot_count {
            if self.slots[i].is_some() && !marks[i] {
                self.slots[i] = None;
                self.free.push(i);
                reclaimed += 1;
            }
        }
        self.allocs_since_gc = 0;
        trace!(reclaimed, live = slot_count - self.free.len(), "collection pass");
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_of_is_tag_read() {
        let mut heap = Heap::new();
        let v = heap.alloc_vector(Kind::Int, 3).unwrap();
        assert_eq!(heap.kind_of(v), Kind::Int);
        assert_eq!(heap.kind_of(heap.nil()), Kind::Nil);
    }

    #[test]
    fn test_alloc_vector_rejects_non_vector_kinds() {
        let mut heap = Heap::new();
        assert!(heap.alloc_vector(Kind::List, 3).is_err());
        assert!(heap.alloc_vector(Kind::Pair, 1).is_err());
        assert!(heap.alloc_vector(Kind::Nil, 0).is_err());
    }

    #[test]
    fn test_len_is_wide() {
        let mut heap = Heap::new();
        let v = heap.alloc_vector(Kind::Raw, 10).unwrap();
        let n: usize = heap.len(v);
        assert_eq!(n, 10);
        assert_eq!(heap.len(heap.nil()), 0);
    }

    #[test]
    fn test_protected_value_survives_collection() {
        let mut heap = Heap::new();
        heap.set_stress(true);

        let v = heap.alloc_vector(Kind::Int, 4).unwrap();
        heap.protect(v);
        heap.fill_int(v, 9).unwrap();

        // Every one of these allocations forces a collection pass
        for _ in 0..64 {
            let _ = heap.alloc_vector(Kind::Real, 8).unwrap();
        }

        assert!(heap.is_live(v));
        assert_eq!(heap.int_slice(v).unwrap(), &[9, 9, 9, 9]);
        heap.unprotect(1).unwrap();
    }

    #[test]
    fn test_unprotected_value_is_reclaimed() {
        let mut heap = Heap::new();
        let v = heap.alloc_vector(Kind::Int, 4).unwrap();
        // No protection: any collection pass frees it
        heap.collect();
        assert!(!heap.is_live(v));
    }

    #[test]
    fn test_stale_handle_aliases_replacement_object() {
        let mut heap = Heap::new();
        heap.set_stress(true);

        let v = heap.alloc_vector(Kind::Int, 4).unwrap();
        // The next allocation's collection pass frees the unprotected
        // vector and hands its slot to the new value: the stale handle now
        // silently reads the replacement. This is the use-after-reclaim
        // failure mode the protection stack exists to prevent.
        let w = heap.alloc_vector(Kind::Real, 2).unwrap();
        assert_eq!(v, w);
        assert_eq!(heap.kind_of(v), Kind::Real);
    }

    #[test]
    fn test_protection_is_transitive_through_containers() {
        let mut heap = Heap::new();
        heap.set_stress(true);

        let list = heap.alloc_list(2);
        heap.protect(list);
        let child = heap.scalar_int(5);
        heap.set_list_elt(list, 0, child).unwrap();

        for _ in 0..16 {
            let _ = heap.alloc_vector(Kind::Real, 1).unwrap();
        }

        // The child is live only through the protected list
        assert!(heap.is_live(child));
        assert_eq!(heap.int_slice(child).unwrap(), &[5]);
        heap.unprotect(1).unwrap();
    }

    #[test]
    fn test_duplicate_vector_is_independent() {
        let mut heap = Heap::new();
        let v = heap.int_vector(&[1, 2, 3]);
        heap.protect(v);
        let d = heap.duplicate(v);
        heap.protect(d);

        heap.int_slice_mut(d).unwrap()[0] = 99;
        assert_eq!(heap.int_slice(v).unwrap(), &[1, 2, 3]);
        assert_eq!(heap.int_slice(d).unwrap(), &[99, 2, 3]);
        heap.unprotect(2).unwrap();
    }

    #[test]
    fn test_duplicate_list_is_deep() {
        let mut heap = Heap::new();
        let list = heap.alloc_list(1);
        heap.protect(list);
        let inner = heap.int_vector(&[7]);
        heap.set_list_elt(list, 0, inner).unwrap();

        let copy = heap.duplicate(list);
        heap.protect(copy);
        let copy_inner = heap.list_elt(copy, 0).unwrap();
        assert_ne!(copy_inner, inner);

        heap.int_slice_mut(copy_inner).unwrap()[0] = 0;
        assert_eq!(heap.int_slice(inner).unwrap(), &[7]);
        heap.unprotect(2).unwrap();
    }

    #[test]
    fn test_shallow_duplicate_shares_children() {
        let mut heap = Heap::new();
        let list = heap.alloc_list(1);
        heap.protect(list);
        let inner = heap.int_vector(&[7]);
        heap.set_list_elt(list, 0, inner).unwrap();

        let copy = heap.shallow_duplicate(list);
        assert_ne!(copy, list);
        assert_eq!(heap.list_elt(copy, 0).unwrap(), inner);
        heap.unprotect(1).unwrap();
    }

    #[test]
    fn test_duplicate_symbol_returns_same_object() {
        let mut heap = Heap::new();
        let sym = heap.alloc_symbol(Symbol::new("names"));
        heap.protect(sym);
        assert_eq!(heap.duplicate(sym), sym);
        heap.unprotect(1).unwrap();
    }

    #[test]
    fn test_duplicate_under_stress_protects_its_intermediates() {
        let mut heap = Heap::new();
        heap.set_stress(true);

        let list = heap.alloc_list(3);
        heap.protect(list);
        for i in 0..3 {
            let child = heap.int_vector(&[i as i32]);
            heap.set_list_elt(list, i, child).unwrap();
        }

        let depth_before = heap.roots().depth();
        let copy = heap.duplicate(list);
        assert_eq!(heap.roots().depth(), depth_before);

        heap.protect(copy);
        for i in 0..3 {
            let child = heap.list_elt(copy, i).unwrap();
            assert_eq!(heap.int_slice(child).unwrap(), &[i as i32]);
        }
        heap.unprotect(2).unwrap();
    }

    #[test]
    fn test_freed_slots_are_reused() {
        let mut heap = Heap::new();
        let v = heap.alloc_vector(Kind::Int, 1).unwrap();
        let before = heap.live_count();
        heap.collect();
        assert!(!heap.is_live(v));
        let w = heap.alloc_vector(Kind::Int, 1).unwrap();
        assert_eq!(heap.live_count(), before);
        let _ = w;
    }
}
