//! The protection stack: explicit root registration for native code.
//!
//! Every allocation is a potential collection point. A value reachable only
//! from native-local state must be pushed onto this stack before the next
//! allocation, or the collector may reclaim it mid-computation. The stack is
//! per-context (one per [`Heap`](crate::heap::Heap)), never shared across
//! contexts, and consulted by the collector through a single
//! "enumerate current roots" callback ([`ProtectStack::for_each_root`]).
//!
//! Two usage styles are supported:
//!
//! - Counted protect/unprotect, mirroring the host runtime's native API.
//!   Mismatched counts are detected at frame boundaries and reported as
//!   [`BridgeError::StackImbalance`] rather than silently corrected.
//! - RAII [`ProtectScope`] guards (acquire-on-construct, release-on-drop),
//!   which get matched pairing from block scoping and eliminate the
//!   imbalance defect class by construction.
//!
//! Handles returned by `protect` are stable serials, so
//! [`unprotect_handle`](ProtectStack::unprotect_handle) and
//! [`reprotect`](ProtectStack::reprotect) keep working after unrelated
//! entries are pushed or popped around them.

use std::cell::{Cell, RefCell};

use smallvec::SmallVec;

use crate::error::BridgeError;
use crate::value::Value;

/// Stable identifier for one protection-stack entry.
///
/// Remains valid until the entry is removed, regardless of pushes and pops
/// around it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtectHandle(u64);

#[derive(Clone, Copy)]
struct Entry {
    serial: u64,
    value: Value,
}

/// Per-context root stack.
///
/// Interior mutability lets RAII guards hold `&ProtectStack` while the heap
/// is mutably borrowed for allocation; the stack itself is not `Send`.
pub struct ProtectStack {
    entries: RefCell<SmallVec<[Entry; 32]>>,
    /// Base depths of currently active native-call frames
    frames: RefCell<Vec<usize>>,
    next_serial: Cell<u64>,
}

impl ProtectStack {
    pub fn new() -> Self {
        ProtectStack {
            entries: RefCell::new(SmallVec::new()),
            frames: RefCell::new(Vec::new()),
            next_serial: Cell::new(1),
        }
    }

    /// Current number of protected entries
    pub fn depth(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Push `value` onto the stack, marking it (and everything reachable
    /// from it) live for the collector until it is removed.
    pub fn protect(&self, value: Value) -> ProtectHandle {
        let serial = self.next_serial.get();
        self.next_serial.set(serial + 1);
        self.entries.borrow_mut().push(Entry { serial, value });
        ProtectHandle(serial)
    }

    /// Pop the `count` most recently pushed entries.
    ///
    /// Popping more than the current frame has pushed is a
    /// [`BridgeError::StackImbalance`]; nothing is removed in that case.
    pub fn unprotect(&self, count: usize) -> Result<(), BridgeError> {
        let mut entries = self.entries.borrow_mut();
        let floor = self.frames.borrow().last().copied().unwrap_or(0);
        let depth = entries.len();
        if count > depth - floor.min(depth) {
            return Err(BridgeError::StackImbalance {
                expected: floor,
                actual: depth.saturating_sub(count),
            });
        }
        entries.truncate(depth - count);
        Ok(())
    }

    /// Remove the specific entry identified by `handle`, which need not be
    /// topmost. Relative order of the remaining entries is preserved.
    pub fn unprotect_handle(&self, handle: ProtectHandle) -> Result<(), BridgeError> {
        let mut entries = self.entries.borrow_mut();
        match entries.iter().position(|e| e.serial == handle.0) {
            Some(pos) => {
                entries.remove(pos);
                Ok(())
            }
            None => Err(BridgeError::InvalidArgument(format!(
                "unknown protect handle {:?}",
                handle
            ))),
        }
    }

    /// Replace the value rooted at an existing entry without changing the
    /// stack shape. Used when a protected slot must track a newly allocated
    /// value inside a loop.
    pub fn reprotect(&self, handle: ProtectHandle, value: Value) -> Result<(), BridgeError> {
        let mut entries = self.entries.borrow_mut();
        match entries.iter_mut().find(|e| e.serial == handle.0) {
            Some(entry) => {
                entry.value = value;
                Ok(())
            }
            None => Err(BridgeError::InvalidArgument(format!(
                "unknown protect handle {:?}",
                handle
            ))),
        }
    }

    /// Enumerate every currently protected value. This is the only
    /// interface the collector consumes from this layer.
    pub fn for_each_root(&self, mut f: impl FnMut(Value)) {
        for entry in self.entries.borrow().iter() {
            f(entry.value);
        }
    }

    /// Truncate the stack to `depth`, removing newer entries. Infallible;
    /// used by scope guards and internal balanced sections.
    pub(crate) fn pop_to(&self, depth: usize) {
        let mut entries = self.entries.borrow_mut();
        if entries.len() > depth {
            entries.truncate(depth);
        }
    }

    /// Open a native-call frame; `unprotect` cannot reach below the
    /// returned base depth while the frame is active.
    pub(crate) fn enter_frame(&self) -> usize {
        let base = self.depth();
        self.frames.borrow_mut().push(base);
        base
    }

    /// Close the frame opened at `base`. A nonzero outstanding count is a
    /// [`BridgeError::StackImbalance`]; the stack is restored to `base`
    /// either way so later calls see a consistent root set.
    pub(crate) fn exit_frame(&self, base: usize) -> Result<(), BridgeError> {
        self.frames.borrow_mut().pop();
        let depth = self.depth();
        self.pop_to(base);
        if depth != base {
            Err(BridgeError::StackImbalance {
                expected: base,
                actual: depth,
            })
        } else {
            Ok(())
        }
    }
}

impl Default for ProtectStack {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII protection scope: every value protected through the scope is
/// released when the scope drops, in reverse order of registration.
///
/// ```
/// use hostbridge::{Heap, ProtectScope};
///
/// let mut heap = Heap::new();
/// let roots = heap.roots().clone();
/// let scope = ProtectScope::new(&roots);
///
/// let v = scope.protect(heap.scalar_int(7));
/// let w = scope.protect(heap.scalar_real(1.5));
/// // v and w survive any collection until `scope` drops
/// # let _ = (v, w);
/// ```
pub struct ProtectScope<'a> {
    stack: &'a ProtectStack,
    base: usize,
}

impl<'a> ProtectScope<'a> {
    pub fn new(stack: &'a ProtectStack) -> Self {
        ProtectScope {
            stack,
            base: stack.depth(),
        }
    }

    /// Protect `value` for the lifetime of this scope and hand it back
    pub fn protect(&self, value: Value) -> Value {
        self.stack.protect(value);
        value
    }

    /// Protect `value` and return a stable handle for later
    /// [`reprotect`](ProtectStack::reprotect)
    pub fn protect_slot(&self, value: Value) -> ProtectHandle {
        self.stack.protect(value)
    }

    /// Number of values this scope currently holds
    pub fn held(&self) -> usize {
        self.stack.depth().saturating_sub(self.base)
    }
}

impl Drop for ProtectScope<'_> {
    fn drop(&mut self) {
        self.stack.pop_to(self.base);
    }
}
