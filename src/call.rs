//! Native call dispatch: the boundary between the host and native code.
//!
//! A native routine registered with the host receives zero or more
//! already-rooted argument values and returns exactly one value, which the
//! host roots immediately upon return. The dispatcher enforces that frame:
//! arguments are rooted for the duration of the call, the protection stack
//! must return to its entry depth (a leftover or missing unprotect is a
//! [`BridgeError::StackImbalance`], reported as a defect rather than
//! silently repaired), and errors unwind to the caller through `Result`
//! propagation, the host's non-local error path.

use std::collections::HashMap;

use tracing::debug;

use crate::error::BridgeError;
use crate::heap::Heap;
use crate::intern::Symbol;
use crate::value::Value;

/// A native routine: already-rooted arguments in, exactly one value out.
///
/// Any value the routine allocates and still depends on across a later
/// allocation must go through the protection stack; the routine must leave
/// the stack at the depth it found it.
pub type NativeFn = fn(&mut Heap, &[Value]) -> Result<Value, BridgeError>;

/// Registry of native routines, keyed by interned symbol.
pub struct Registry {
    routines: HashMap<Symbol, NativeFn>,
}

impl Registry {
    pub fn new() -> Self {
        Registry {
            routines: HashMap::new(),
        }
    }

    /// Register `f` under `name`, replacing any previous registration
    pub fn register(&mut self, name: &str, f: NativeFn) {
        self.routines.insert(Symbol::new(name), f);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.routines.contains_key(&Symbol::new(name))
    }

    /// Invoke a registered routine under the call entry contract.
    ///
    /// Arguments are rooted on the host's behalf before the routine runs
    /// and released afterwards; the returned value is rooted host-side
    /// before being handed back. That root persists: each successful
    /// invoke leaves one host root behind, and the embedder must call
    /// [`Heap::host_unroot`] once it has consumed or re-rooted the result,
    /// or past results accumulate as live roots across calls.
    ///
    /// If the routine returns successfully but left the protection stack
    /// unbalanced, the call fails with `StackImbalance` and the stack is
    /// restored to its entry depth so later calls see a consistent root
    /// set.
    pub fn invoke(
        &self,
        heap: &mut Heap,
        name: &str,
        args: &[Value],
    ) -> Result<Value, BridgeError> {
        let sym = Symbol::new(name);
        let f = self.routines.get(&sym).copied().ok_or_else(|| {
            BridgeError::InvalidArgument(format!("no native routine registered as `{}`", name))
        })?;

        debug!(routine = name, args = args.len(), "native call");

        for &arg in args {
            heap.host_root(arg);
        }
        let base = heap.roots().enter_frame();
        let outcome = f(heap, args);
        let balance = heap.roots().exit_frame(base);
        heap.host_unroot(args.len());

        // A routine error takes precedence: its unwind is what left the
        // frame early, and exit_frame has already restored the depth
        let result = outcome?;
        balance?;

        heap.host_root(result);
        Ok(result)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
