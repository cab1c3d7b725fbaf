//! hostbridge - GC-safety bridge for native extension code
//!
//! This library implements the rooting discipline, object model, and
//! marshaling contract that native code needs to work with values managed
//! by a garbage-collected, dynamically-typed host runtime, without the
//! collector reclaiming them mid-computation.
//!
//! # Architecture
//!
//! Four layers, each depending on the one below:
//!
//! 1. **Value Model** (`value`, `heap`) - tagged-variant representation of
//!    runtime values: atomic vectors, interned strings, heterogeneous
//!    lists, pairlists/cons cells, symbols, and call forms, stored in an
//!    index-addressed slot arena with mark-and-sweep collection at
//!    allocation points.
//! 2. **Protection Stack** (`protect`) - per-context root registration:
//!    counted protect/unprotect with call-boundary imbalance detection,
//!    stable handles for out-of-order release and reprotection, and RAII
//!    scopes that balance themselves by construction.
//! 3. **Marshaling Layer** (`marshal`) - conversion between native
//!    scalars/arrays and vectors, the missing-value sentinel protocol per
//!    kind, kind coercions, slice views, and bulk fill.
//! 4. **Pairlist & Call Utilities** (`pairlist`, `call`) - cons-cell
//!    construction/traversal, language-form composition, attribute lists,
//!    and the native call entry contract.
//!
//! # The rooting discipline
//!
//! Every allocation is a potential collection point. A value reachable
//! only from native-local state must be on the protection stack across any
//! allocation, or the collector may reclaim it - silently, since
//! use-after-reclaim is prevented by discipline, not detected after the
//! fact. Arguments passed into a native call are already rooted by the
//! host; everything native code allocates is its own responsibility until
//! it is returned or attached to something rooted.
//!
//! # Example
//!
//! ```rust
//! use hostbridge::{Heap, Kind, ProtectScope};
//!
//! let mut heap = Heap::new();
//! let roots = heap.roots().clone();
//! let scope = ProtectScope::new(&roots);
//!
//! // Allocate, protect, fill, coerce
//! let counts = scope.protect(heap.alloc_vector(Kind::Int, 4)?);
//! heap.fill_int(counts, 7)?;
//! let reals = scope.protect(heap.coerce(counts, Kind::Real)?);
//!
//! assert_eq!(heap.real_slice(reals)?, &[7.0, 7.0, 7.0, 7.0]);
//! # Ok::<(), hostbridge::BridgeError>(())
//! ```

pub mod call;
pub mod error;
pub mod heap;
pub mod intern;
pub mod marshal;
pub mod pairlist;
pub mod protect;
pub mod value;

pub use call::{NativeFn, Registry};
pub use error::BridgeError;
pub use heap::Heap;
pub use intern::{intern, CharRef, Symbol};
pub use marshal::{is_na_or_nan, is_na_real, na_real, NA_INTEGER};
pub use protect::{ProtectHandle, ProtectScope, ProtectStack};
pub use value::{Complex, Kind, Logical, Value};
