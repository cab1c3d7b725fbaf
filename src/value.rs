// Core value representation: handles, kind tags, and cell types

use std::fmt;

use crate::intern::{CharRef, Symbol};

/// Opaque handle to a heap-managed value.
///
/// A `Value` is a slot index into its owning [`Heap`](crate::heap::Heap);
/// it is `Copy` and carries no lifetime. Holding a `Value` does *not* keep
/// the underlying object alive: any value reachable only through
/// native-local state must be on the protection stack for its entire
/// native-code lifetime, or a collection pass may reclaim it.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct Value(pub(crate) u32);

impl Value {
    /// The nil value, shared by every heap (slot 0 is always nil)
    pub const NIL: Value = Value(0);

    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }

    /// True if this handle is the nil value
    #[inline]
    pub fn is_nil(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_nil() {
            write!(f, "Value(nil)")
        } else {
            write!(f, "Value(#{})", self.0)
        }
    }
}

/// Closed set of value kinds. `kind_of` is an O(1) tag read; exhaustive
/// `match` over `Kind` is the intended dispatch style (no default arms).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    /// Terminal/empty marker for pairlists and missing attributes
    Nil,
    /// Three-state boolean vector
    Logical,
    /// 32-bit integer vector
    Int,
    /// 64-bit floating point vector
    Real,
    /// Complex (pair of f64) vector
    Complex,
    /// Byte vector; the only vector kind with no missing sentinel
    Raw,
    /// Vector of interned-string references
    Str,
    /// Heterogeneous, randomly-indexable sequence of values
    List,
    /// Cons cell: (optional tag, head, tail)
    Pair,
    /// Call form: a cons chain whose head is the operator
    Lang,
    /// Interned identifier
    Symbol,
}

impl Kind {
    /// True for the atomic vector kinds that own contiguous cell storage
    pub fn is_vector(self) -> bool {
        matches!(
            self,
            Kind::Logical | Kind::Int | Kind::Real | Kind::Complex | Kind::Raw | Kind::Str
        )
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Kind::Nil => "nil",
            Kind::Logical => "logical",
            Kind::Int => "integer",
            Kind::Real => "real",
            Kind::Complex => "complex",
            Kind::Raw => "raw",
            Kind::Str => "string",
            Kind::List => "list",
            Kind::Pair => "pairlist",
            Kind::Lang => "language",
            Kind::Symbol => "symbol",
        };
        write!(f, "{}", name)
    }
}

/// Three-state logical cell: true, false, or missing.
///
/// The missing state is a reserved third value, not an out-of-band encoding
/// of true/false.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Logical {
    #[default]
    False,
    True,
    Na,
}

impl Logical {
    #[inline]
    pub fn is_na(self) -> bool {
        matches!(self, Logical::Na)
    }

    /// `Some(bool)` for the two definite states, `None` for missing
    #[inline]
    pub fn as_bool(self) -> Option<bool> {
        match self {
            Logical::False => Some(false),
            Logical::True => Some(true),
            Logical::Na => None,
        }
    }
}

impl From<bool> for Logical {
    #[inline]
    fn from(b: bool) -> Self {
        if b {
            Logical::True
        } else {
            Logical::False
        }
    }
}

/// Complex cell: a pair of f64 components.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Complex {
    pub re: f64,
    pub im: f64,
}

impl Complex {
    pub fn new(re: f64, im: f64) -> Self {
        Complex { re, im }
    }
}

/// Tagged storage for one heap slot.
///
/// Vector variants own their cell storage directly; `List` slots hold value
/// handles; `Pair`/`Lang` are cons cells addressed by slot index rather
/// than raw links, so chain protection reduces to marking from the chain's
/// head.
#[derive(Debug, Clone)]
pub(crate) enum ValueData {
    Nil,
    Logical(Vec<Logical>),
    Int(Vec<i32>),
    Real(Vec<f64>),
    Complex(Vec<Complex>),
    Raw(Vec<u8>),
    Str(Vec<CharRef>),
    List(Vec<Value>),
    Pair {
        tag: Option<Symbol>,
        head: Value,
        tail: Value,
    },
    Lang {
        head: Value,
        tail: Value,
    },
    Symbol(Symbol),
}

impl ValueData {
    pub(crate) fn kind(&self) -> Kind {
        match self {
            ValueData::Nil => Kind::Nil,
            ValueData::Logical(_) => Kind::Logical,
            ValueData::Int(_) => Kind::Int,
            ValueData::Real(_) => Kind::Real,
            ValueData::Complex(_) => Kind::Complex,
            ValueData::Raw(_) => Kind::Raw,
            ValueData::Str(_) => Kind::Str,
            ValueData::List(_) => Kind::List,
            ValueData::Pair { .. } => Kind::Pair,
            ValueData::Lang { .. } => Kind::Lang,
            ValueData::Symbol(_) => Kind::Symbol,
        }
    }
}
