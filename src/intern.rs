//! Process-wide interned symbol table and string pool.
//!
//! Both pools use lasso's `ThreadedRodeo` for O(1) comparison via interned
//! `Spur` keys: one copy per unique string, 4 bytes per handle. Interning is
//! idempotent (interning the same content twice returns the same key) and
//! append-only: entries are never removed for the lifetime of the process,
//! so resolved `&'static str` references stay valid.
//!
//! Two handle types are exposed:
//!
//! - [`Symbol`]: an interned identifier. Two symbols with equal spelling are
//!   the same object; comparison is integer comparison on the key.
//! - [`CharRef`]: one cell of a string vector. Either a reference into the
//!   string pool or the distinguished missing-string entry [`CharRef::Na`],
//!   which is compared by identity and never resolves to content.
//!
//! Symbols and string cells live in separate pools so that a symbol spelled
//! `"x"` and a string `"x"` remain distinct objects.

use std::fmt;
use std::sync::OnceLock;

use lasso::{Spur, ThreadedRodeo};

/// Global symbol table - lazily initialized, thread-safe
static SYMBOLS: OnceLock<ThreadedRodeo> = OnceLock::new();

/// Global string pool backing string-vector cells
static STRINGS: OnceLock<ThreadedRodeo> = OnceLock::new();

#[inline]
fn symbols() -> &'static ThreadedRodeo {
    SYMBOLS.get_or_init(ThreadedRodeo::new)
}

#[inline]
fn strings() -> &'static ThreadedRodeo {
    STRINGS.get_or_init(ThreadedRodeo::new)
}

/// Interned symbol - 4 bytes, O(1) comparison
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct Symbol(Spur);

impl Symbol {
    /// Create a new symbol from a string (interns if new)
    #[inline]
    pub fn new(s: &str) -> Self {
        Symbol(symbols().get_or_intern(s))
    }

    /// Create a new symbol from an owned string
    #[inline]
    pub fn from_string(s: String) -> Self {
        Symbol(symbols().get_or_intern(s))
    }

    /// Get the string representation of this symbol
    #[inline]
    pub fn as_str(&self) -> &'static str {
        symbols().resolve(&self.0)
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({:?})", self.as_str())
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<&str> for Symbol {
    #[inline]
    fn from(s: &str) -> Self {
        Symbol::new(s)
    }
}

impl From<String> for Symbol {
    #[inline]
    fn from(s: String) -> Self {
        Symbol::from_string(s)
    }
}

impl AsRef<str> for Symbol {
    #[inline]
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl PartialEq<str> for Symbol {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for Symbol {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

/// Intern a string and return a Symbol
#[inline]
pub fn intern(s: &str) -> Symbol {
    Symbol::new(s)
}

/// One cell of a string vector: either the distinguished missing-string
/// entry or a reference into the interned string pool.
///
/// Cells never alias mutable byte buffers; pool entries are immutable once
/// interned, and "modifying" a cell means interning new content and
/// re-pointing the cell. Equality on `CharRef` is identity on the pool key,
/// never a content scan, and `Na` is equal only to itself.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub enum CharRef {
    /// The missing-string sentinel, a distinguished entry compared by
    /// reference identity
    Na,
    /// Reference into the interned string pool
    Chars(Spur),
}

impl CharRef {
    /// Intern `s` into the string pool and return a cell referencing it
    #[inline]
    pub fn intern(s: &str) -> Self {
        CharRef::Chars(strings().get_or_intern(s))
    }

    /// True for the missing-string sentinel
    #[inline]
    pub fn is_na(&self) -> bool {
        matches!(self, CharRef::Na)
    }

    /// Resolve the cell's content; `None` for the missing sentinel
    #[inline]
    pub fn as_str(&self) -> Option<&'static str> {
        match self {
            CharRef::Na => None,
            CharRef::Chars(spur) => Some(strings().resolve(spur)),
        }
    }
}

impl fmt::Debug for CharRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_str() {
            Some(s) => write!(f, "CharRef({:?})", s),
            None => write!(f, "CharRef(NA)"),
        }
    }
}

impl fmt::Display for CharRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_str() {
            Some(s) => write!(f, "{}", s),
            None => write!(f, "NA"),
        }
    }
}

impl From<&str> for CharRef {
    #[inline]
    fn from(s: &str) -> Self {
        CharRef::intern(s)
    }
}
