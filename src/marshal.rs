//! Marshaling between native scalars/arrays and heap vectors.
//!
//! Defines the missing-value sentinel protocol per vector kind, the
//! coercion rules between kinds, direct slice views over vector storage,
//! and bulk fill operations. Host-facing argument-validation wrappers use
//! the `as_integer`/`as_real`/`as_logical`/`as_string` entry points before
//! invoking performance-sensitive native code.
//!
//! # Missing-value sentinels
//!
//! | Kind    | Sentinel                                   |
//! |---------|--------------------------------------------|
//! | Integer | [`NA_INTEGER`] (`i32::MIN`, never valid data) |
//! | Logical | [`Logical::Na`], a reserved third state    |
//! | Real    | one reserved quiet-NaN bit pattern, see [`na_real`] |
//! | String  | [`CharRef::Na`], compared by identity      |
//!
//! Raw vectors have no missing sentinel; coercing a missing value into a
//! raw vector produces `0`, mirroring the host runtime.
//!
//! # Mutable views
//!
//! `*_slice_mut` hands out a direct mutable view over vector storage. That
//! view must only be requested for values the native code independently
//! owns (freshly allocated or [`duplicate`](Heap::duplicate)d): vectors are
//! value-semantic at the language level, and mutating storage that another
//! live binding shares violates the copy-on-modify contract. The bridge
//! does not detect this; callers avoid it by duplicating first.

use crate::error::BridgeError;
use crate::heap::Heap;
use crate::intern::CharRef;
use crate::value::{Complex, Kind, Logical, Value, ValueData};

/// Missing-value sentinel for integer vectors; never a valid data value.
pub const NA_INTEGER: i32 = i32::MIN;

/// Bit pattern of the missing-value real: a reserved quiet NaN with
/// payload 1954, distinguishable from ordinary NaN by its payload bits.
/// The exact pattern carries no meaning beyond "reserved"; only
/// [`is_na_real`] may interpret it.
const NA_REAL_BITS: u64 = 0x7FF8_0000_0000_07A2;

/// The missing-value real.
#[inline]
pub fn na_real() -> f64 {
    f64::from_bits(NA_REAL_BITS)
}

/// True only for the reserved missing-value bit pattern, not for ordinary
/// NaN.
#[inline]
pub fn is_na_real(x: f64) -> bool {
    x.to_bits() == NA_REAL_BITS
}

/// True for missing *or* any NaN. Use [`is_na_real`] to tell them apart.
#[inline]
pub fn is_na_or_nan(x: f64) -> bool {
    x.is_nan()
}

fn mismatch(from: Kind, to: Kind) -> BridgeError {
    BridgeError::TypeMismatch { from, to }
}

fn empty_vector(op: &str) -> BridgeError {
    BridgeError::InvalidArgument(format!("{}: vector has length zero", op))
}

// ----------------------------------------------------------------------
// Scalar cell conversions (NA-aware)
// ----------------------------------------------------------------------

fn int_to_real(x: i32) -> f64 {
    if x == NA_INTEGER {
        na_real()
    } else {
        x as f64
    }
}

/// Truncates toward zero; missing, NaN, and out-of-range reals all map to
/// the integer sentinel.
fn real_to_int(x: f64) -> i32 {
    if x.is_nan() {
        return NA_INTEGER;
    }
    let t = x.trunc();
    if t > i32::MAX as f64 || t <= i32::MIN as f64 {
        NA_INTEGER
    } else {
        t as i32
    }
}

fn logical_to_int(x: Logical) -> i32 {
    match x {
        Logical::False => 0,
        Logical::True => 1,
        Logical::Na => NA_INTEGER,
    }
}

fn int_to_logical(x: i32) -> Logical {
    if x == NA_INTEGER {
        Logical::Na
    } else {
        Logical::from(x != 0)
    }
}

fn real_to_logical(x: f64) -> Logical {
    if x.is_nan() {
        Logical::Na
    } else {
        Logical::from(x != 0.0)
    }
}

fn logical_to_real(x: Logical) -> f64 {
    int_to_real(logical_to_int(x))
}

/// Raw has no missing sentinel: NA and out-of-range both become 0.
fn int_to_raw(x: i32) -> u8 {
    if (0..=255).contains(&x) {
        x as u8
    } else {
        0
    }
}

fn real_to_raw(x: f64) -> u8 {
    int_to_raw(real_to_int(x))
}

fn int_to_str(x: i32) -> CharRef {
    if x == NA_INTEGER {
        CharRef::Na
    } else {
        CharRef::intern(&x.to_string())
    }
}

fn real_to_str(x: f64) -> CharRef {
    if is_na_real(x) {
        CharRef::Na
    } else {
        CharRef::intern(&x.to_string())
    }
}

fn logical_to_str(x: Logical) -> CharRef {
    match x {
        Logical::False => CharRef::intern("FALSE"),
        Logical::True => CharRef::intern("TRUE"),
        Logical::Na => CharRef::Na,
    }
}

fn complex_to_str(x: Complex) -> CharRef {
    if is_na_or_nan(x.re) || is_na_or_nan(x.im) {
        CharRef::Na
    } else if x.im < 0.0 {
        CharRef::intern(&format!("{}{}i", x.re, x.im))
    } else {
        CharRef::intern(&format!("{}+{}i", x.re, x.im))
    }
}

/// Unparseable content becomes the target kind's missing sentinel.
fn str_to_real(x: CharRef) -> f64 {
    match x.as_str() {
        None => na_real(),
        Some(s) => s.trim().parse::<f64>().unwrap_or_else(|_| na_real()),
    }
}

fn str_to_int(x: CharRef) -> i32 {
    match x.as_str() {
        None => NA_INTEGER,
        Some(s) => match s.trim().parse::<i32>() {
            Ok(n) if n != NA_INTEGER => n,
            _ => real_to_int(str_to_real(x)),
        },
    }
}

fn str_to_logical(x: CharRef) -> Logical {
    match x.as_str() {
        Some("TRUE") | Some("true") | Some("T") => Logical::True,
        Some("FALSE") | Some("false") | Some("F") => Logical::False,
        _ => Logical::Na,
    }
}

fn complex_is_na(x: Complex) -> bool {
    is_na_real(x.re) || is_na_real(x.im)
}

impl Heap {
    // ------------------------------------------------------------------
    // Vector constructors from native arrays
    // ------------------------------------------------------------------

    pub fn int_vector(&mut self, xs: &[i32]) -> Value {
        self.alloc_node(ValueData::Int(xs.to_vec()))
    }

    pub fn real_vector(&mut self, xs: &[f64]) -> Value {
        self.alloc_node(ValueData::Real(xs.to_vec()))
    }

    pub fn logical_vector(&mut self, xs: &[Logical]) -> Value {
        self.alloc_node(ValueData::Logical(xs.to_vec()))
    }

    pub fn raw_vector(&mut self, xs: &[u8]) -> Value {
        self.alloc_node(ValueData::Raw(xs.to_vec()))
    }

    pub fn complex_vector(&mut self, xs: &[Complex]) -> Value {
        self.alloc_node(ValueData::Complex(xs.to_vec()))
    }

    /// Interns every element and builds a string vector from the cells
    pub fn str_vector(&mut self, xs: &[&str]) -> Value {
        let cells: Vec<CharRef> = xs.iter().map(|s| CharRef::intern(s)).collect();
        self.alloc_node(ValueData::Str(cells))
    }

    pub fn char_vector(&mut self, xs: &[CharRef]) -> Value {
        self.alloc_node(ValueData::Str(xs.to_vec()))
    }

    // ------------------------------------------------------------------
    // Scalar round-trip helpers
    // ------------------------------------------------------------------

    pub fn scalar_int(&mut self, x: i32) -> Value {
        self.alloc_node(ValueData::Int(vec![x]))
    }

    pub fn scalar_real(&mut self, x: f64) -> Value {
        self.alloc_node(ValueData::Real(vec![x]))
    }

    pub fn scalar_logical(&mut self, x: Logical) -> Value {
        self.alloc_node(ValueData::Logical(vec![x]))
    }

    pub fn scalar_string(&mut self, s: &str) -> Value {
        self.alloc_node(ValueData::Str(vec![CharRef::intern(s)]))
    }

    /// Coerce the first element of a vector to an integer.
    ///
    /// Elements past the first are ignored; policy on the remainder belongs
    /// to the calling layer, not this one.
    pub fn as_integer(&self, v: Value) -> Result<i32, BridgeError> {
        match &self.node(v).data {
            ValueData::Int(xs) => xs.first().copied().ok_or_else(|| empty_vector("as_integer")),
            ValueData::Real(xs) => xs
                .first()
                .map(|&x| real_to_int(x))
                .ok_or_else(|| empty_vector("as_integer")),
            ValueData::Logical(xs) => xs
                .first()
                .map(|&x| logical_to_int(x))
                .ok_or_else(|| empty_vector("as_integer")),
            ValueData::Raw(xs) => xs
                .first()
                .map(|&x| x as i32)
                .ok_or_else(|| empty_vector("as_integer")),
            ValueData::Str(xs) => xs
                .first()
                .map(|&x| str_to_int(x))
                .ok_or_else(|| empty_vector("as_integer")),
            ValueData::Complex(xs) => xs
                .first()
                .map(|&x| {
                    if complex_is_na(x) {
                        NA_INTEGER
                    } else {
                        real_to_int(x.re)
                    }
                })
                .ok_or_else(|| empty_vector("as_integer")),
            other => Err(mismatch(other.kind(), Kind::Int)),
        }
    }

    /// Coerce the first element of a vector to a real
    pub fn as_real(&self, v: Value) -> Result<f64, BridgeError> {
        match &self.node(v).data {
            ValueData::Real(xs) => xs.first().copied().ok_or_else(|| empty_vector("as_real")),
            ValueData::Int(xs) => xs
                .first()
                .map(|&x| int_to_real(x))
                .ok_or_else(|| empty_vector("as_real")),
            ValueData::Logical(xs) => xs
                .first()
                .map(|&x| logical_to_real(x))
                .ok_or_else(|| empty_vector("as_real")),
            ValueData::Raw(xs) => xs
                .first()
                .map(|&x| x as f64)
                .ok_or_else(|| empty_vector("as_real")),
            ValueData::Str(xs) => xs
                .first()
                .map(|&x| str_to_real(x))
                .ok_or_else(|| empty_vector("as_real")),
            ValueData::Complex(xs) => xs
                .first()
                .map(|&x| if complex_is_na(x) { na_real() } else { x.re })
                .ok_or_else(|| empty_vector("as_real")),
            other => Err(mismatch(other.kind(), Kind::Real)),
        }
    }

    /// Coerce the first element of a vector to a logical
    pub fn as_logical(&self, v: Value) -> Result<Logical, BridgeError> {
        match &self.node(v).data {
            ValueData::Logical(xs) => xs.first().copied().ok_or_else(|| empty_vector("as_logical")),
            ValueData::Int(xs) => xs
                .first()
                .map(|&x| int_to_logical(x))
                .ok_or_else(|| empty_vector("as_logical")),
            ValueData::Real(xs) => xs
                .first()
                .map(|&x| real_to_logical(x))
                .ok_or_else(|| empty_vector("as_logical")),
            ValueData::Raw(xs) => xs
                .first()
                .map(|&x| Logical::from(x != 0))
                .ok_or_else(|| empty_vector("as_logical")),
            ValueData::Str(xs) => xs
                .first()
                .map(|&x| str_to_logical(x))
                .ok_or_else(|| empty_vector("as_logical")),
            ValueData::Complex(xs) => xs
                .first()
                .map(|&x| {
                    if complex_is_na(x) {
                        Logical::Na
                    } else {
                        Logical::from(x.re != 0.0 || x.im != 0.0)
                    }
                })
                .ok_or_else(|| empty_vector("as_logical")),
            other => Err(mismatch(other.kind(), Kind::Logical)),
        }
    }

    /// Coerce the first element of a vector to a string cell
    pub fn as_string(&self, v: Value) -> Result<CharRef, BridgeError> {
        match &self.node(v).data {
            ValueData::Str(xs) => xs.first().copied().ok_or_else(|| empty_vector("as_string")),
            ValueData::Int(xs) => xs
                .first()
                .map(|&x| int_to_str(x))
                .ok_or_else(|| empty_vector("as_string")),
            ValueData::Real(xs) => xs
                .first()
                .map(|&x| real_to_str(x))
                .ok_or_else(|| empty_vector("as_string")),
            ValueData::Logical(xs) => xs
                .first()
                .map(|&x| logical_to_str(x))
                .ok_or_else(|| empty_vector("as_string")),
            ValueData::Complex(xs) => xs
                .first()
                .map(|&x| complex_to_str(x))
                .ok_or_else(|| empty_vector("as_string")),
            ValueData::Raw(xs) => xs
                .first()
                .map(|&x| CharRef::intern(&format!("{:02x}", x)))
                .ok_or_else(|| empty_vector("as_string")),
            other => Err(mismatch(other.kind(), Kind::Str)),
        }
    }

    // ------------------------------------------------------------------
    // Direct slice views
    // ------------------------------------------------------------------

    pub fn int_slice(&self, v: Value) -> Result<&[i32], BridgeError> {
        match &self.node(v).data {
            ValueData::Int(xs) => Ok(xs),
            other => Err(mismatch(other.kind(), Kind::Int)),
        }
    }

    /// Mutable view over integer storage. Only for values the caller
    /// independently owns; see the module docs for the aliasing contract.
    pub fn int_slice_mut(&mut self, v: Value) -> Result<&mut [i32], BridgeError> {
        match &mut self.node_mut(v).data {
            ValueData::Int(xs) => Ok(xs),
            other => Err(mismatch(other.kind(), Kind::Int)),
        }
    }

    pub fn real_slice(&self, v: Value) -> Result<&[f64], BridgeError> {
        match &self.node(v).data {
            ValueData::Real(xs) => Ok(xs),
            other => Err(mismatch(other.kind(), Kind::Real)),
        }
    }

    pub fn real_slice_mut(&mut self, v: Value) -> Result<&mut [f64], BridgeError> {
        match &mut self.node_mut(v).data {
            ValueData::Real(xs) => Ok(xs),
            other => Err(mismatch(other.kind(), Kind::Real)),
        }
    }

    pub fn logical_slice(&self, v: Value) -> Result<&[Logical], BridgeError> {
        match &self.node(v).data {
            ValueData::Logical(xs) => Ok(xs),
            other => Err(mismatch(other.kind(), Kind::Logical)),
        }
    }

    pub fn logical_slice_mut(&mut self, v: Value) -> Result<&mut [Logical], BridgeError> {
        match &mut self.node_mut(v).data {
            ValueData::Logical(xs) => Ok(xs),
            other => Err(mismatch(other.kind(), Kind::Logical)),
        }
    }

    pub fn raw_slice(&self, v: Value) -> Result<&[u8], BridgeError> {
        match &self.node(v).data {
            ValueData::Raw(xs) => Ok(xs),
            other => Err(mismatch(other.kind(), Kind::Raw)),
        }
    }

    pub fn raw_slice_mut(&mut self, v: Value) -> Result<&mut [u8], BridgeError> {
        match &mut self.node_mut(v).data {
            ValueData::Raw(xs) => Ok(xs),
            other => Err(mismatch(other.kind(), Kind::Raw)),
        }
    }

    pub fn complex_slice(&self, v: Value) -> Result<&[Complex], BridgeError> {
        match &self.node(v).data {
            ValueData::Complex(xs) => Ok(xs),
            other => Err(mismatch(other.kind(), Kind::Complex)),
        }
    }

    pub fn complex_slice_mut(&mut self, v: Value) -> Result<&mut [Complex], BridgeError> {
        match &mut self.node_mut(v).data {
            ValueData::Complex(xs) => Ok(xs),
            other => Err(mismatch(other.kind(), Kind::Complex)),
        }
    }

    /// String cells are immutable references, so string vectors expose
    /// index-based access rather than a mutable byte view
    pub fn str_elt(&self, v: Value, i: usize) -> Result<CharRef, BridgeError> {
        match &self.node(v).data {
            ValueData::Str(xs) => xs.get(i).copied().ok_or_else(|| {
                BridgeError::InvalidArgument(format!(
                    "str_elt: index {} out of bounds for length {}",
                    i,
                    xs.len()
                ))
            }),
            other => Err(mismatch(other.kind(), Kind::Str)),
        }
    }

    /// Re-point a string cell at new interned content
    pub fn set_str_elt(&mut self, v: Value, i: usize, cell: CharRef) -> Result<(), BridgeError> {
        match &mut self.node_mut(v).data {
            ValueData::Str(xs) => match xs.get_mut(i) {
                Some(slot) => {
                    *slot = cell;
                    Ok(())
                }
                None => Err(BridgeError::InvalidArgument(format!(
                    "set_str_elt: index {} out of bounds for length {}",
                    i,
                    xs.len()
                ))),
            },
            other => Err(mismatch(other.kind(), Kind::Str)),
        }
    }

    /// Indexed access into a heterogeneous list
    pub fn list_elt(&self, v: Value, i: usize) -> Result<Value, BridgeError> {
        match &self.node(v).data {
            ValueData::List(xs) => xs.get(i).copied().ok_or_else(|| {
                BridgeError::InvalidArgument(format!(
                    "list_elt: index {} out of bounds for length {}",
                    i,
                    xs.len()
                ))
            }),
            other => Err(mismatch(other.kind(), Kind::List)),
        }
    }

    pub fn set_list_elt(&mut self, v: Value, i: usize, elt: Value) -> Result<(), BridgeError> {
        match &mut self.node_mut(v).data {
            ValueData::List(xs) => match xs.get_mut(i) {
                Some(slot) => {
                    *slot = elt;
                    Ok(())
                }
                None => Err(BridgeError::InvalidArgument(format!(
                    "set_list_elt: index {} out of bounds for length {}",
                    i,
                    xs.len()
                ))),
            },
            other => Err(mismatch(other.kind(), Kind::List)),
        }
    }

    // ------------------------------------------------------------------
    // Bulk fill
    // ------------------------------------------------------------------

    pub fn fill_int(&mut self, v: Value, x: i32) -> Result<(), BridgeError> {
        self.int_slice_mut(v).map(|xs| xs.fill(x))
    }

    pub fn fill_real(&mut self, v: Value, x: f64) -> Result<(), BridgeError> {
        self.real_slice_mut(v).map(|xs| xs.fill(x))
    }

    pub fn fill_logical(&mut self, v: Value, x: Logical) -> Result<(), BridgeError> {
        self.logical_slice_mut(v).map(|xs| xs.fill(x))
    }

    pub fn fill_raw(&mut self, v: Value, x: u8) -> Result<(), BridgeError> {
        self.raw_slice_mut(v).map(|xs| xs.fill(x))
    }

    pub fn fill_str(&mut self, v: Value, cell: CharRef) -> Result<(), BridgeError> {
        match &mut self.node_mut(v).data {
            ValueData::Str(xs) => {
                xs.fill(cell);
                Ok(())
            }
            other => Err(mismatch(other.kind(), Kind::Str)),
        }
    }

    // ------------------------------------------------------------------
    // Coercion
    // ------------------------------------------------------------------

    /// Convert between vector kinds.
    ///
    /// The result is always a freshly owned vector with an empty attribute
    /// list; coercing to the same kind deep-duplicates. Missing sentinels
    /// are preserved between any two kinds that support them; real→integer
    /// truncates deterministically toward zero. Kinds without a conversion
    /// path (lists, pairlists, language forms, symbols, nil) fail with
    /// `TypeMismatch` before any allocation, so no partially-built output
    /// is ever left protected or leaked.
    pub fn coerce(&mut self, v: Value, to: Kind) -> Result<Value, BridgeError> {
        let from = self.kind_of(v);
        if !from.is_vector() || !to.is_vector() {
            if from == Kind::Nil && to.is_vector() {
                // nil coerces to the empty vector of any kind
                return self.alloc_vector(to, 0);
            }
            return Err(mismatch(from, to));
        }
        if from == to {
            // duplicate copies the attribute chain; coercion strips it
            let out = self.duplicate(v);
            self.node_mut(out).attrs = Value::NIL;
            return Ok(out);
        }

        let data = match (&self.node(v).data, to) {
            (ValueData::Logical(xs), Kind::Int) => {
                ValueData::Int(xs.iter().map(|&x| logical_to_int(x)).collect())
            }
            (ValueData::Logical(xs), Kind::Real) => {
                ValueData::Real(xs.iter().map(|&x| logical_to_real(x)).collect())
            }
            (ValueData::Logical(xs), Kind::Complex) => ValueData::Complex(
                xs.iter()
                    .map(|&x| Complex::new(logical_to_real(x), 0.0))
                    .collect(),
            ),
            (ValueData::Logical(xs), Kind::Raw) => {
                ValueData::Raw(xs.iter().map(|&x| int_to_raw(logical_to_int(x))).collect())
            }
            (ValueData::Logical(xs), Kind::Str) => {
                ValueData::Str(xs.iter().map(|&x| logical_to_str(x)).collect())
            }

            (ValueData::Int(xs), Kind::Logical) => {
                ValueData::Logical(xs.iter().map(|&x| int_to_logical(x)).collect())
            }
            (ValueData::Int(xs), Kind::Real) => {
                ValueData::Real(xs.iter().map(|&x| int_to_real(x)).collect())
            }
            (ValueData::Int(xs), Kind::Complex) => ValueData::Complex(
                xs.iter()
                    .map(|&x| Complex::new(int_to_real(x), 0.0))
                    .collect(),
            ),
            (ValueData::Int(xs), Kind::Raw) => {
                ValueData::Raw(xs.iter().map(|&x| int_to_raw(x)).collect())
            }
            (ValueData::Int(xs), Kind::Str) => {
                ValueData::Str(xs.iter().map(|&x| int_to_str(x)).collect())
            }

            (ValueData::Real(xs), Kind::Logical) => {
                ValueData::Logical(xs.iter().map(|&x| real_to_logical(x)).collect())
            }
            (ValueData::Real(xs), Kind::Int) => {
                ValueData::Int(xs.iter().map(|&x| real_to_int(x)).collect())
            }
            (ValueData::Real(xs), Kind::Complex) => {
                ValueData::Complex(xs.iter().map(|&x| Complex::new(x, 0.0)).collect())
            }
            (ValueData::Real(xs), Kind::Raw) => {
                ValueData::Raw(xs.iter().map(|&x| real_to_raw(x)).collect())
            }
            (ValueData::Real(xs), Kind::Str) => {
                ValueData::Str(xs.iter().map(|&x| real_to_str(x)).collect())
            }

            // Dropping the imaginary component is the documented lossy path
            (ValueData::Complex(xs), Kind::Real) => ValueData::Real(
                xs.iter()
                    .map(|&x| if complex_is_na(x) { na_real() } else { x.re })
                    .collect(),
            ),
            (ValueData::Complex(xs), Kind::Int) => ValueData::Int(
                xs.iter()
                    .map(|&x| {
                        if complex_is_na(x) {
                            NA_INTEGER
                        } else {
                            real_to_int(x.re)
                        }
                    })
                    .collect(),
            ),
            (ValueData::Complex(xs), Kind::Logical) => ValueData::Logical(
                xs.iter()
                    .map(|&x| {
                        if complex_is_na(x) {
                            Logical::Na
                        } else {
                            Logical::from(x.re != 0.0 || x.im != 0.0)
                        }
                    })
                    .collect(),
            ),
            (ValueData::Complex(xs), Kind::Raw) => ValueData::Raw(
                xs.iter()
                    .map(|&x| if complex_is_na(x) { 0 } else { real_to_raw(x.re) })
                    .collect(),
            ),
            (ValueData::Complex(xs), Kind::Str) => {
                ValueData::Str(xs.iter().map(|&x| complex_to_str(x)).collect())
            }

            (ValueData::Raw(xs), Kind::Logical) => {
                ValueData::Logical(xs.iter().map(|&x| Logical::from(x != 0)).collect())
            }
            (ValueData::Raw(xs), Kind::Int) => {
                ValueData::Int(xs.iter().map(|&x| x as i32).collect())
            }
            (ValueData::Raw(xs), Kind::Real) => {
                ValueData::Real(xs.iter().map(|&x| x as f64).collect())
            }
            (ValueData::Raw(xs), Kind::Complex) => ValueData::Complex(
                xs.iter().map(|&x| Complex::new(x as f64, 0.0)).collect(),
            ),
            (ValueData::Raw(xs), Kind::Str) => ValueData::Str(
                xs.iter()
                    .map(|&x| CharRef::intern(&format!("{:02x}", x)))
                    .collect(),
            ),

            (ValueData::Str(xs), Kind::Logical) => {
                ValueData::Logical(xs.iter().map(|&x| str_to_logical(x)).collect())
            }
            (ValueData::Str(xs), Kind::Int) => {
                ValueData::Int(xs.iter().map(|&x| str_to_int(x)).collect())
            }
            (ValueData::Str(xs), Kind::Real) => {
                ValueData::Real(xs.iter().map(|&x| str_to_real(x)).collect())
            }
            (ValueData::Str(xs), Kind::Complex) => ValueData::Complex(
                xs.iter()
                    .map(|&x| Complex::new(str_to_real(x), 0.0))
                    .collect(),
            ),
            (ValueData::Str(xs), Kind::Raw) => {
                ValueData::Raw(xs.iter().map(|&x| int_to_raw(str_to_int(x))).collect())
            }

            // Both kinds were checked to be vectors and unequal above
            _ => return Err(mismatch(from, to)),
        };
        Ok(self.alloc_node(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_na_real_is_distinguishable_from_nan() {
        let na = na_real();
        assert!(is_na_real(na));
        assert!(is_na_or_nan(na));
        assert!(!is_na_real(f64::NAN));
        assert!(is_na_or_nan(f64::NAN));
        assert!(!is_na_real(1.0));
    }

    #[test]
    fn test_scalar_round_trips() {
        let mut heap = Heap::new();
        let v = heap.scalar_int(42);
        heap.protect(v);
        assert_eq!(heap.len(v), 1);
        assert_eq!(heap.as_integer(v).unwrap(), 42);
        assert_eq!(heap.as_real(v).unwrap(), 42.0);

        let s = heap.scalar_string("3.5");
        heap.protect(s);
        assert_eq!(heap.as_real(s).unwrap(), 3.5);
        assert_eq!(heap.as_integer(s).unwrap(), 3);
        heap.unprotect(2).unwrap();
    }

    #[test]
    fn test_as_integer_uses_first_element() {
        let mut heap = Heap::new();
        let v = heap.int_vector(&[10, 20, 30]);
        heap.protect(v);
        assert_eq!(heap.as_integer(v).unwrap(), 10);
        heap.unprotect(1).unwrap();
    }

    #[test]
    fn test_as_integer_on_empty_vector_fails() {
        let mut heap = Heap::new();
        let v = heap.int_vector(&[]);
        heap.protect(v);
        assert!(matches!(
            heap.as_integer(v),
            Err(BridgeError::InvalidArgument(_))
        ));
        heap.unprotect(1).unwrap();
    }

    #[test]
    fn test_as_integer_on_list_is_type_mismatch() {
        let mut heap = Heap::new();
        let v = heap.alloc_list(1);
        heap.protect(v);
        assert!(matches!(
            heap.as_integer(v),
            Err(BridgeError::TypeMismatch { .. })
        ));
        heap.unprotect(1).unwrap();
    }

    #[test]
    fn test_lossless_round_trip_int_real_int() {
        let mut heap = Heap::new();
        let v = heap.int_vector(&[-3, 0, 7, NA_INTEGER]);
        heap.protect(v);
        let r = heap.coerce(v, Kind::Real).unwrap();
        heap.protect(r);
        let back = heap.coerce(r, Kind::Int).unwrap();
        heap.protect(back);
        assert_eq!(heap.int_slice(back).unwrap(), heap.int_slice(v).unwrap());
        heap.unprotect(3).unwrap();
    }

    #[test]
    fn test_real_to_int_truncates_toward_zero() {
        let mut heap = Heap::new();
        let v = heap.real_vector(&[2.7, -2.7, 0.9, -0.9]);
        heap.protect(v);
        let i = heap.coerce(v, Kind::Int).unwrap();
        heap.protect(i);
        assert_eq!(heap.int_slice(i).unwrap(), &[2, -2, 0, 0]);
        heap.unprotect(2).unwrap();
    }

    #[test]
    fn test_na_preserved_across_coercions() {
        let mut heap = Heap::new();
        let v = heap.int_vector(&[1, NA_INTEGER, 3]);
        heap.protect(v);

        let r = heap.coerce(v, Kind::Real).unwrap();
        heap.protect(r);
        assert!(is_na_real(heap.real_slice(r).unwrap()[1]));

        let l = heap.coerce(r, Kind::Logical).unwrap();
        heap.protect(l);
        assert_eq!(heap.logical_slice(l).unwrap()[1], Logical::Na);

        let s = heap.coerce(v, Kind::Str).unwrap();
        heap.protect(s);
        assert!(heap.str_elt(s, 1).unwrap().is_na());
        assert_eq!(heap.str_elt(s, 0).unwrap().as_str(), Some("1"));

        heap.unprotect(4).unwrap();
    }

    #[test]
    fn test_na_into_raw_becomes_zero() {
        let mut heap = Heap::new();
        let v = heap.int_vector(&[NA_INTEGER, 255, 256, 65]);
        heap.protect(v);
        let r = heap.coerce(v, Kind::Raw).unwrap();
        heap.protect(r);
        assert_eq!(heap.raw_slice(r).unwrap(), &[0, 255, 0, 65]);
        heap.unprotect(2).unwrap();
    }

    #[test]
    fn test_ordinary_nan_survives_int_round_trip_as_na() {
        let mut heap = Heap::new();
        let v = heap.real_vector(&[f64::NAN]);
        heap.protect(v);
        let i = heap.coerce(v, Kind::Int).unwrap();
        heap.protect(i);
        assert_eq!(heap.int_slice(i).unwrap(), &[NA_INTEGER]);
        heap.unprotect(2).unwrap();
    }

    #[test]
    fn test_string_parsing_failure_becomes_na() {
        let mut heap = Heap::new();
        let v = heap.str_vector(&["12", "not a number", "4.5"]);
        heap.protect(v);
        let r = heap.coerce(v, Kind::Real).unwrap();
        heap.protect(r);
        let xs = heap.real_slice(r).unwrap();
        assert_eq!(xs[0], 12.0);
        assert!(is_na_real(xs[1]));
        assert_eq!(xs[2], 4.5);
        heap.unprotect(2).unwrap();
    }

    #[test]
    fn test_coerce_same_kind_duplicates() {
        let mut heap = Heap::new();
        let v = heap.int_vector(&[1, 2]);
        heap.protect(v);
        let d = heap.coerce(v, Kind::Int).unwrap();
        heap.protect(d);
        assert_ne!(d, v);
        heap.int_slice_mut(d).unwrap()[0] = 9;
        assert_eq!(heap.int_slice(v).unwrap(), &[1, 2]);
        heap.unprotect(2).unwrap();
    }

    #[test]
    fn test_coerce_strips_attributes_regardless_of_kind() {
        use crate::intern::intern;

        let mut heap = Heap::new();
        let v = heap.int_vector(&[1, 2, 3, 4]);
        heap.protect(v);
        let dim = heap.int_vector(&[2, 2]);
        heap.protect(dim);
        heap.set_attribute(v, intern("dim"), dim).unwrap();

        // Cross-kind: fresh vector, empty attribute list
        let r = heap.coerce(v, Kind::Real).unwrap();
        heap.protect(r);
        assert_eq!(heap.get_attribute(r, intern("dim")), None);

        // Same-kind takes the duplicate path but must strip all the same
        let same = heap.coerce(v, Kind::Int).unwrap();
        heap.protect(same);
        assert_ne!(same, v);
        assert_eq!(heap.int_slice(same).unwrap(), &[1, 2, 3, 4]);
        assert_eq!(heap.get_attribute(same, intern("dim")), None);

        // The source keeps its attribute untouched
        assert_eq!(heap.get_attribute(v, intern("dim")), Some(dim));
        heap.unprotect(4).unwrap();
    }

    #[test]
    fn test_coerce_list_to_numeric_fails() {
        let mut heap = Heap::new();
        let v = heap.alloc_list(2);
        heap.protect(v);
        let err = heap.coerce(v, Kind::Real).unwrap_err();
        assert_eq!(
            err,
            BridgeError::TypeMismatch {
                from: Kind::List,
                to: Kind::Real
            }
        );
        heap.unprotect(1).unwrap();
    }

    #[test]
    fn test_coerce_nil_yields_empty_vector() {
        let mut heap = Heap::new();
        let nil = heap.nil();
        let v = heap.coerce(nil, Kind::Int).unwrap();
        heap.protect(v);
        assert_eq!(heap.len(v), 0);
        assert_eq!(heap.kind_of(v), Kind::Int);
        heap.unprotect(1).unwrap();
    }

    #[test]
    fn test_fill_is_bulk() {
        let mut heap = Heap::new();
        let v = heap.alloc_vector(Kind::Real, 5).unwrap();
        heap.protect(v);
        heap.fill_real(v, 1.25).unwrap();
        assert!(heap.real_slice(v).unwrap().iter().all(|&x| x == 1.25));
        assert!(heap.fill_int(v, 1).is_err());
        heap.unprotect(1).unwrap();
    }

    #[test]
    fn test_string_cell_repoint_not_mutate() {
        let mut heap = Heap::new();
        let a = heap.str_vector(&["shared", "x"]);
        heap.protect(a);
        let b = heap.str_vector(&["shared"]);
        heap.protect(b);

        // Both vectors reference the identical pool entry
        assert_eq!(heap.str_elt(a, 0).unwrap(), heap.str_elt(b, 0).unwrap());

        // Re-pointing one cell never disturbs the other vector
        heap.set_str_elt(a, 0, CharRef::intern("changed")).unwrap();
        assert_eq!(heap.str_elt(b, 0).unwrap().as_str(), Some("shared"));
        heap.unprotect(2).unwrap();
    }
}
