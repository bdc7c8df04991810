//! Value type for the VM
//!
//! Values are NaN-boxed into a single `u64`. Nil, false and true occupy three
//! fixed payload codes inside the reserved quiet-NaN region; object handles
//! set the sign bit on top of that region and keep a 50-bit payload holding a
//! heap slot index and a generation. Every other bit pattern is a number.

use std::fmt;

const SIGN_BIT: u64 = 0x8000_0000_0000_0000;
const QNAN: u64 = 0x7ffc_0000_0000_0000;

const TAG_NIL: u64 = 1;
const TAG_FALSE: u64 = 2;
const TAG_TRUE: u64 = 3;

const NIL_BITS: u64 = QNAN | TAG_NIL;
const FALSE_BITS: u64 = QNAN | TAG_FALSE;
const TRUE_BITS: u64 = QNAN | TAG_TRUE;
const OBJ_MASK: u64 = SIGN_BIT | QNAN;

/// Bits of the object payload used for the slot index
const INDEX_BITS: u32 = 32;
/// Bits of the object payload used for the generation
pub(crate) const GENERATION_BITS: u32 = 18;
pub(crate) const GENERATION_MASK: u32 = (1 << GENERATION_BITS) - 1;

/// Handle to a heap object: slot index plus the slot generation it was issued for
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjRef {
    index: u32,
    generation: u32,
}

impl ObjRef {
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        Self {
            index,
            generation: generation & GENERATION_MASK,
        }
    }

    #[inline]
    pub fn index(self) -> u32 {
        self.index
    }

    #[inline]
    pub fn generation(self) -> u32 {
        self.generation
    }

    #[inline]
    fn payload(self) -> u64 {
        (self.index as u64) | ((self.generation as u64) << INDEX_BITS)
    }

    #[inline]
    fn from_payload(payload: u64) -> Self {
        Self {
            index: payload as u32,
            generation: ((payload >> INDEX_BITS) as u32) & GENERATION_MASK,
        }
    }
}

impl fmt::Debug for ObjRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}@{}", self.index, self.generation)
    }
}

/// A tagged scalar: nil, bool, number or object reference
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Value(u64);

impl Value {
    pub const NIL: Value = Value(NIL_BITS);
    pub const TRUE: Value = Value(TRUE_BITS);
    pub const FALSE: Value = Value(FALSE_BITS);

    /// Encode a number. Doubles whose bits collide with a reserved tag are
    /// canonicalised to the standard quiet NaN.
    #[inline]
    pub fn number(n: f64) -> Value {
        let bits = n.to_bits();
        if Self::is_reserved(bits) {
            Value(f64::NAN.to_bits())
        } else {
            Value(bits)
        }
    }

    #[inline]
    pub fn bool(b: bool) -> Value {
        if b {
            Value::TRUE
        } else {
            Value::FALSE
        }
    }

    #[inline]
    pub fn object(r: ObjRef) -> Value {
        Value(OBJ_MASK | r.payload())
    }

    #[inline]
    pub fn to_bits(self) -> u64 {
        self.0
    }

    #[inline]
    pub fn from_bits(bits: u64) -> Value {
        Value(bits)
    }

    #[inline]
    fn is_reserved(bits: u64) -> bool {
        bits == NIL_BITS || (bits | 1) == TRUE_BITS || (bits & OBJ_MASK) == OBJ_MASK
    }

    #[inline]
    pub fn is_nil(self) -> bool {
        self.0 == NIL_BITS
    }

    #[inline]
    pub fn is_bool(self) -> bool {
        (self.0 | 1) == TRUE_BITS
    }

    #[inline]
    pub fn is_object(self) -> bool {
        (self.0 & OBJ_MASK) == OBJ_MASK
    }

    #[inline]
    pub fn is_number(self) -> bool {
        !Self::is_reserved(self.0)
    }

    #[inline]
    pub fn as_number(self) -> Option<f64> {
        if self.is_number() {
            Some(f64::from_bits(self.0))
        } else {
            None
        }
    }

    #[inline]
    pub fn as_bool(self) -> Option<bool> {
        if self.is_bool() {
            Some(self.0 == TRUE_BITS)
        } else {
            None
        }
    }

    #[inline]
    pub fn as_object(self) -> Option<ObjRef> {
        if self.is_object() {
            Some(ObjRef::from_payload(self.0 & !OBJ_MASK))
        } else {
            None
        }
    }

    /// Nil and false are falsey, everything else is truthy
    #[inline]
    pub fn is_falsey(self) -> bool {
        self.is_nil() || self.0 == FALSE_BITS
    }

    /// Name of the scalar kind, objects report "object"
    pub fn kind_name(self) -> &'static str {
        if self.is_nil() {
            "nil"
        } else if self.is_bool() {
            "bool"
        } else if self.is_object() {
            "object"
        } else {
            "number"
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::NIL
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::bool(b)
    }
}

impl From<ObjRef> for Value {
    fn from(r: ObjRef) -> Self {
        Value::object(r)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_nil() {
            write!(f, "Nil")
        } else if let Some(b) = self.as_bool() {
            write!(f, "Bool({})", b)
        } else if let Some(r) = self.as_object() {
            write!(f, "Object({:?})", r)
        } else {
            write!(f, "Number({})", f64::from_bits(self.0))
        }
    }
}

/// Format a number the way C's `%g` does: six significant digits, trailing
/// zeros stripped, exponent form outside `1e-4 <= |n| < 1e6`.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "nan".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if n == 0.0 {
        return if n.is_sign_negative() { "-0" } else { "0" }.to_string();
    }

    const PRECISION: i32 = 6;
    let scientific = format!("{:.*e}", (PRECISION - 1) as usize, n);
    let (mantissa, exponent) = match scientific.split_once('e') {
        Some(parts) => parts,
        None => return scientific,
    };
    let exponent: i32 = exponent.parse().unwrap_or(0);

    if (-4..PRECISION).contains(&exponent) {
        let decimals = (PRECISION - 1 - exponent) as usize;
        strip_trailing_zeros(format!("{:.*}", decimals, n))
    } else {
        let mantissa = strip_trailing_zeros(mantissa.to_string());
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", mantissa, sign, exponent.abs())
    }
}

fn strip_trailing_zeros(mut s: String) -> String {
    if s.contains('.') {
        while s.ends_with('0') {
            s.pop();
        }
        if s.ends_with('.') {
            s.pop();
        }
    }
    s
}
