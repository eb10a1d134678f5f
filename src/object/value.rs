//! Tagged item storage - one representation for objects, pointers, scalars
//!
//! Tables store `Value` on both the key and value sides, so a single engine
//! serves object maps, integer sets, and pointer tables without duplication.
//! Only the `Obj` variant participates in ownership; the rest are inert.

use super::heap::{self, ObjRef};

/// A storable item: an owning object reference, a pointer-sized datum, or a
/// scalar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    /// Owning reference to a heap object.
    Obj(ObjRef),
    /// Non-owned pointer-sized datum, hashed and compared by address.
    Addr(usize),
    /// Signed integer scalar, its own hash.
    Int(i64),
    /// Float scalar, hashed and compared bitwise.
    Float(f64),
}

impl Value {
    /// Hash of the item. Scalars and addresses hash to themselves; objects
    /// answer through the heap.
    #[inline]
    pub fn hash(&self) -> u64 {
        match *self {
            Value::Obj(obj) => heap::hash(obj),
            Value::Addr(addr) => addr as u64,
            Value::Int(i) => i as u64,
            Value::Float(f) => f.to_bits(),
        }
    }

    /// Equality. Mixed variants are never equal; floats compare bitwise so
    /// equality stays consistent with `hash`.
    #[inline]
    pub fn equal(&self, other: &Value) -> bool {
        match (*self, *other) {
            (Value::Obj(a), Value::Obj(b)) => heap::equal(a, b),
            (Value::Addr(a), Value::Addr(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            _ => false,
        }
    }

    /// Retain the item; a no-op for everything but `Obj`.
    #[inline]
    pub fn retain(&self) {
        if let Value::Obj(obj) = *self {
            heap::retain(obj);
        }
    }

    /// Release the item; a no-op for everything but `Obj`.
    #[inline]
    pub fn release(&self) {
        if let Value::Obj(obj) = *self {
            heap::release(obj);
        }
    }

    /// The object handle, if this is an `Obj`.
    #[inline]
    pub fn as_obj(&self) -> Option<ObjRef> {
        match *self {
            Value::Obj(obj) => Some(obj),
            _ => None,
        }
    }

    /// The integer, if this is an `Int`.
    #[inline]
    pub fn as_int(&self) -> Option<i64> {
        match *self {
            Value::Int(i) => Some(i),
            _ => None,
        }
    }
}

impl From<ObjRef> for Value {
    fn from(obj: ObjRef) -> Self {
        Value::Obj(obj)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}
