//! The value-transfer boundary between worker contexts and keeper storage.
//!
//! Workers never share heap with a keeper. Every value crossing the boundary
//! goes through a [`TransferEngine`]: once on the way in (before the keeper
//! primitive runs) and once on the way out (after it succeeds). Transfers are
//! all-or-nothing; on failure the destination receives nothing, so no
//! partially-built slot state is ever observable.

use std::fmt;
use std::sync::Arc;

use crate::key::Sentinel;
use crate::value::Value;

/// The transfer engine could not represent one of the values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnsupportedType;

impl fmt::Display for UnsupportedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tried to copy unsupported types")
    }
}

impl std::error::Error for UnsupportedType {}

/// Keeper-side representation of a transferred value.
///
/// Slots and keepers treat payloads as opaque; only transfer engines look
/// inside. `Sentinel` carries the reserved identities, notably the
/// nil-sentinel that stands in for [`Value::Nil`] in transit.
#[derive(Debug, Clone, PartialEq)]
pub enum PayloadRepr {
    /// A reserved identity (nil in transit).
    Sentinel(Sentinel),
    /// A boolean.
    Bool(bool),
    /// A signed integer.
    Int(i64),
    /// A floating-point number.
    Num(f64),
    /// An immutable string.
    Str(Arc<str>),
    /// An immutable byte buffer.
    Bytes(Arc<[u8]>),
}

/// A keeper-owned datum plus the byte cost the owning store accounts for it.
#[derive(Debug, Clone, PartialEq)]
pub struct Payload {
    repr: PayloadRepr,
    cost: usize,
}

impl Payload {
    /// Wraps a representation, computing its accounting cost.
    pub fn new(repr: PayloadRepr) -> Payload {
        const BASE: usize = 16;
        let cost = match &repr {
            PayloadRepr::Str(s) => BASE + s.len(),
            PayloadRepr::Bytes(b) => BASE + b.len(),
            _ => BASE,
        };
        Payload { repr, cost }
    }

    /// The engine-visible representation.
    pub fn repr(&self) -> &PayloadRepr {
        &self.repr
    }

    /// Approximate byte cost used by keeper-store accounting.
    pub fn cost(&self) -> usize {
        self.cost
    }
}

/// Moves values across the keeper boundary.
///
/// Both directions are all-or-nothing: either every value of the batch is
/// produced, or the destination receives nothing.
pub trait TransferEngine: Send + Sync + 'static {
    /// Deep-copies caller values into keeper payloads.
    fn to_keeper(&self, values: &[Value]) -> Result<Vec<Payload>, UnsupportedType>;

    /// Materialises keeper payloads back into caller values.
    fn from_keeper(&self, payloads: &[Payload]) -> Result<Vec<Value>, UnsupportedType>;
}

/// The default engine: a structural deep copy.
///
/// Encodes `Value::Nil` as the nil-sentinel on the way in and decodes it on
/// the way out. Refuses `Value::Foreign`, which has no representation a
/// keeper could own.
#[derive(Debug, Default, Clone, Copy)]
pub struct DeepCopyEngine;

impl TransferEngine for DeepCopyEngine {
    fn to_keeper(&self, values: &[Value]) -> Result<Vec<Payload>, UnsupportedType> {
        let mut out = Vec::with_capacity(values.len());
        for value in values {
            let repr = match value {
                Value::Nil => PayloadRepr::Sentinel(Sentinel::Nil),
                Value::Bool(b) => PayloadRepr::Bool(*b),
                Value::Int(i) => PayloadRepr::Int(*i),
                Value::Num(n) => PayloadRepr::Num(*n),
                Value::Str(s) => PayloadRepr::Str(s.clone()),
                Value::Bytes(b) => PayloadRepr::Bytes(b.clone()),
                Value::Foreign(_) => return Err(UnsupportedType),
            };
            out.push(Payload::new(repr));
        }
        Ok(out)
    }

    fn from_keeper(&self, payloads: &[Payload]) -> Result<Vec<Value>, UnsupportedType> {
        let mut out = Vec::with_capacity(payloads.len());
        for payload in payloads {
            let value = match payload.repr() {
                PayloadRepr::Sentinel(Sentinel::Nil) => Value::Nil,
                // Batch and Cancel markers never enter a slot
                PayloadRepr::Sentinel(_) => return Err(UnsupportedType),
                PayloadRepr::Bool(b) => Value::Bool(*b),
                PayloadRepr::Int(i) => Value::Int(*i),
                PayloadRepr::Num(n) => Value::Num(*n),
                PayloadRepr::Str(s) => Value::Str(s.clone()),
                PayloadRepr::Bytes(b) => Value::Bytes(b.clone()),
            };
            out.push(value);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nil_round_trips_through_the_sentinel() {
        let engine = DeepCopyEngine;
        let payloads = engine.to_keeper(&[Value::Nil, Value::Int(3)]).unwrap();
        assert_eq!(*payloads[0].repr(), PayloadRepr::Sentinel(Sentinel::Nil));
        let back = engine.from_keeper(&payloads).unwrap();
        assert_eq!(back, vec![Value::Nil, Value::Int(3)]);
    }

    #[test]
    fn foreign_values_are_refused_whole() {
        let engine = DeepCopyEngine;
        let foreign = Value::Foreign(std::sync::Arc::new(5u8));
        let result = engine.to_keeper(&[Value::Int(1), foreign]);
        assert_eq!(result, Err(UnsupportedType));
    }

    #[test]
    fn cost_tracks_buffer_length() {
        let small = Payload::new(PayloadRepr::Int(1));
        let big = Payload::new(PayloadRepr::Bytes(vec![0u8; 100].into()));
        assert!(big.cost() > small.cost());
    }
}
