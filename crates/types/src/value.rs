//! Values that votes are cast for.

use crate::Hash;
use sbor::prelude::*;
use std::fmt;

/// A candidate block identifier, or bottom ("no value").
///
/// Equality is by identifier only. `Bottom` orders before every concrete
/// value; concrete values order by their digest bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, BasicSbor)]
pub enum Value {
    /// No value. Voted when a period times out without agreement.
    Bottom,
    /// A proposal, identified by its content digest.
    Proposal(Hash),
}

impl Value {
    pub fn is_bottom(&self) -> bool {
        matches!(self, Value::Bottom)
    }

    /// Digest of the proposal, if this is a concrete value.
    pub fn digest(&self) -> Option<Hash> {
        match self {
            Value::Bottom => None,
            Value::Proposal(hash) => Some(*hash),
        }
    }

    pub(crate) fn write_bytes(&self, out: &mut Vec<u8>) {
        match self {
            Value::Bottom => out.push(0),
            Value::Proposal(hash) => {
                out.push(1);
                out.extend_from_slice(hash.as_bytes());
            }
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Bottom
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bottom => f.write_str("bottom"),
            Value::Proposal(hash) => write!(f, "{}", &hash.to_hex()[..16]),
        }
    }
}
