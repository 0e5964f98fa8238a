//! Network message traits.
//!
//! These traits bind payload types to their wire [`Tag`] so the codec and the
//! handler registry can route them without a central match.

use crate::Tag;
use sbor::prelude::{BasicDecode, BasicEncode};

/// A payload that travels on the wire under a fixed tag.
pub trait NetworkMessage: Send + Sync + Sized + BasicEncode + BasicDecode {
    /// Tag prefixed to the encoded payload.
    const TAG: Tag;

    /// Human-readable name for logs.
    fn message_type_id() -> &'static str {
        Self::TAG.as_str()
    }
}

/// Marker trait for request messages that expect a response.
///
/// The response travels under the request tag's complement.
pub trait Request: NetworkMessage {
    type Response: NetworkMessage;
}
