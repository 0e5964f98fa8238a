//! Message encoding and decoding for network transport.
//!
//! # Wire Format
//!
//! ```text
//! [2-byte ASCII tag][LZ4 compressed SBOR payload]
//! ```
//!
//! The tag alone determines the payload type. [`encode`] and [`decode`] deal
//! only with the framing; [`encode_message`] and [`decode_payload`] add the
//! typed layer.

use crate::wire::{self, WireError};
use concord_core::OutboundMessage;
use concord_types::{NetworkMessage, Tag, UnrecognizedTag};
use thiserror::Error;

/// Errors that can occur during message encoding/decoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("message too short")]
    MessageTooShort,

    #[error(transparent)]
    UnrecognizedTag(#[from] UnrecognizedTag),

    #[error("SBOR decode error: {0}")]
    SborDecode(String),

    #[error("SBOR encode error: {0}")]
    SborEncode(String),

    #[error(transparent)]
    Decompress(#[from] WireError),
}

/// Prefix `payload` with the tag's code.
pub fn encode(tag: Tag, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(Tag::LEN + payload.len());
    out.extend_from_slice(&tag.code());
    out.extend_from_slice(payload);
    out
}

/// Split a frame into its tag and payload.
pub fn decode(bytes: &[u8]) -> Result<(Tag, &[u8]), CodecError> {
    if bytes.len() < Tag::LEN {
        return Err(CodecError::MessageTooShort);
    }
    let (code, payload) = bytes.split_at(Tag::LEN);
    let tag = Tag::from_code([code[0], code[1]])?;
    Ok((tag, payload))
}

/// Encode a typed message as a complete frame: `tag ++ lz4(sbor(message))`.
pub fn encode_message<M: NetworkMessage>(message: &M) -> Result<Vec<u8>, CodecError> {
    let sbor_bytes =
        sbor::basic_encode(message).map_err(|e| CodecError::SborEncode(format!("{:?}", e)))?;
    Ok(encode(M::TAG, &wire::compress(&sbor_bytes)))
}

/// Decode the payload half of a frame into `M`.
pub fn decode_payload<M: NetworkMessage>(payload: &[u8]) -> Result<M, CodecError> {
    let sbor_bytes = wire::decompress(payload)?;
    sbor::basic_decode(&sbor_bytes).map_err(|e| CodecError::SborDecode(format!("{:?}", e)))
}

/// Encode one of the state machine's outbound gossip messages.
pub fn encode_outbound(message: &OutboundMessage) -> Result<Vec<u8>, CodecError> {
    match message {
        OutboundMessage::Vote(gossip) => encode_message(gossip),
        OutboundMessage::Proposal(gossip) => encode_message(gossip.as_ref()),
        OutboundMessage::Bundle(gossip) => encode_message(gossip),
    }
}
