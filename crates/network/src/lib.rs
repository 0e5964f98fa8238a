//! Shared network protocol logic.
//!
//! This crate contains transport-independent protocol components:
//!
//! - [`wire`]: LZ4 compress/decompress helpers
//! - [`codec`]: tag framing and SBOR encode/decode
//! - [`handler_registry`]: tag-indexed dispatch of inbound bytes to typed handlers
//! - [`Transport`]: the outbound interface a runner provides
//!
//! No async runtime dependency.

pub mod codec;
pub mod handler_registry;
mod traits;
pub mod wire;

pub use codec::{
    decode, decode_payload, encode, encode_message, encode_outbound, CodecError,
};
pub use handler_registry::{HandlerRegistry, RegistryError};
pub use traits::Transport;
pub use wire::{compress, decompress, WireError};
