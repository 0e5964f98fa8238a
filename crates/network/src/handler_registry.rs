//! Tag-indexed handler registry for inbound message dispatch.
//!
//! Stores one typed handler per [`Tag`] in a fixed table indexed by
//! [`Tag::index`], and dispatches framed bytes to it after decoding. The
//! registry only routes: penalising a peer for malformed input is the
//! caller's decision.

use crate::codec::{self, CodecError};
use concord_types::{NetworkMessage, Tag, ValidatorId};
use thiserror::Error;
use tracing::debug;

/// Errors from registering or dispatching.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("no handler registered for tag {0}")]
    NoHandler(Tag),

    #[error("a handler is already registered for tag {0}")]
    AlreadyRegistered(Tag),
}

/// Type-erased handler that decodes the payload and calls the typed handler.
type RawHandler<Ctx> =
    Box<dyn Fn(&mut Ctx, ValidatorId, &[u8]) -> Result<(), CodecError> + Send + Sync>;

/// Registry of typed message handlers, one slot per tag.
pub struct HandlerRegistry<Ctx> {
    handlers: [Option<RawHandler<Ctx>>; Tag::COUNT],
}

impl<Ctx> HandlerRegistry<Ctx> {
    pub fn new() -> Self {
        Self {
            handlers: std::array::from_fn(|_| None),
        }
    }

    /// Install the handler for `M::TAG`.
    pub fn register<M, F>(&mut self, handler: F) -> Result<(), RegistryError>
    where
        M: NetworkMessage + 'static,
        F: Fn(&mut Ctx, ValidatorId, M) + Send + Sync + 'static,
    {
        let slot = &mut self.handlers[M::TAG.index()];
        if slot.is_some() {
            return Err(RegistryError::AlreadyRegistered(M::TAG));
        }
        *slot = Some(Box::new(move |ctx, sender, payload| {
            let message = codec::decode_payload::<M>(payload)?;
            handler(ctx, sender, message);
            Ok(())
        }));
        Ok(())
    }

    pub fn is_registered(&self, tag: Tag) -> bool {
        self.handlers[tag.index()].is_some()
    }

    /// Decode a frame and invoke its handler. Returns the frame's tag.
    pub fn dispatch(
        &self,
        ctx: &mut Ctx,
        sender: ValidatorId,
        bytes: &[u8],
    ) -> Result<Tag, RegistryError> {
        let (tag, payload) = codec::decode(bytes)?;
        let Some(handler) = &self.handlers[tag.index()] else {
            return Err(RegistryError::NoHandler(tag));
        };
        handler(ctx, sender, payload).inspect_err(|e| {
            debug!(%sender, %tag, error = %e, "Failed to decode payload");
        })?;
        Ok(tag)
    }
}

impl<Ctx> Default for HandlerRegistry<Ctx> {
    fn default() -> Self {
        Self::new()
    }
}
