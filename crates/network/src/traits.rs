//! Outbound transport interface.

use concord_types::{Tag, ValidatorId};

/// Fire-and-forget delivery of framed wire messages.
///
/// `bytes` are complete frames as produced by
/// [`encode_message`](crate::encode_message); `tag` repeats the frame's tag so
/// implementations can route or account without parsing. Inbound traffic is
/// delivered to the node as `NodeInput::MessageReceived`.
pub trait Transport: Send + Sync {
    /// Send to every connected peer.
    fn broadcast(&self, tag: Tag, bytes: Vec<u8>);

    /// Send to a single peer.
    fn send_to(&self, peer: ValidatorId, tag: Tag, bytes: Vec<u8>);

    /// Drop the connection to a misbehaving peer.
    fn disconnect(&self, peer: ValidatorId);

    /// Forward to every peer except `source`.
    fn relay(&self, source: ValidatorId, tag: Tag, bytes: Vec<u8>) {
        let _ = source;
        self.broadcast(tag, bytes);
    }
}
