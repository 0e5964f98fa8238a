//! Catch-up request.

use crate::response::CatchupResponse;
use concord_types::{NetworkMessage, Request, Round, Tag};
use sbor::prelude::BasicSbor;

/// Ask a peer for the decision of `round`.
///
/// Sent when traffic for a future round shows this node has fallen behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, BasicSbor)]
pub struct CatchupRequest {
    pub round: Round,
}

impl CatchupRequest {
    pub fn new(round: Round) -> Self {
        Self { round }
    }
}

impl NetworkMessage for CatchupRequest {
    const TAG: Tag = Tag::UniCatchupReq;
}

impl Request for CatchupRequest {
    type Response = CatchupResponse;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_tag_is_complement() {
        assert_eq!(
            <CatchupRequest as Request>::Response::TAG,
            CatchupRequest::TAG.complement()
        );
    }
}
