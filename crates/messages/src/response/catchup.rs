//! Catch-up response.

use concord_types::{Bundle, NetworkMessage, Proposal, Round, Tag};
use sbor::prelude::BasicSbor;

/// A decided round: its cert-step bundle and the proposal it certifies.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub struct CatchupResponse {
    pub round: Round,
    pub certificate: Option<Bundle>,
    pub proposal: Option<Proposal>,
}

impl CatchupResponse {
    pub fn found(round: Round, certificate: Bundle, proposal: Proposal) -> Self {
        Self {
            round,
            certificate: Some(certificate),
            proposal: Some(proposal),
        }
    }

    pub fn not_found(round: Round) -> Self {
        Self {
            round,
            certificate: None,
            proposal: None,
        }
    }

    /// The certificate and proposal, if both are present.
    pub fn into_parts(self) -> Option<(Bundle, Proposal)> {
        self.certificate.zip(self.proposal)
    }
}

impl NetworkMessage for CatchupResponse {
    const TAG: Tag = Tag::UniCatchupRes;
}
