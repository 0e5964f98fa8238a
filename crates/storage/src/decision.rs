//! Decided-round record.

use concord_types::{Bundle, Proposal, Round, Value};
use sbor::prelude::*;

/// A decided round: the cert-step bundle and the proposal it certifies.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub struct Decision {
    /// The decided round.
    pub round: Round,
    /// Cert-step bundle for the decided value.
    pub certificate: Bundle,
    /// The proposal whose value was certified.
    pub proposal: Proposal,
}

impl Decision {
    /// Bundle a certificate with its proposal.
    pub fn new(round: Round, certificate: Bundle, proposal: Proposal) -> Self {
        Self {
            round,
            certificate,
            proposal,
        }
    }

    /// The decided value.
    pub fn value(&self) -> Value {
        self.certificate.value
    }
}
