//! VoteBundle gossip message.

use concord_types::{Bundle, NetworkMessage, Tag};
use sbor::prelude::BasicSbor;

/// A quorum bundle. Receiving one lets a lagging peer fast-forward.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub struct VoteBundleGossip {
    pub bundle: Bundle,
}

impl VoteBundleGossip {
    pub fn new(bundle: Bundle) -> Self {
        Self { bundle }
    }

    pub fn into_bundle(self) -> Bundle {
        self.bundle
    }
}

impl NetworkMessage for VoteBundleGossip {
    const TAG: Tag = Tag::VoteBundle;
}
