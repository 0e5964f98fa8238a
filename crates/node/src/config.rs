//! Configuration for [`NodeLoop`](crate::NodeLoop).

use crate::catchup::DEFAULT_RETRY_AFTER;
use concord_agreement::{AgreementConfig, ConfigError};

/// Bundles the player's configuration with node-level switches so runners
/// pass a single value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeConfig {
    pub agreement: AgreementConfig,

    /// Answer `CatchupRequest`s from peers that fell behind.
    pub serve_catchup: bool,

    /// Send `CatchupRequest`s when peers are seen in a later round.
    pub request_catchup: bool,

    /// Future-round messages to wait for a catch-up response before asking
    /// again.
    pub catchup_retry_after: u32,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            agreement: AgreementConfig::default(),
            serve_catchup: true,
            request_catchup: true,
            catchup_retry_after: DEFAULT_RETRY_AFTER,
        }
    }
}

impl NodeConfig {
    pub fn with_agreement(mut self, agreement: AgreementConfig) -> Self {
        self.agreement = agreement;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.agreement.validate()
    }
}
