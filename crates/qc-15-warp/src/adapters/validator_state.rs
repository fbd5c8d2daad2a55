//! Validator-state view used when collecting signatures.
//!
//! Messages from the primary network are signed by the receiving subnet's
//! validators unless the node is configured to demand primary-network
//! signers. This wrapper rewrites the queried chain accordingly.

use crate::domain::{ChainId, OracleError, ValidatorOutput};
use crate::ports::ValidatorOracle;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Id of the primary network and of the platform chain.
pub const PRIMARY_NETWORK_ID: ChainId = [0u8; 32];

/// Wraps a [`ValidatorOracle`] and substitutes this chain's validator set
/// for primary-network lookups.
pub struct ValidatorStateView {
    inner: Arc<dyn ValidatorOracle>,
    my_chain_id: ChainId,
    source_chain_id: ChainId,
    require_primary_network_signers: bool,
}

impl ValidatorStateView {
    /// `my_chain_id` is the chain whose validators stand in for the primary
    /// network; `source_chain_id` is the chain messages originate from.
    pub fn new(
        inner: Arc<dyn ValidatorOracle>,
        my_chain_id: ChainId,
        source_chain_id: ChainId,
        require_primary_network_signers: bool,
    ) -> Self {
        Self {
            inner,
            my_chain_id,
            source_chain_id,
            require_primary_network_signers,
        }
    }
}

#[async_trait]
impl ValidatorOracle for ValidatorStateView {
    async fn current_height(&self) -> Result<u64, OracleError> {
        self.inner.current_height().await
    }

    async fn validator_set(
        &self,
        height: u64,
        chain_id: ChainId,
    ) -> Result<Vec<ValidatorOutput>, OracleError> {
        // Platform-chain messages never demand primary signers.
        let use_primary =
            self.require_primary_network_signers && self.source_chain_id != PRIMARY_NETWORK_ID;
        if use_primary || chain_id != PRIMARY_NETWORK_ID {
            return self.inner.validator_set(height, chain_id).await;
        }

        debug!(
            height,
            chain_id = %hex::encode(self.my_chain_id),
            "Using local validator set for primary network"
        );
        self.inner.validator_set(height, self.my_chain_id).await
    }
}
