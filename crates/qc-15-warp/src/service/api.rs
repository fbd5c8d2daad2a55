//! # Warp API Service
//!
//! Backs the local JSON-RPC methods: message lookup, local signatures, and
//! aggregate signatures collected from the source chain's validators.

use crate::algorithms::bls::parse_public_key;
use crate::algorithms::quorum::sum_weights;
use crate::algorithms::SignatureAggregator;
use crate::domain::{
    AggregateSignatureResult, BlockId, CanonicalValidatorSet, ChainId, MessageId, Payload,
    SignatureBytes, UnsignedMessage, ValidatorEntry, ValidatorOutput, WarpConfig, WarpError,
};
use crate::ports::{SignatureGetter, ValidatorOracle, WarpBackendApi};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Build the canonical set from an oracle's raw validators.
///
/// Nodes sharing a BLS key merge into one entry with their weights summed.
/// Entries are ordered by uncompressed public key and numbered from 0.
/// Validators without a usable key cannot sign but still count toward
/// `total_weight`.
pub fn canonical_validator_set(
    outputs: Vec<ValidatorOutput>,
) -> Result<CanonicalValidatorSet, WarpError> {
    let total_weight = sum_weights(outputs.iter().map(|v| v.weight))?;

    let mut by_key: BTreeMap<[u8; 96], ValidatorEntry> = BTreeMap::new();
    for output in outputs {
        let Some(public_key) = output.public_key else {
            continue;
        };
        let parsed = match parse_public_key(&public_key) {
            Ok(pk) => pk,
            Err(err) => {
                warn!(
                    node_id = %hex::encode(output.node_id),
                    error = %err,
                    "Validator key unusable, excluded from signing"
                );
                continue;
            }
        };
        let entry = by_key
            .entry(parsed.serialize())
            .or_insert_with(|| ValidatorEntry {
                node_ids: Vec::new(),
                public_key,
                weight: 0,
                index: 0,
            });
        entry.weight = entry
            .weight
            .checked_add(output.weight)
            .ok_or(WarpError::WeightOverflow)?;
        entry.node_ids.push(output.node_id);
    }

    let validators = by_key
        .into_values()
        .enumerate()
        .map(|(index, entry)| ValidatorEntry { index, ..entry })
        .collect();
    Ok(CanonicalValidatorSet {
        validators,
        total_weight,
    })
}

/// Query surface behind the RPC adapter.
pub struct WarpApiService {
    network_id: u32,
    source_chain_id: ChainId,
    quorum_denominator: u64,
    default_quorum_numerator: u64,
    backend: Arc<dyn WarpBackendApi>,
    validators: Arc<dyn ValidatorOracle>,
    aggregator: SignatureAggregator,
}

impl WarpApiService {
    /// Build the service. `validators` should already apply any
    /// primary-network substitution.
    pub fn new(
        config: &WarpConfig,
        backend: Arc<dyn WarpBackendApi>,
        validators: Arc<dyn ValidatorOracle>,
        getter: Arc<dyn SignatureGetter>,
    ) -> Result<Self, WarpError> {
        config.validate()?;
        Ok(Self {
            network_id: config.network_id,
            source_chain_id: config.chain_id()?,
            quorum_denominator: config.quorum_denominator,
            default_quorum_numerator: config.default_quorum_numerator,
            backend,
            validators,
            aggregator: SignatureAggregator::new(getter),
        })
    }

    /// Canonical bytes of an accepted message.
    pub async fn get_message(&self, id: &MessageId) -> Result<Vec<u8>, WarpError> {
        let message = self.backend.get_message(id).await?;
        Ok(message.bytes().to_vec())
    }

    /// This node's signature over an accepted message.
    pub async fn get_message_signature(
        &self,
        ctx: &CancellationToken,
        id: &MessageId,
    ) -> Result<SignatureBytes, WarpError> {
        let message = self.backend.get_message(id).await?;
        self.backend.get_message_signature(ctx, &message).await
    }

    /// This node's signature over an accepted block.
    pub async fn get_block_signature(
        &self,
        ctx: &CancellationToken,
        block_id: BlockId,
    ) -> Result<SignatureBytes, WarpError> {
        self.backend.get_block_signature(ctx, block_id).await
    }

    /// Signed message bytes for an accepted message. A `quorum_num` of 0
    /// selects the configured default; `chain_id` defaults to this chain.
    pub async fn get_message_aggregate_signature(
        &self,
        ctx: &CancellationToken,
        id: &MessageId,
        quorum_num: u64,
        chain_id: Option<ChainId>,
    ) -> Result<Vec<u8>, WarpError> {
        let message = self.backend.get_message(id).await?;
        let result = self.aggregate(ctx, &message, quorum_num, chain_id).await?;
        Ok(result.message.encode()?)
    }

    /// Signed hash-payload message for a block.
    pub async fn get_block_aggregate_signature(
        &self,
        ctx: &CancellationToken,
        block_id: BlockId,
        quorum_num: u64,
        chain_id: Option<ChainId>,
    ) -> Result<Vec<u8>, WarpError> {
        let message = UnsignedMessage::with_payload(
            self.network_id,
            self.source_chain_id,
            &Payload::block_hash(block_id),
        )?;
        let result = self.aggregate(ctx, &message, quorum_num, chain_id).await?;
        Ok(result.message.encode()?)
    }

    /// Canonical validator set of `chain_id` at the current height.
    pub async fn canonical_validators(
        &self,
        chain_id: ChainId,
    ) -> Result<(u64, CanonicalValidatorSet), WarpError> {
        let height = self
            .validators
            .current_height()
            .await
            .map_err(|e| WarpError::ValidatorOracle(e.to_string()))?;
        let outputs = self
            .validators
            .validator_set(height, chain_id)
            .await
            .map_err(|e| WarpError::ValidatorOracle(e.to_string()))?;
        Ok((height, canonical_validator_set(outputs)?))
    }

    /// Run the aggregator against the canonical set of `chain_id`.
    pub async fn aggregate(
        &self,
        ctx: &CancellationToken,
        message: &UnsignedMessage,
        quorum_num: u64,
        chain_id: Option<ChainId>,
    ) -> Result<AggregateSignatureResult, WarpError> {
        let chain_id = chain_id.unwrap_or(self.source_chain_id);
        let quorum_num = match quorum_num {
            0 => self.default_quorum_numerator,
            n => n,
        };

        let (height, set) = self.canonical_validators(chain_id).await?;
        if set.is_empty() {
            return Err(WarpError::NoValidators);
        }

        debug!(
            chain_id = %hex::encode(chain_id),
            height,
            validators = set.len(),
            total_weight = set.total_weight,
            quorum_num,
            "Fetching warp signatures"
        );

        self.aggregator
            .aggregate_signatures(ctx, message, &set, quorum_num, self.quorum_denominator)
            .await
    }
}
