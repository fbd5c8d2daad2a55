//! # Signature Aggregator
//!
//! Fans out one signature request per validator, verifies each reply
//! against the validator's key, and stops as soon as the verified weight
//! reaches the quorum.
//!
//! All fetches share a child of the caller's token. Reaching quorum or
//! returning for any reason cancels it, so slow peers never hold the
//! caller.

use crate::algorithms::bls::{aggregate_signatures, parse_public_key, parse_signature, verify};
use crate::algorithms::quorum::{required_weight, sum_weights};
use crate::domain::{
    AggregateSignatureResult, BitSetSignature, CanonicalValidatorSet, Message, SignerBitSet,
    UnsignedMessage, ValidatorEntry, WarpError,
};
use crate::ports::SignatureGetter;
use blst::min_pk::Signature;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Collects a threshold BLS signature from a validator set.
#[derive(Clone)]
pub struct SignatureAggregator {
    getter: Arc<dyn SignatureGetter>,
}

impl SignatureAggregator {
    /// Aggregator fetching through `getter`.
    pub fn new(getter: Arc<dyn SignatureGetter>) -> Self {
        Self { getter }
    }

    /// Produce a signed message whose signers hold at least
    /// `quorum_num / quorum_den` of `set.total_weight`.
    ///
    /// Bit positions come from each entry's `index`; the list is not
    /// reordered.
    pub async fn aggregate_signatures(
        &self,
        ctx: &CancellationToken,
        message: &UnsignedMessage,
        set: &CanonicalValidatorSet,
        quorum_num: u64,
        quorum_den: u64,
    ) -> Result<AggregateSignatureResult, WarpError> {
        if set.is_empty() {
            return Err(WarpError::NoValidators);
        }
        check_set(set)?;
        let total_weight = set.total_weight;
        let required = required_weight(total_weight, quorum_num, quorum_den)?;
        let validators = &set.validators;

        debug!(
            message_id = %hex::encode(message.id()),
            validators = validators.len(),
            total_weight,
            required,
            "Aggregating warp signatures"
        );

        let fetch_ctx = ctx.child_token();
        let _cancel_on_return = fetch_ctx.clone().drop_guard();

        let (tx, mut rx) = mpsc::channel(validators.len());
        let shared = Arc::new(message.clone());
        for validator in validators {
            let getter = Arc::clone(&self.getter);
            let ctx = fetch_ctx.clone();
            let message = Arc::clone(&shared);
            let validator = validator.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let result = fetch_verified(getter.as_ref(), &ctx, &validator, &message).await;
                // Capacity equals the fan-out, so this never waits. A closed
                // receiver means the merge loop is done.
                let _ = tx.send((validator, result)).await;
            });
        }
        drop(tx);

        let mut signers = SignerBitSet::new();
        let mut signatures: Vec<Signature> = Vec::with_capacity(validators.len());
        let mut accumulated = 0u64;

        loop {
            tokio::select! {
                biased;
                _ = ctx.cancelled() => return Err(WarpError::Cancelled),
                next = rx.recv() => {
                    let Some((validator, result)) = next else { break };
                    match result {
                        Ok(signature) => {
                            accumulated = accumulated
                                .checked_add(validator.weight)
                                .ok_or(WarpError::WeightOverflow)?;
                            signers.add(validator.index);
                            signatures.push(signature);
                            if accumulated >= required {
                                fetch_ctx.cancel();
                                break;
                            }
                        }
                        Err(err) => {
                            warn!(
                                index = validator.index,
                                nodes = validator.node_ids.len(),
                                error = %err,
                                "Dropping warp signature"
                            );
                        }
                    }
                }
            }
        }

        if signatures.is_empty() || accumulated < required {
            return Err(WarpError::InsufficientQuorum {
                accumulated,
                total_weight,
                required,
            });
        }

        let signature = aggregate_signatures(&signatures)?;
        debug!(
            message_id = %hex::encode(message.id()),
            signers = signatures.len(),
            accumulated,
            "Aggregated warp signature"
        );
        Ok(AggregateSignatureResult {
            message: Message::new(message.clone(), BitSetSignature { signers, signature }),
            signature_weight: accumulated,
            total_weight,
        })
    }
}

/// Indices must be a permutation of `0..len` and the entries may not
/// outweigh the set.
fn check_set(set: &CanonicalValidatorSet) -> Result<(), WarpError> {
    let len = set.len();
    let mut seen = vec![false; len];
    for validator in &set.validators {
        match seen.get_mut(validator.index) {
            Some(slot) if !*slot => *slot = true,
            Some(_) => {
                return Err(WarpError::InvalidValidatorSet(format!(
                    "duplicate index {}",
                    validator.index
                )))
            }
            None => {
                return Err(WarpError::InvalidValidatorSet(format!(
                    "index {} out of range for {len} validators",
                    validator.index
                )))
            }
        }
    }
    let signing_weight = sum_weights(set.validators.iter().map(|v| v.weight))?;
    if signing_weight > set.total_weight {
        return Err(WarpError::InvalidValidatorSet(format!(
            "entries weigh {signing_weight}, set total is {}",
            set.total_weight
        )));
    }
    Ok(())
}

/// Fetch one validator's signature, trying each of its nodes in turn, and
/// check it before it may count.
async fn fetch_verified(
    getter: &dyn SignatureGetter,
    ctx: &CancellationToken,
    validator: &ValidatorEntry,
    message: &UnsignedMessage,
) -> Result<Signature, WarpError> {
    let public_key = parse_public_key(&validator.public_key)?;
    let mut last_err = WarpError::InvalidValidatorSet("validator has no node ids".into());
    for &node_id in &validator.node_ids {
        let attempt = async {
            let bytes = getter.get_signature(ctx, node_id, message).await?;
            let signature = parse_signature(&bytes)?;
            if !verify(&public_key, message.bytes(), &signature) {
                return Err(WarpError::AggregateFailed(
                    "signature does not verify under validator key".into(),
                ));
            }
            Ok(signature)
        };
        match attempt.await {
            Ok(signature) => return Ok(signature),
            Err(WarpError::Cancelled) => return Err(WarpError::Cancelled),
            Err(err) => {
                debug!(node_id = %hex::encode(node_id), error = %err, "Node signature rejected");
                last_err = err;
            }
        }
    }
    Err(last_err)
}
