//! # Message Verifier
//!
//! Classifies messages the backend has never accepted. It never signs and
//! never mutates backend state.
//!
//! ```text
//! Hash{block}                -> block oracle accepted?     -> ok | BlockNotAccepted
//! AddressedCall(src, body)   -> src non-empty              -> BadSourceAddress
//!                            -> body unparsable            -> ParseError
//!                            -> ValidatorUptime{id, secs}  -> observed >= secs ? ok : UptimeBelowClaim
//!                            -> unknown schema             -> UnknownPayloadType
//! ```

use super::stats::WarpStats;
use crate::domain::{
    BlockId, Hash, OffChainMessage, OracleError, ParseError, Payload, UnsignedMessage,
    VerifyError, WarpError,
};
use crate::ports::{BlockOracle, UptimeOracle};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Accept-before-sign policy for unknown messages.
pub struct MessageVerifier {
    block_oracle: Arc<dyn BlockOracle>,
    uptime_oracle: Arc<dyn UptimeOracle>,
    stats: Arc<WarpStats>,
}

impl MessageVerifier {
    /// Build a verifier over the given oracles.
    pub fn new(
        block_oracle: Arc<dyn BlockOracle>,
        uptime_oracle: Arc<dyn UptimeOracle>,
        stats: Arc<WarpStats>,
    ) -> Self {
        Self {
            block_oracle,
            uptime_oracle,
            stats,
        }
    }

    /// Decide whether an unknown message may be signed.
    pub async fn verify_unknown(
        &self,
        ctx: &CancellationToken,
        message: &UnsignedMessage,
    ) -> Result<(), WarpError> {
        let payload = message.parsed_payload().map_err(|err| {
            self.stats.inc_message_parse_failures();
            warn!(message_id = %hex::encode(message.id()), error = %err, "Unparsable warp payload");
            WarpError::from(err)
        })?;

        match payload {
            Payload::Hash { hash } => self.verify_block(ctx, hash).await,
            Payload::AddressedCall {
                source_address,
                call_payload,
            } => self.verify_offchain_call(&source_address, &call_payload),
        }
    }

    /// Succeed only if the block oracle reports `block_id` as accepted.
    pub async fn verify_block(
        &self,
        ctx: &CancellationToken,
        block_id: BlockId,
    ) -> Result<(), WarpError> {
        let lookup = tokio::select! {
            biased;
            _ = ctx.cancelled() => return Err(WarpError::Cancelled),
            result = self.block_oracle.get_accepted_block(block_id) => result,
        };

        match lookup {
            Ok(block) => {
                debug!(block_id = %hex::encode(block_id), height = block.height, "Block accepted");
                Ok(())
            }
            Err(err) => {
                self.stats.inc_block_validation_failures();
                Err(VerifyError::BlockNotAccepted {
                    block_id: hex::encode(block_id),
                    reason: err.to_string(),
                }
                .into())
            }
        }
    }

    fn verify_offchain_call(
        &self,
        source_address: &[u8],
        call_payload: &[u8],
    ) -> Result<(), WarpError> {
        if !source_address.is_empty() {
            return Err(VerifyError::BadSourceAddress.into());
        }

        let parsed = match OffChainMessage::parse(call_payload) {
            Ok(parsed) => parsed,
            Err(ParseError::UnknownSchema {
                codec_version,
                type_id,
            }) => {
                self.stats.inc_message_parse_failures();
                return Err(VerifyError::UnknownPayloadType(format!(
                    "off-chain codec version {codec_version}, type {type_id}"
                ))
                .into());
            }
            Err(err) => {
                self.stats.inc_message_parse_failures();
                return Err(err.into());
            }
        };

        match parsed {
            OffChainMessage::ValidatorUptime {
                validation_id,
                total_uptime,
            } => self
                .verify_uptime(&validation_id, total_uptime)
                .inspect_err(|_| self.stats.inc_uptime_validation_failures()),
        }
    }

    fn verify_uptime(&self, validation_id: &Hash, claimed: u64) -> Result<(), WarpError> {
        let observed = self
            .uptime_oracle
            .current_uptime_seconds(validation_id)
            .map_err(|err| {
                let reason = match err {
                    OracleError::NotFound => {
                        format!("validation {} not found", hex::encode(validation_id))
                    }
                    OracleError::Unavailable(reason) => reason,
                };
                VerifyError::UptimeUnavailable(reason)
            })?;

        if observed < claimed {
            return Err(VerifyError::UptimeBelowClaim { claimed, observed }.into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{MemoryBlockOracle, StaticUptimeOracle};

    fn verifier(blocks: MemoryBlockOracle, uptimes: StaticUptimeOracle) -> (MessageVerifier, Arc<WarpStats>) {
        let stats = Arc::new(WarpStats::new());
        (
            MessageVerifier::new(Arc::new(blocks), Arc::new(uptimes), Arc::clone(&stats)),
            stats,
        )
    }

    fn offchain(source: Vec<u8>, body: Vec<u8>) -> UnsignedMessage {
        UnsignedMessage::with_payload(1, [0x11; 32], &Payload::addressed_call(source, body))
            .unwrap()
    }

    fn uptime_claim(validation_id: Hash, total_uptime: u64) -> Vec<u8> {
        OffChainMessage::ValidatorUptime {
            validation_id,
            total_uptime,
        }
        .encode()
    }

    #[tokio::test]
    async fn test_accepted_block() {
        let blocks = MemoryBlockOracle::new();
        blocks.accept([0x22; 32], 7);
        let (v, _) = verifier(blocks, StaticUptimeOracle::default());
        v.verify_block(&CancellationToken::new(), [0x22; 32])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_unknown_block() {
        let (v, stats) = verifier(MemoryBlockOracle::new(), StaticUptimeOracle::default());
        let err = v
            .verify_block(&CancellationToken::new(), [0x33; 32])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            WarpError::Verify(VerifyError::BlockNotAccepted { .. })
        ));
        assert_eq!(stats.snapshot().block_validation_failures, 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_oracle() {
        let (v, _) = verifier(MemoryBlockOracle::new(), StaticUptimeOracle::default());
        let ctx = CancellationToken::new();
        ctx.cancel();
        assert_eq!(
            v.verify_block(&ctx, [0x22; 32]).await,
            Err(WarpError::Cancelled)
        );
    }

    #[tokio::test]
    async fn test_source_address_must_be_empty() {
        let (v, _) = verifier(MemoryBlockOracle::new(), StaticUptimeOracle::default());
        let msg = offchain(vec![1, 2, 3], uptime_claim([1; 32], 1));
        assert_eq!(
            v.verify_unknown(&CancellationToken::new(), &msg).await,
            Err(VerifyError::BadSourceAddress.into())
        );
    }

    #[tokio::test]
    async fn test_unknown_schema() {
        let (v, stats) = verifier(MemoryBlockOracle::new(), StaticUptimeOracle::default());
        let msg = offchain(Vec::new(), vec![0xFF, 0xFF]);
        let err = v
            .verify_unknown(&CancellationToken::new(), &msg)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            WarpError::Verify(VerifyError::UnknownPayloadType(_))
        ));
        assert_eq!(stats.snapshot().message_parse_failures, 1);
    }

    #[tokio::test]
    async fn test_truncated_offchain_body_is_parse_error() {
        let (v, _) = verifier(MemoryBlockOracle::new(), StaticUptimeOracle::default());
        let msg = offchain(Vec::new(), vec![0x00]);
        assert!(matches!(
            v.verify_unknown(&CancellationToken::new(), &msg).await,
            Err(WarpError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn test_uptime_claim() {
        let uptimes = StaticUptimeOracle::default().with([9; 32], 3_600);
        let (v, stats) = verifier(MemoryBlockOracle::new(), uptimes);
        let ctx = CancellationToken::new();

        v.verify_unknown(&ctx, &offchain(Vec::new(), uptime_claim([9; 32], 3_600)))
            .await
            .unwrap();

        let err = v
            .verify_unknown(&ctx, &offchain(Vec::new(), uptime_claim([9; 32], 3_601)))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            WarpError::Verify(VerifyError::UptimeBelowClaim {
                claimed: 3_601,
                observed: 3_600
            })
        );

        let err = v
            .verify_unknown(&ctx, &offchain(Vec::new(), uptime_claim([8; 32], 1)))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            WarpError::Verify(VerifyError::UptimeUnavailable(_))
        ));
        assert_eq!(stats.snapshot().uptime_validation_failures, 2);
    }

    #[tokio::test]
    async fn test_garbage_payload() {
        let (v, stats) = verifier(MemoryBlockOracle::new(), StaticUptimeOracle::default());
        let msg = UnsignedMessage::new(1, [0x11; 32], vec![0x09, 0x01]).unwrap();
        assert!(matches!(
            v.verify_unknown(&CancellationToken::new(), &msg).await,
            Err(WarpError::Parse(ParseError::UnknownDiscriminant(0x09)))
        ));
        assert_eq!(stats.snapshot().message_parse_failures, 1);
    }
}
