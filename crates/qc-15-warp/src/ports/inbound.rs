//! # Inbound Ports
//!
//! What the Warp backend offers to RPC handlers, peer handlers and the
//! local signature getter.

use crate::domain::{BlockId, MessageId, SignatureBytes, UnsignedMessage, WarpError};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Warp backend API - inbound port.
#[async_trait]
pub trait WarpBackendApi: Send + Sync {
    /// Persist an on-chain message and cache its signature.
    async fn add_message(&self, message: &UnsignedMessage) -> Result<(), WarpError>;

    /// Look up an accepted message by id.
    async fn get_message(&self, id: &MessageId) -> Result<UnsignedMessage, WarpError>;

    /// Sign `message` if it is acceptable.
    async fn get_message_signature(
        &self,
        ctx: &CancellationToken,
        message: &UnsignedMessage,
    ) -> Result<SignatureBytes, WarpError>;

    /// Sign the canonical hash-payload message for an accepted block.
    async fn get_block_signature(
        &self,
        ctx: &CancellationToken,
        block_id: BlockId,
    ) -> Result<SignatureBytes, WarpError>;

    /// Decide whether `message` may be signed. `justification` is reserved.
    async fn verify(
        &self,
        ctx: &CancellationToken,
        message: &UnsignedMessage,
        justification: Option<&[u8]>,
    ) -> Result<(), WarpError>;
}
