//! # Outbound Ports
//!
//! Collaborators the Warp core consumes but does not own: oracles, the
//! durable store, the peer transport, and the BLS signer.

use crate::domain::{
    AcceptedBlock, BlockId, ChainId, Hash, KVStoreError, NodeId, OracleError, PublicKeyBytes,
    SignatureBytes, TransportError, UnsignedMessage, ValidatorOutput, WarpError,
};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Block-acceptance oracle - outbound port.
#[async_trait]
pub trait BlockOracle: Send + Sync {
    /// Return the block if consensus has accepted it.
    async fn get_accepted_block(&self, block_id: BlockId) -> Result<AcceptedBlock, OracleError>;
}

/// Validator-set oracle - outbound port.
#[async_trait]
pub trait ValidatorOracle: Send + Sync {
    /// Current P-chain height.
    async fn current_height(&self) -> Result<u64, OracleError>;

    /// Validator set of `chain_id` at `height`.
    async fn validator_set(
        &self,
        height: u64,
        chain_id: ChainId,
    ) -> Result<Vec<ValidatorOutput>, OracleError>;
}

/// Validator uptime reader - outbound port.
pub trait UptimeOracle: Send + Sync {
    /// Accumulated uptime of a validation, in seconds, as of now.
    fn current_uptime_seconds(&self, validation_id: &Hash) -> Result<u64, OracleError>;
}

/// Byte-keyed durable store - outbound port.
pub trait KeyValueStore: Send + Sync {
    /// Read a value.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError>;

    /// Write a value, replacing any previous one.
    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError>;

    /// Remove a value. Missing keys are not an error.
    fn delete(&self, key: &[u8]) -> Result<(), KVStoreError>;

    /// All entries whose key starts with `prefix`, in key order.
    fn iter_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, KVStoreError>;
}

/// Peer request/response transport - outbound port.
#[async_trait]
pub trait RequestClient: Send + Sync {
    /// Send `request` to `node_id` and await its reply.
    async fn send_request(
        &self,
        node_id: NodeId,
        request: Vec<u8>,
    ) -> Result<Vec<u8>, TransportError>;
}

/// Source of individual validator signatures for the aggregator.
#[async_trait]
pub trait SignatureGetter: Send + Sync {
    /// Obtain `node_id`'s signature over `message`. Must return promptly
    /// once `ctx` is cancelled.
    async fn get_signature(
        &self,
        ctx: &CancellationToken,
        node_id: NodeId,
        message: &UnsignedMessage,
    ) -> Result<SignatureBytes, WarpError>;
}

/// BLS signer holding this node's key.
pub trait WarpSigner: Send + Sync {
    /// Sign arbitrary bytes.
    fn sign(&self, bytes: &[u8]) -> Result<SignatureBytes, WarpError>;

    /// Sign the canonical encoding of `message`.
    fn sign_unsigned(&self, message: &UnsignedMessage) -> Result<SignatureBytes, WarpError> {
        self.sign(message.bytes())
    }

    /// Compressed public key.
    fn public_key(&self) -> PublicKeyBytes;
}
