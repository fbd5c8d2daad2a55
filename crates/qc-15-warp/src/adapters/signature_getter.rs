//! Signature Getter Adapters
//!
//! `NetworkSignatureGetter` asks peers over the request transport.
//! `LocalSignatureGetter` answers from this node's own backend, for
//! single-node setups and tests.

use crate::domain::{
    NodeId, SignatureBytes, SignatureRequest, SignatureResponse, TransportError, UnsignedMessage,
    WarpError,
};
use crate::ports::{RequestClient, SignatureGetter, WarpBackendApi};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Fetches signatures from peers with a per-request timeout.
pub struct NetworkSignatureGetter {
    client: Arc<dyn RequestClient>,
    timeout: Duration,
}

impl NetworkSignatureGetter {
    /// Getter sending through `client`, giving up on each peer after
    /// `timeout`.
    pub fn new(client: Arc<dyn RequestClient>, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

#[async_trait]
impl SignatureGetter for NetworkSignatureGetter {
    async fn get_signature(
        &self,
        ctx: &CancellationToken,
        node_id: NodeId,
        message: &UnsignedMessage,
    ) -> Result<SignatureBytes, WarpError> {
        let request = SignatureRequest {
            message: message.clone(),
        }
        .encode()?;

        let reply = tokio::select! {
            biased;
            _ = ctx.cancelled() => return Err(WarpError::Cancelled),
            reply = tokio::time::timeout(self.timeout, self.client.send_request(node_id, request)) => reply,
        };

        let bytes = match reply {
            Ok(result) => result?,
            Err(_) => {
                debug!(node_id = %hex::encode(node_id), "Signature request timed out");
                return Err(TransportError::Timeout.into());
            }
        };

        Ok(SignatureResponse::parse(&bytes)?.signature)
    }
}

/// Serves signatures from a local backend, ignoring the node id.
pub struct LocalSignatureGetter {
    backend: Arc<dyn WarpBackendApi>,
}

impl LocalSignatureGetter {
    /// Getter backed by `backend`.
    pub fn new(backend: Arc<dyn WarpBackendApi>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl SignatureGetter for LocalSignatureGetter {
    async fn get_signature(
        &self,
        ctx: &CancellationToken,
        _node_id: NodeId,
        message: &UnsignedMessage,
    ) -> Result<SignatureBytes, WarpError> {
        self.backend.get_message_signature(ctx, message).await
    }
}
