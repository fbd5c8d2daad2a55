//! Peer Signature Request Handler
//!
//! Serves `SignatureRequest` frames from other validators. Failures are
//! reported as typed application errors so the requester can tell a
//! malformed request from a refusal.

use crate::domain::{
    NodeId, Payload, SignatureRequest, SignatureResponse, WarpError,
};
use crate::ports::WarpBackendApi;
use crate::service::{WarpBackend, WarpStats};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Application-level error returned to the requesting peer.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("app error {code}: {message}")]
pub struct AppError {
    /// One of the peer application error codes.
    pub code: i32,
    /// Human-readable cause.
    pub message: String,
}

impl From<&WarpError> for AppError {
    fn from(err: &WarpError) -> Self {
        Self {
            code: err.app_error_code(),
            message: err.to_string(),
        }
    }
}

/// Answers signature requests with this node's signature.
pub struct SignatureRequestHandler {
    backend: Arc<WarpBackend>,
    stats: Arc<WarpStats>,
}

impl SignatureRequestHandler {
    /// Handler serving from `backend`; records into the backend's stats.
    pub fn new(backend: Arc<WarpBackend>) -> Self {
        let stats = backend.stats();
        Self { backend, stats }
    }

    /// Decode a request frame, sign, and encode the response frame.
    pub async fn handle(
        &self,
        ctx: &CancellationToken,
        node_id: NodeId,
        request: &[u8],
    ) -> Result<Vec<u8>, AppError> {
        let request = SignatureRequest::parse(request).map_err(|err| {
            let err = WarpError::from(err);
            warn!(node_id = %hex::encode(node_id), error = %err, "Malformed signature request");
            AppError::from(&err)
        })?;
        let message = request.message;
        let message_id = message.id();

        let cached = self.backend.cached_signature(&message_id).is_some();
        let is_block = matches!(message.parsed_payload(), Ok(Payload::Hash { .. }));
        match (is_block, cached) {
            (false, true) => {
                self.stats.inc_message_signature_requests();
                self.stats.inc_message_signature_hit();
            }
            (false, false) => {
                self.stats.inc_message_signature_requests();
                self.stats.inc_message_signature_miss();
            }
            (true, true) => {
                self.stats.inc_block_signature_requests();
                self.stats.inc_block_signature_hit();
            }
            (true, false) => {
                self.stats.inc_block_signature_requests();
                self.stats.inc_block_signature_miss();
            }
        }

        let signature = self
            .backend
            .get_message_signature(ctx, &message)
            .await
            .map_err(|err| {
                debug!(
                    node_id = %hex::encode(node_id),
                    message_id = %hex::encode(message_id),
                    error = %err,
                    "Refusing signature request"
                );
                AppError::from(&err)
            })?;

        Ok(SignatureResponse { signature }.encode())
    }
}
