//! JSON-RPC adapter for [`WarpApiService`].
//!
//! Ids and results are `0x`-prefixed hex. Every call runs under its own
//! cancellation token, cancelled if the handler future is dropped.

use crate::domain::{ChainId, WarpError};
use crate::service::WarpApiService;
use jsonrpsee::core::RegisterMethodError;
use jsonrpsee::types::ErrorObjectOwned;
use jsonrpsee::RpcModule;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const INVALID_PARAMS_CODE: i32 = -32602;

fn warp_error(err: WarpError) -> ErrorObjectOwned {
    ErrorObjectOwned::owned(err.code(), err.to_string(), None::<()>)
}

fn invalid_params(message: String) -> ErrorObjectOwned {
    ErrorObjectOwned::owned(INVALID_PARAMS_CODE, message, None::<()>)
}

fn parse_id(value: &str) -> Result<[u8; 32], ErrorObjectOwned> {
    let digits = value.strip_prefix("0x").unwrap_or(value);
    let bytes = hex::decode(digits).map_err(|e| invalid_params(format!("invalid hex id: {e}")))?;
    <[u8; 32]>::try_from(bytes.as_slice())
        .map_err(|_| invalid_params(format!("id must be 32 bytes, got {}", bytes.len())))
}

fn to_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// RPC context wrapping the Warp API.
pub struct WarpRpc {
    service: Arc<WarpApiService>,
}

impl WarpRpc {
    /// Wrap `service`.
    pub fn new(service: Arc<WarpApiService>) -> Self {
        Self { service }
    }

    /// Build a jsonrpsee module with the `warp_*` methods.
    pub fn into_rpc_module(self) -> Result<RpcModule<Self>, RegisterMethodError> {
        let mut module = RpcModule::new(self);

        module.register_async_method("warp_getMessage", |params, ctx, _| async move {
            let id = parse_id(&params.one::<String>()?)?;
            ctx.service
                .get_message(&id)
                .await
                .map(|bytes| to_hex(&bytes))
                .map_err(warp_error)
        })?;

        module.register_async_method("warp_getMessageSignature", |params, ctx, _| async move {
            let id = parse_id(&params.one::<String>()?)?;
            let cancel = CancellationToken::new();
            let _guard = cancel.clone().drop_guard();
            ctx.service
                .get_message_signature(&cancel, &id)
                .await
                .map(|sig| to_hex(&sig))
                .map_err(warp_error)
        })?;

        module.register_async_method("warp_getBlockSignature", |params, ctx, _| async move {
            let block_id = parse_id(&params.one::<String>()?)?;
            let cancel = CancellationToken::new();
            let _guard = cancel.clone().drop_guard();
            ctx.service
                .get_block_signature(&cancel, block_id)
                .await
                .map(|sig| to_hex(&sig))
                .map_err(warp_error)
        })?;

        module.register_async_method(
            "warp_getMessageAggregateSignature",
            |params, ctx, _| async move {
                let mut seq = params.sequence();
                let id = parse_id(&seq.next::<String>()?)?;
                let quorum_num: u64 = seq.next()?;
                let chain_id = parse_chain(seq.optional_next::<String>()?)?;

                let cancel = CancellationToken::new();
                let _guard = cancel.clone().drop_guard();
                ctx.service
                    .get_message_aggregate_signature(&cancel, &id, quorum_num, chain_id)
                    .await
                    .map(|bytes| to_hex(&bytes))
                    .map_err(warp_error)
            },
        )?;

        module.register_async_method(
            "warp_getBlockAggregateSignature",
            |params, ctx, _| async move {
                let mut seq = params.sequence();
                let block_id = parse_id(&seq.next::<String>()?)?;
                let quorum_num: u64 = seq.next()?;
                let chain_id = parse_chain(seq.optional_next::<String>()?)?;

                let cancel = CancellationToken::new();
                let _guard = cancel.clone().drop_guard();
                ctx.service
                    .get_block_aggregate_signature(&cancel, block_id, quorum_num, chain_id)
                    .await
                    .map(|bytes| to_hex(&bytes))
                    .map_err(warp_error)
            },
        )?;

        Ok(module)
    }
}

fn parse_chain(value: Option<String>) -> Result<Option<ChainId>, ErrorObjectOwned> {
    value.as_deref().map(parse_id).transpose()
}
