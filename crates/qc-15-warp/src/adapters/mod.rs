//! # Adapters Layer (Hexagonal Architecture)
//!
//! Concrete implementations at the edges: storage, peer signature
//! exchange, the validator-set view, and the JSON-RPC surface.

mod handler;
mod memory_store;
mod rpc;
mod signature_getter;
mod validator_state;

pub use handler::{AppError, SignatureRequestHandler};
pub use memory_store::InMemoryKVStore;
pub use rpc::WarpRpc;
pub use signature_getter::{LocalSignatureGetter, NetworkSignatureGetter};
pub use validator_state::{ValidatorStateView, PRIMARY_NETWORK_ID};
