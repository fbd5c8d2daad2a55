//! # QC-15 Warp Cross-Chain Messaging
//!
//! BLS-signed messages between chains, verified against the source chain's
//! validator set.
//!
//! **Subsystem ID:** 15
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Purpose
//!
//! - Persist messages emitted by accepted blocks and sign them on request
//! - Refuse to sign anything not proven accepted (blocks, uptime claims)
//! - Collect a weighted threshold of validator signatures into one
//!   aggregate BLS signature
//!
//! ## Security Properties
//!
//! | Property | Enforcement |
//! |----------|-------------|
//! | Accept before sign | `MessageVerifier` consults oracles for unknown messages |
//! | Origin binding | network and source chain checked on every write |
//! | Verified aggregation | each peer signature checked before it counts |
//! | Checked weights | all weight sums overflow-checked, quorum in u128 |
//!
//! ## Module Structure
//!
//! ```text
//! qc-15-warp/
//! ├── domain/          # wire types, payloads, config, errors
//! ├── algorithms/      # BLS, quorum arithmetic, signature aggregator
//! ├── ports/           # WarpBackendApi, oracles, store, transport
//! ├── service/         # WarpBackend, MessageVerifier, WarpApiService
//! └── adapters/        # in-memory store, peer handler, getters, JSON-RPC
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod algorithms;
pub mod domain;
pub mod ports;
pub mod service;

/// Deterministic collaborators for unit and integration tests.
pub mod test_utils;

// Re-exports
pub use adapters::{
    AppError, InMemoryKVStore, LocalSignatureGetter, NetworkSignatureGetter,
    SignatureRequestHandler, ValidatorStateView, WarpRpc, PRIMARY_NETWORK_ID,
};
pub use algorithms::{LocalSigner, SignatureAggregator};
pub use domain::{
    AggregateSignatureResult, BitSetSignature, CanonicalValidatorSet, ChainId, ConfigError, Message, MessageId,
    OffChainMessage, Payload, SignatureRequest, SignatureResponse, SignerBitSet, UnsignedMessage,
    ValidatorEntry, ValidatorOutput, VerifyError, WarpConfig, WarpError,
};
pub use ports::{
    BlockOracle, KeyValueStore, RequestClient, SignatureGetter, UptimeOracle, ValidatorOracle,
    WarpBackendApi, WarpSigner,
};
pub use service::{
    canonical_validator_set, MessageVerifier, StatsSnapshot, WarpApiService, WarpBackend,
    WarpBackendDependencies, WarpStats,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
