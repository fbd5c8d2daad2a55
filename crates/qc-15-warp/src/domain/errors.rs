//! # Domain Errors
//!
//! Error types for Warp message acceptance, signing and aggregation.
//!
//! Every public operation surfaces a [`WarpError`]. Policy refusals carry a
//! [`VerifyError`] sub-kind so callers can tell "won't sign" apart from
//! "can't parse".

use super::config::ConfigError;
use thiserror::Error;

/// Hash type (32-byte Keccak-256).
pub type Hash = [u8; 32];

/// Warp message identifier.
pub type MessageId = Hash;

/// Chain identifier.
pub type ChainId = Hash;

/// Block identifier.
pub type BlockId = Hash;

/// Peer node identifier (20 bytes).
pub type NodeId = [u8; 20];

/// Compressed BLS public key (G1, 48 bytes).
pub type PublicKeyBytes = [u8; 48];

/// BLS signature (G2, 96 bytes).
pub type SignatureBytes = [u8; 96];

/// Peer application error code: request bytes could not be parsed.
pub const PARSE_ERR_CODE: i32 = 1;

/// Peer application error code: message was parsed but will not be signed.
pub const VERIFY_ERR_CODE: i32 = 2;

/// Peer application error code: any other failure on the serving side.
pub const INTERNAL_ERR_CODE: i32 = 3;

/// Wire-format errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    /// Input ended before a field was complete.
    #[error("Truncated input: needed {needed} bytes, {remaining} remaining")]
    Truncated {
        /// Bytes required by the field.
        needed: usize,
        /// Bytes left in the input.
        remaining: usize,
    },

    /// Bytes left over after the last field.
    #[error("Trailing bytes: {0}")]
    TrailingBytes(usize),

    /// Unknown payload discriminant.
    #[error("Unknown payload discriminant: {0:#04x}")]
    UnknownDiscriminant(u8),

    /// Encoded size exceeds the message cap.
    #[error("Message too large: {size} > {max}")]
    Oversize {
        /// Encoded size.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// Fixed-size field has the wrong length.
    #[error("Invalid length: expected {expected}, got {got}")]
    InvalidLength {
        /// Expected byte length.
        expected: usize,
        /// Actual byte length.
        got: usize,
    },

    /// Signer bitset has a trailing zero byte.
    #[error("Non-canonical signer bitset")]
    NonCanonicalBitSet,

    /// Off-chain payload uses an unregistered codec version or type.
    #[error("Unknown off-chain schema: codec version {codec_version}, type {type_id}")]
    UnknownSchema {
        /// Codec version prefix.
        codec_version: u16,
        /// Type identifier.
        type_id: u32,
    },

    /// Bytes are not a valid BLS point.
    #[error("Invalid BLS encoding: {0}")]
    InvalidBls(String),
}

/// Reasons the verifier refuses to sign a message.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VerifyError {
    /// Block oracle did not report the block as accepted.
    #[error("Block {block_id} not accepted: {reason}")]
    BlockNotAccepted {
        /// Hex-encoded block id.
        block_id: String,
        /// Oracle failure.
        reason: String,
    },

    /// Off-chain addressed call carried a source address.
    #[error("Source address must be empty for off-chain addressed calls")]
    BadSourceAddress,

    /// Unrecognized payload or off-chain schema.
    #[error("Unknown payload type: {0}")]
    UnknownPayloadType(String),

    /// Claimed uptime exceeds what the oracle observed.
    #[error("Uptime below claim: claimed {claimed}s, observed {observed}s")]
    UptimeBelowClaim {
        /// Claimed uptime in seconds.
        claimed: u64,
        /// Observed uptime in seconds.
        observed: u64,
    },

    /// Uptime oracle could not report on the validator.
    #[error("Uptime unavailable: {0}")]
    UptimeUnavailable(String),
}

/// Key-value store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KVStoreError {
    /// Backend I/O failure.
    #[error("Store I/O error: {0}")]
    Io(String),

    /// Store has been closed.
    #[error("Store closed")]
    Closed,
}

/// Errors from external oracles.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OracleError {
    /// Requested item is not known.
    #[error("Not found")]
    NotFound,

    /// Oracle is unreachable or failed.
    #[error("Oracle unavailable: {0}")]
    Unavailable(String),
}

/// Errors from the peer request/response transport.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// Request was not answered in time.
    #[error("Request timeout")]
    Timeout,

    /// Request was cancelled by the caller.
    #[error("Request cancelled")]
    Cancelled,

    /// Peer answered with an application error.
    #[error("Application error {code}: {message}")]
    App {
        /// Application error code.
        code: i32,
        /// Error message.
        message: String,
    },

    /// Connection-level failure.
    #[error("Transport failure: {0}")]
    Failed(String),
}

/// Warp error kinds surfaced by every public operation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WarpError {
    /// Malformed wire bytes.
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Message network id differs from this chain's.
    #[error("Wrong network: expected {expected}, got {got}")]
    WrongNetwork {
        /// Configured network id.
        expected: u32,
        /// Network id in the message.
        got: u32,
    },

    /// Message source chain differs from this chain.
    #[error("Wrong source chain: expected {expected}, got {got}")]
    WrongSourceChain {
        /// Configured chain id (hex).
        expected: String,
        /// Chain id in the message (hex).
        got: String,
    },

    /// Message not present.
    #[error("Message not found: {0}")]
    NotFound(String),

    /// Verifier refused the message.
    #[error("Verification failed: {0}")]
    Verify(#[from] VerifyError),

    /// BLS signing failed.
    #[error("Signing failed: {0}")]
    Sign(String),

    /// Key-value store failure.
    #[error("Store error: {0}")]
    Store(#[from] KVStoreError),

    /// Off-chain message rejected during backend construction.
    #[error("Invalid off-chain message at index {index}: {reason}")]
    OffChainMessage {
        /// Position in the configured list.
        index: usize,
        /// Underlying failure.
        reason: String,
    },

    /// Validator oracle failure while preparing aggregation.
    #[error("Validator oracle error: {0}")]
    ValidatorOracle(String),

    /// Validator set is empty.
    #[error("No validators")]
    NoValidators,

    /// Quorum fraction is not in (0, 1].
    #[error("Invalid quorum: {num}/{den}")]
    InvalidQuorum {
        /// Numerator.
        num: u64,
        /// Denominator.
        den: u64,
    },

    /// Collected weight is below the quorum.
    #[error("Insufficient quorum: accumulated {accumulated}/{total_weight}, required {required}")]
    InsufficientQuorum {
        /// Weight of verified signers.
        accumulated: u64,
        /// Total validator weight.
        total_weight: u64,
        /// Required weight.
        required: u64,
    },

    /// Weight sum overflowed u64.
    #[error("Weight overflow")]
    WeightOverflow,

    /// BLS aggregation failed.
    #[error("Aggregation failed: {0}")]
    AggregateFailed(String),

    /// Validator set handed to the aggregator is inconsistent.
    #[error("Invalid validator set: {0}")]
    InvalidValidatorSet(String),

    /// Invalid backend configuration.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Peer transport failure.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Context cancelled.
    #[error("Cancelled")]
    Cancelled,
}

impl WarpError {
    /// Stable JSON-RPC error code for this kind.
    pub fn code(&self) -> i32 {
        match self {
            WarpError::Parse(_) => -32700,
            WarpError::WrongNetwork { .. } | WarpError::WrongSourceChain { .. } => -32602,
            WarpError::InvalidQuorum { .. } => -32602,
            WarpError::NotFound(_) => -32001,
            WarpError::Verify(VerifyError::BlockNotAccepted { .. }) => -32010,
            WarpError::Verify(VerifyError::BadSourceAddress) => -32011,
            WarpError::Verify(VerifyError::UnknownPayloadType(_)) => -32012,
            WarpError::Verify(VerifyError::UptimeBelowClaim { .. }) => -32013,
            WarpError::Verify(VerifyError::UptimeUnavailable(_)) => -32014,
            WarpError::Sign(_) => -32020,
            WarpError::Store(_) => -32021,
            WarpError::OffChainMessage { .. } => -32022,
            WarpError::ValidatorOracle(_) => -32023,
            WarpError::NoValidators => -32030,
            WarpError::InsufficientQuorum { .. } => -32031,
            WarpError::WeightOverflow => -32032,
            WarpError::AggregateFailed(_) => -32033,
            WarpError::InvalidValidatorSet(_) => -32034,
            WarpError::Cancelled => -32040,
            WarpError::Transport(_) => -32041,
            WarpError::Config(_) => -32603,
        }
    }

    /// Application error code reported to peers.
    pub fn app_error_code(&self) -> i32 {
        match self {
            WarpError::Parse(_) => PARSE_ERR_CODE,
            WarpError::Verify(_)
            | WarpError::WrongNetwork { .. }
            | WarpError::WrongSourceChain { .. } => VERIFY_ERR_CODE,
            _ => INTERNAL_ERR_CODE,
        }
    }
}
