//! # Domain Module
//!
//! Wire types, identifiers, configuration and errors for Warp messaging.

pub mod bitset;
pub mod codec;
pub mod config;
pub mod entities;
pub mod errors;
pub mod message;
pub mod offchain;
pub mod payload;

pub use bitset::SignerBitSet;
pub use codec::{ByteReader, ByteWriter, MAX_MESSAGE_SIZE};
pub use config::{ConfigError, WarpConfig};
pub use entities::*;
pub use errors::*;
pub use message::{
    keccak256, BitSetSignature, Message, SignatureRequest, SignatureResponse, UnsignedMessage,
};
pub use offchain::OffChainMessage;
pub use payload::Payload;
