//! # Payload Variants
//!
//! The `payload` bytes of an unsigned message parse into exactly one of two
//! variants, selected by a leading discriminant byte.

use super::codec::{ByteReader, ByteWriter};
use super::errors::{BlockId, Hash, ParseError};

/// Discriminant for [`Payload::AddressedCall`].
pub const ADDRESSED_CALL_TAG: u8 = 0x00;

/// Discriminant for [`Payload::Hash`].
pub const HASH_TAG: u8 = 0x01;

/// Parsed Warp payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Payload {
    /// Application message issued by a contract. An empty `source_address`
    /// marks an operator-provided off-chain message.
    AddressedCall {
        /// Issuing contract address.
        source_address: Vec<u8>,
        /// Application bytes.
        call_payload: Vec<u8>,
    },
    /// Claim that `hash` identifies an accepted block on the source chain.
    Hash {
        /// Block id.
        hash: Hash,
    },
}

impl Payload {
    /// Build an addressed call payload.
    pub fn addressed_call(source_address: impl Into<Vec<u8>>, call_payload: impl Into<Vec<u8>>) -> Self {
        Payload::AddressedCall {
            source_address: source_address.into(),
            call_payload: call_payload.into(),
        }
    }

    /// Build a block hash payload.
    pub fn block_hash(block_id: BlockId) -> Self {
        Payload::Hash { hash: block_id }
    }

    /// Canonical encoding.
    pub fn encode(&self) -> Result<Vec<u8>, ParseError> {
        match self {
            Payload::AddressedCall {
                source_address,
                call_payload,
            } => {
                let mut w = ByteWriter::with_capacity(9 + source_address.len() + call_payload.len());
                w.put_u8(ADDRESSED_CALL_TAG);
                w.put_var_bytes(source_address)?;
                w.put_var_bytes(call_payload)?;
                Ok(w.into_bytes())
            }
            Payload::Hash { hash } => {
                let mut w = ByteWriter::with_capacity(33);
                w.put_u8(HASH_TAG);
                w.put_fixed(hash);
                Ok(w.into_bytes())
            }
        }
    }

    /// Parse canonical bytes.
    pub fn parse(bytes: &[u8]) -> Result<Self, ParseError> {
        let mut r = ByteReader::new(bytes);
        let payload = match r.get_u8()? {
            ADDRESSED_CALL_TAG => {
                let source_address = r.get_var_bytes()?.to_vec();
                let call_payload = r.get_var_bytes()?.to_vec();
                Payload::AddressedCall {
                    source_address,
                    call_payload,
                }
            }
            HASH_TAG => Payload::Hash {
                hash: r.get_fixed::<32>()?,
            },
            other => return Err(ParseError::UnknownDiscriminant(other)),
        };
        r.finish()?;
        Ok(payload)
    }

    /// Variant name for logs and errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::AddressedCall { .. } => "AddressedCall",
            Payload::Hash { .. } => "Hash",
        }
    }
}
