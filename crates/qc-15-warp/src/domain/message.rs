//! # Warp Messages
//!
//! Wire layouts (all integers big-endian):
//!
//! ```text
//! UnsignedMessage   = network_id (u32) ‖ source_chain_id (32) ‖ len (u32) ‖ payload
//! BitSetSignature   = len (u32) ‖ signers ‖ signature (96)
//! Message           = UnsignedMessage ‖ BitSetSignature
//! SignatureRequest  = len (u32) ‖ UnsignedMessage
//! SignatureResponse = signature (96)
//! ```

use super::bitset::SignerBitSet;
use super::codec::{check_size, ByteReader, ByteWriter, MAX_MESSAGE_SIZE};
use super::errors::{ChainId, MessageId, ParseError, SignatureBytes};
use super::payload::Payload;
use sha3::{Digest, Keccak256};

/// Length of the fixed unsigned-message header.
pub const UNSIGNED_HEADER_LEN: usize = 4 + 32 + 4;

/// Keccak-256 of `bytes`.
pub fn keccak256(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

/// The authenticated unit. Immutable once built; canonical bytes and id
/// are computed at construction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnsignedMessage {
    network_id: u32,
    source_chain_id: ChainId,
    payload: Vec<u8>,
    bytes: Vec<u8>,
    id: MessageId,
}

impl UnsignedMessage {
    /// Build a message, failing if the encoding exceeds [`MAX_MESSAGE_SIZE`].
    pub fn new(
        network_id: u32,
        source_chain_id: ChainId,
        payload: impl Into<Vec<u8>>,
    ) -> Result<Self, ParseError> {
        let payload = payload.into();
        let bytes = encode_unsigned(network_id, &source_chain_id, &payload)?;
        let id = keccak256(&bytes);
        Ok(Self {
            network_id,
            source_chain_id,
            payload,
            bytes,
            id,
        })
    }

    /// Build a message whose payload is the encoding of `payload`.
    pub fn with_payload(
        network_id: u32,
        source_chain_id: ChainId,
        payload: &Payload,
    ) -> Result<Self, ParseError> {
        Self::new(network_id, source_chain_id, payload.encode()?)
    }

    /// Parse canonical bytes.
    pub fn parse(bytes: &[u8]) -> Result<Self, ParseError> {
        check_size(bytes.len(), MAX_MESSAGE_SIZE)?;
        let mut r = ByteReader::new(bytes);
        let msg = Self::read(&mut r)?;
        r.finish()?;
        Ok(msg)
    }

    /// Read one unsigned message from `r`, leaving the cursor after it.
    pub(crate) fn read(r: &mut ByteReader<'_>) -> Result<Self, ParseError> {
        let network_id = r.get_u32()?;
        let source_chain_id = r.get_fixed::<32>()?;
        let payload = r.get_var_bytes()?;
        Self::new(network_id, source_chain_id, payload)
    }

    /// Network id.
    pub fn network_id(&self) -> u32 {
        self.network_id
    }

    /// Source chain id.
    pub fn source_chain_id(&self) -> &ChainId {
        &self.source_chain_id
    }

    /// Raw payload bytes.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Parse the payload bytes.
    pub fn parsed_payload(&self) -> Result<Payload, ParseError> {
        Payload::parse(&self.payload)
    }

    /// Canonical encoding.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Keccak-256 of the canonical encoding.
    pub fn id(&self) -> MessageId {
        self.id
    }
}

/// Encode the unsigned-message fields in declared order.
pub fn encode_unsigned(
    network_id: u32,
    source_chain_id: &ChainId,
    payload: &[u8],
) -> Result<Vec<u8>, ParseError> {
    check_size(UNSIGNED_HEADER_LEN + payload.len(), MAX_MESSAGE_SIZE)?;
    let mut w = ByteWriter::with_capacity(UNSIGNED_HEADER_LEN + payload.len());
    w.put_u32(network_id);
    w.put_fixed(source_chain_id);
    w.put_var_bytes(payload)?;
    Ok(w.into_bytes())
}

/// Aggregate signature plus the set of validators that contributed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BitSetSignature {
    /// Indices into the canonical validator ordering.
    pub signers: SignerBitSet,
    /// BLS aggregate.
    pub signature: SignatureBytes,
}

impl BitSetSignature {
    /// Canonical encoding.
    pub fn encode(&self) -> Result<Vec<u8>, ParseError> {
        let signers = self.signers.as_bytes();
        let mut w = ByteWriter::with_capacity(4 + signers.len() + 96);
        w.put_var_bytes(signers)?;
        w.put_fixed(&self.signature);
        Ok(w.into_bytes())
    }

    /// Parse canonical bytes.
    pub fn parse(bytes: &[u8]) -> Result<Self, ParseError> {
        let mut r = ByteReader::new(bytes);
        let sig = Self::read(&mut r)?;
        r.finish()?;
        Ok(sig)
    }

    fn read(r: &mut ByteReader<'_>) -> Result<Self, ParseError> {
        let signers = SignerBitSet::from_bytes(r.get_var_bytes()?)?;
        let signature = r.get_fixed::<96>()?;
        Ok(Self { signers, signature })
    }
}

/// Unsigned message plus its aggregate signature.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    unsigned: UnsignedMessage,
    signature: BitSetSignature,
}

impl Message {
    /// Pair a message with a signature.
    pub fn new(unsigned: UnsignedMessage, signature: BitSetSignature) -> Self {
        Self {
            unsigned,
            signature,
        }
    }

    /// The signed message.
    pub fn unsigned(&self) -> &UnsignedMessage {
        &self.unsigned
    }

    /// The aggregate signature.
    pub fn signature(&self) -> &BitSetSignature {
        &self.signature
    }

    /// Same as the underlying unsigned message id.
    pub fn id(&self) -> MessageId {
        self.unsigned.id()
    }

    /// Canonical encoding.
    pub fn encode(&self) -> Result<Vec<u8>, ParseError> {
        let sig = self.signature.encode()?;
        let mut out = Vec::with_capacity(self.unsigned.bytes().len() + sig.len());
        out.extend_from_slice(self.unsigned.bytes());
        out.extend_from_slice(&sig);
        Ok(out)
    }

    /// Parse canonical bytes.
    pub fn parse(bytes: &[u8]) -> Result<Self, ParseError> {
        let mut r = ByteReader::new(bytes);
        let unsigned = UnsignedMessage::read(&mut r)?;
        let signature = BitSetSignature::read(&mut r)?;
        r.finish()?;
        Ok(Self {
            unsigned,
            signature,
        })
    }
}

/// Peer request asking for a signature over an unsigned message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignatureRequest {
    /// Message to sign.
    pub message: UnsignedMessage,
}

impl SignatureRequest {
    /// Length-delimited frame carrying the message bytes verbatim.
    pub fn encode(&self) -> Result<Vec<u8>, ParseError> {
        let bytes = self.message.bytes();
        let mut w = ByteWriter::with_capacity(4 + bytes.len());
        w.put_var_bytes(bytes)?;
        Ok(w.into_bytes())
    }

    /// Parse a request frame.
    pub fn parse(bytes: &[u8]) -> Result<Self, ParseError> {
        let mut r = ByteReader::new(bytes);
        let inner = r.get_var_bytes()?;
        r.finish()?;
        Ok(Self {
            message: UnsignedMessage::parse(inner)?,
        })
    }
}

/// Peer reply carrying a single BLS signature.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignatureResponse {
    /// Signature bytes.
    pub signature: SignatureBytes,
}

impl SignatureResponse {
    /// Raw 96 bytes.
    pub fn encode(&self) -> Vec<u8> {
        self.signature.to_vec()
    }

    /// Parse exactly 96 bytes.
    pub fn parse(bytes: &[u8]) -> Result<Self, ParseError> {
        let signature: SignatureBytes =
            bytes.try_into().map_err(|_| ParseError::InvalidLength {
                expected: 96,
                got: bytes.len(),
            })?;
        Ok(Self { signature })
    }
}
