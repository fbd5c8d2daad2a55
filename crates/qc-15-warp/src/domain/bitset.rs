//! Packed little-endian signer bitset: bit `i` lives in byte `i / 8` at
//! position `i % 8`. The encoding is minimal (no trailing zero byte).

use super::errors::ParseError;

/// Set of signer indices.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct SignerBitSet {
    bytes: Vec<u8>,
}

impl SignerBitSet {
    /// Empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `index` as a signer.
    pub fn add(&mut self, index: usize) {
        let byte = index / 8;
        if self.bytes.len() <= byte {
            self.bytes.resize(byte + 1, 0);
        }
        self.bytes[byte] |= 1 << (index % 8);
    }

    /// Is `index` set.
    pub fn contains(&self, index: usize) -> bool {
        self.bytes
            .get(index / 8)
            .map(|b| b & (1 << (index % 8)) != 0)
            .unwrap_or(false)
    }

    /// Number of set bits.
    pub fn len(&self) -> usize {
        self.bytes.iter().map(|b| b.count_ones() as usize).sum()
    }

    /// No bits set.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Highest set index plus one.
    pub fn bit_len(&self) -> usize {
        match self.bytes.last() {
            Some(last) => (self.bytes.len() - 1) * 8 + (8 - last.leading_zeros() as usize),
            None => 0,
        }
    }

    /// Set indices in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.bit_len()).filter(move |i| self.contains(*i))
    }

    /// Packed bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Parse packed bytes, rejecting a trailing zero byte.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ParseError> {
        if bytes.last() == Some(&0) {
            return Err(ParseError::NonCanonicalBitSet);
        }
        Ok(Self {
            bytes: bytes.to_vec(),
        })
    }
}
