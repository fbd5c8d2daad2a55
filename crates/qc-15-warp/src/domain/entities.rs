//! # Domain Entities
//!
//! Validator views consumed at aggregation time and aggregation outputs.

use super::errors::{BlockId, NodeId, PublicKeyBytes};
use super::message::Message;
use serde::{Deserialize, Serialize};

/// Validator as reported by the validator oracle at some height.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorOutput {
    /// Peer node id.
    pub node_id: NodeId,
    /// Compressed BLS public key; validators without one cannot sign.
    #[serde(with = "serde_opt_pk")]
    pub public_key: Option<PublicKeyBytes>,
    /// Stake weight.
    pub weight: u64,
}

/// Validator in a canonical ordering. `index` is its bit position in the
/// signer bitset. Nodes sharing one BLS key collapse into a single entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidatorEntry {
    /// Nodes holding this key, in the order the oracle reported them.
    pub node_ids: Vec<NodeId>,
    /// Compressed BLS public key.
    pub public_key: PublicKeyBytes,
    /// Combined stake weight of `node_ids`.
    pub weight: u64,
    /// Position in the canonical ordering.
    pub index: usize,
}

/// Signing validators in canonical order plus the stake of the whole set.
///
/// `total_weight` includes validators that cannot sign, so it may exceed
/// the sum of the entries' weights.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CanonicalValidatorSet {
    /// Entries ordered by bit position.
    pub validators: Vec<ValidatorEntry>,
    /// Stake of every validator, keyless ones included.
    pub total_weight: u64,
}

impl CanonicalValidatorSet {
    /// Set whose total is exactly the entries' weight. `None` on overflow.
    pub fn from_entries(validators: Vec<ValidatorEntry>) -> Option<Self> {
        let total_weight = validators
            .iter()
            .try_fold(0u64, |acc, v| acc.checked_add(v.weight))?;
        Some(Self {
            validators,
            total_weight,
        })
    }

    /// Number of signing entries.
    pub fn len(&self) -> usize {
        self.validators.len()
    }

    /// True if no validator can sign.
    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }
}

/// Block reported as accepted by the block oracle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AcceptedBlock {
    /// Block id.
    pub id: BlockId,
    /// Block height.
    pub height: u64,
}

/// Output of a successful aggregation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AggregateSignatureResult {
    /// Signed message.
    pub message: Message,
    /// Combined weight of included signers.
    pub signature_weight: u64,
    /// Total weight of the validator set.
    pub total_weight: u64,
}

mod serde_opt_pk {
    use super::PublicKeyBytes;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(pk: &Option<PublicKeyBytes>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match pk {
            Some(bytes) => serializer.serialize_some(&hex::encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<PublicKeyBytes>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let Some(s) = Option::<String>::deserialize(deserializer)? else {
            return Ok(None);
        };
        let bytes = hex::decode(s.strip_prefix("0x").unwrap_or(&s)).map_err(D::Error::custom)?;
        let pk: PublicKeyBytes = bytes
            .try_into()
            .map_err(|_| D::Error::custom("public key must be 48 bytes"))?;
        Ok(Some(pk))
    }
}
