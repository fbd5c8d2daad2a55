//! Warp backend configuration with validation.

use super::errors::ChainId;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::time::Duration;
use thiserror::Error;

/// Configuration for the Warp backend and its API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct WarpConfig {
    /// Network this chain belongs to
    pub network_id: u32,
    /// This chain's id, hex encoded (optional `0x` prefix)
    pub source_chain_id: String,
    /// Signature LRU capacity (0 behaves as 1)
    pub signature_cache_size: usize,
    /// Parsed-message LRU capacity (0 behaves as 1)
    pub message_cache_size: usize,
    /// Operator-provided raw unsigned messages, hex encoded
    pub offchain_messages: Vec<String>,
    /// Quorum denominator used by the aggregate RPC methods
    pub quorum_denominator: u64,
    /// Numerator used when an RPC caller passes 0
    pub default_quorum_numerator: u64,
    /// Per-peer signature request deadline
    pub request_timeout_ms: u64,
    /// Keep primary-network validator sets instead of substituting this chain's
    pub require_primary_network_signers: bool,
}

impl Default for WarpConfig {
    fn default() -> Self {
        Self {
            network_id: 1,
            source_chain_id: hex::encode([0u8; 32]),
            signature_cache_size: 500,
            message_cache_size: 500,
            offchain_messages: Vec::new(),
            quorum_denominator: 100,
            default_quorum_numerator: 67,
            request_timeout_ms: 5_000,
            require_primary_network_signers: false,
        }
    }
}

impl WarpConfig {
    /// Parse from JSON and validate.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.quorum_denominator == 0 {
            return Err(ConfigError::InvalidQuorum(
                "quorum_denominator cannot be 0".into(),
            ));
        }

        if self.default_quorum_numerator == 0
            || self.default_quorum_numerator > self.quorum_denominator
        {
            return Err(ConfigError::InvalidQuorum(format!(
                "default_quorum_numerator {} outside (0, {}]",
                self.default_quorum_numerator, self.quorum_denominator
            )));
        }

        self.chain_id()?;
        self.decoded_offchain_messages()?;
        Ok(())
    }

    /// Decoded source chain id.
    pub fn chain_id(&self) -> Result<ChainId, ConfigError> {
        let bytes = decode_hex(&self.source_chain_id)
            .map_err(|e| ConfigError::InvalidChainId(e.to_string()))?;
        bytes.try_into().map_err(|b: Vec<u8>| {
            ConfigError::InvalidChainId(format!("expected 32 bytes, got {}", b.len()))
        })
    }

    /// Decoded off-chain messages, in configured order.
    pub fn decoded_offchain_messages(&self) -> Result<Vec<Vec<u8>>, ConfigError> {
        self.offchain_messages
            .iter()
            .enumerate()
            .map(|(index, raw)| {
                decode_hex(raw).map_err(|e| ConfigError::InvalidOffChainHex {
                    index,
                    reason: e.to_string(),
                })
            })
            .collect()
    }

    /// Signature cache capacity with the zero floor applied.
    pub fn signature_cache_capacity(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.signature_cache_size).unwrap_or(NonZeroUsize::MIN)
    }

    /// Message cache capacity with the zero floor applied.
    pub fn message_cache_capacity(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.message_cache_size).unwrap_or(NonZeroUsize::MIN)
    }

    /// Per-peer request deadline.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

fn decode_hex(s: &str) -> Result<Vec<u8>, hex::FromHexError> {
    hex::decode(s.strip_prefix("0x").unwrap_or(s))
}

/// Configuration errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Quorum fraction is unusable
    #[error("invalid quorum: {0}")]
    InvalidQuorum(String),
    /// Source chain id is not 32 bytes of hex
    #[error("invalid source chain id: {0}")]
    InvalidChainId(String),
    /// Off-chain message is not valid hex
    #[error("invalid off-chain message hex at index {index}: {reason}")]
    InvalidOffChainHex {
        /// Position in the configured list
        index: usize,
        /// Decoder failure
        reason: String,
    },
    /// General configuration error
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = WarpConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.chain_id().unwrap(), [0u8; 32]);
        assert_eq!(config.quorum_denominator, 100);
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_zero_denominator_rejected() {
        let config = WarpConfig {
            quorum_denominator: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidQuorum(_))
        ));
    }

    #[test]
    fn test_numerator_above_denominator_rejected() {
        let config = WarpConfig {
            default_quorum_numerator: 101,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_short_chain_id_rejected() {
        let config = WarpConfig {
            source_chain_id: "0x1111".into(),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidChainId(_))
        ));
    }

    #[test]
    fn test_bad_offchain_hex_rejected() {
        let config = WarpConfig {
            offchain_messages: vec!["00".into(), "zz".into()],
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidOffChainHex { index: 1, .. })
        ));
    }

    #[test]
    fn test_zero_cache_size_floored() {
        let config = WarpConfig {
            signature_cache_size: 0,
            ..Default::default()
        };
        assert_eq!(config.signature_cache_capacity().get(), 1);
    }

    #[test]
    fn test_from_json_partial() {
        let json = format!(
            r#"{{"network_id": 54321, "source_chain_id": "0x{}"}}"#,
            "11".repeat(32)
        );
        let config = WarpConfig::from_json(&json).unwrap();
        assert_eq!(config.network_id, 54321);
        assert_eq!(config.chain_id().unwrap(), [0x11; 32]);
        assert_eq!(config.signature_cache_size, 500);
    }
}
