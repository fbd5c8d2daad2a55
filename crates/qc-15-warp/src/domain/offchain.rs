//! # Off-Chain Message Schemas
//!
//! Call payloads of off-chain addressed calls are framed as
//! `codec_version (u16 BE) ‖ type_id (u32 BE) ‖ body`.

use super::codec::{ByteReader, ByteWriter};
use super::errors::{Hash, ParseError};

/// Only registered codec version.
pub const OFFCHAIN_CODEC_VERSION: u16 = 0;

/// Type id of [`OffChainMessage::ValidatorUptime`].
pub const VALIDATOR_UPTIME_TYPE_ID: u32 = 0;

/// Recognized off-chain schemas.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OffChainMessage {
    /// Claim that a validator has accumulated at least `total_uptime` seconds.
    ValidatorUptime {
        /// Validation being claimed about.
        validation_id: Hash,
        /// Claimed uptime in seconds.
        total_uptime: u64,
    },
}

impl OffChainMessage {
    /// Canonical encoding.
    pub fn encode(&self) -> Vec<u8> {
        let mut w = ByteWriter::with_capacity(46);
        w.put_u16(OFFCHAIN_CODEC_VERSION);
        match self {
            OffChainMessage::ValidatorUptime {
                validation_id,
                total_uptime,
            } => {
                w.put_u32(VALIDATOR_UPTIME_TYPE_ID);
                w.put_fixed(validation_id);
                w.put_u64(*total_uptime);
            }
        }
        w.into_bytes()
    }

    /// Parse a call payload. Unregistered versions or types yield
    /// [`ParseError::UnknownSchema`].
    pub fn parse(bytes: &[u8]) -> Result<Self, ParseError> {
        let mut r = ByteReader::new(bytes);
        let codec_version = r.get_u16()?;
        if codec_version != OFFCHAIN_CODEC_VERSION {
            return Err(ParseError::UnknownSchema {
                codec_version,
                type_id: 0,
            });
        }
        let type_id = r.get_u32()?;
        let msg = match type_id {
            VALIDATOR_UPTIME_TYPE_ID => OffChainMessage::ValidatorUptime {
                validation_id: r.get_fixed::<32>()?,
                total_uptime: r.get_u64()?,
            },
            _ => {
                return Err(ParseError::UnknownSchema {
                    codec_version,
                    type_id,
                })
            }
        };
        r.finish()?;
        Ok(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uptime_roundtrip() {
        let msg = OffChainMessage::ValidatorUptime {
            validation_id: [9u8; 32],
            total_uptime: 3600,
        };
        let bytes = msg.encode();
        assert_eq!(bytes.len(), 2 + 4 + 32 + 8);
        assert_eq!(OffChainMessage::parse(&bytes).unwrap(), msg);
    }

    #[test]
    fn test_unknown_version_is_unknown_schema() {
        assert!(matches!(
            OffChainMessage::parse(&[0xFF, 0xFF]),
            Err(ParseError::UnknownSchema {
                codec_version: 0xFFFF,
                ..
            })
        ));
    }

    #[test]
    fn test_unknown_type_is_unknown_schema() {
        let bytes = [0, 0, 0, 0, 0, 9];
        assert!(matches!(
            OffChainMessage::parse(&bytes),
            Err(ParseError::UnknownSchema { type_id: 9, .. })
        ));
    }

    #[test]
    fn test_truncated_uptime_is_parse_error() {
        let mut bytes = OffChainMessage::ValidatorUptime {
            validation_id: [1; 32],
            total_uptime: 1,
        }
        .encode();
        bytes.truncate(20);
        assert!(matches!(
            OffChainMessage::parse(&bytes),
            Err(ParseError::Truncated { .. })
        ));
    }

    #[test]
    fn test_single_byte_is_truncated() {
        assert!(matches!(
            OffChainMessage::parse(&[0x01]),
            Err(ParseError::Truncated { .. })
        ));
    }
}
