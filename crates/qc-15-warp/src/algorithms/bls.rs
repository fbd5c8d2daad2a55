//! # BLS12-381 over `blst::min_pk`
//!
//! 48-byte compressed public keys, 96-byte signatures, proof-of-possession
//! ciphersuite. All parsing runs the subgroup check.

use crate::domain::{
    BitSetSignature, CanonicalValidatorSet, Message, ParseError, PublicKeyBytes, SignatureBytes,
    SignerBitSet, ValidatorEntry, WarpError,
};
use crate::algorithms::quorum::{required_weight, sum_weights};
use crate::ports::WarpSigner;
use blst::min_pk::{AggregatePublicKey, AggregateSignature, PublicKey, SecretKey, Signature};
use blst::BLST_ERROR;
use rand::RngCore;
use std::fmt;

/// Domain separation tag (proof-of-possession scheme).
pub const DST: &[u8] = b"BLS_SIG_BLS12381G2_XMD:SHA-256_SSWU_RO_POP_";

/// Parse and subgroup-check a compressed public key.
pub fn parse_public_key(bytes: &PublicKeyBytes) -> Result<PublicKey, ParseError> {
    let pk = PublicKey::from_bytes(bytes).map_err(|e| ParseError::InvalidBls(format!("{e:?}")))?;
    pk.validate()
        .map_err(|e| ParseError::InvalidBls(format!("{e:?}")))?;
    Ok(pk)
}

/// Parse and subgroup-check a compressed signature. The point at
/// infinity is rejected.
pub fn parse_signature(bytes: &[u8]) -> Result<Signature, ParseError> {
    if bytes.len() != 96 {
        return Err(ParseError::InvalidLength {
            expected: 96,
            got: bytes.len(),
        });
    }
    let sig = Signature::from_bytes(bytes).map_err(|e| ParseError::InvalidBls(format!("{e:?}")))?;
    sig.validate(true)
        .map_err(|e| ParseError::InvalidBls(format!("{e:?}")))?;
    Ok(sig)
}

/// Verify `signature` by `public_key` over `message`.
pub fn verify(public_key: &PublicKey, message: &[u8], signature: &Signature) -> bool {
    signature.verify(true, message, DST, &[], public_key, true) == BLST_ERROR::BLST_SUCCESS
}

/// Parse both sides and verify. Any parse failure counts as invalid.
pub fn verify_bytes(public_key: &PublicKeyBytes, message: &[u8], signature: &[u8]) -> bool {
    match (parse_public_key(public_key), parse_signature(signature)) {
        (Ok(pk), Ok(sig)) => verify(&pk, message, &sig),
        _ => false,
    }
}

/// Combine signatures over the same message.
pub fn aggregate_signatures(signatures: &[Signature]) -> Result<SignatureBytes, WarpError> {
    if signatures.is_empty() {
        return Err(WarpError::AggregateFailed("no signatures".into()));
    }
    let refs: Vec<&Signature> = signatures.iter().collect();
    AggregateSignature::aggregate(&refs, true)
        .map(|agg| agg.to_signature().to_bytes())
        .map_err(|e| WarpError::AggregateFailed(format!("{e:?}")))
}

/// Combine public keys so they verify an aggregate signature.
pub fn aggregate_public_keys(keys: &[PublicKey]) -> Result<PublicKey, WarpError> {
    if keys.is_empty() {
        return Err(WarpError::AggregateFailed("no public keys".into()));
    }
    let refs: Vec<&PublicKey> = keys.iter().collect();
    AggregatePublicKey::aggregate(&refs, true)
        .map(|agg| agg.to_public_key())
        .map_err(|e| WarpError::AggregateFailed(format!("{e:?}")))
}

/// Signer backed by an in-process secret key.
pub struct LocalSigner {
    secret: SecretKey,
    public: PublicKeyBytes,
}

impl LocalSigner {
    /// Fresh random key.
    pub fn generate() -> Result<Self, WarpError> {
        let mut ikm = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut ikm);
        let secret =
            SecretKey::key_gen(&ikm, &[]).map_err(|e| WarpError::Sign(format!("{e:?}")))?;
        Ok(Self::from_key(secret))
    }

    /// Load a 32-byte secret scalar.
    pub fn from_secret_bytes(bytes: &[u8; 32]) -> Result<Self, WarpError> {
        let secret = SecretKey::from_bytes(bytes).map_err(|e| WarpError::Sign(format!("{e:?}")))?;
        Ok(Self::from_key(secret))
    }

    fn from_key(secret: SecretKey) -> Self {
        let public = secret.sk_to_pk().to_bytes();
        Self { secret, public }
    }
}

impl fmt::Debug for LocalSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalSigner")
            .field("public", &hex::encode(self.public))
            .finish_non_exhaustive()
    }
}

impl WarpSigner for LocalSigner {
    fn sign(&self, bytes: &[u8]) -> Result<SignatureBytes, WarpError> {
        Ok(self.secret.sign(bytes, DST, &[]).to_bytes())
    }

    fn public_key(&self) -> PublicKeyBytes {
        self.public
    }
}

impl BitSetSignature {
    /// Public keys of the validators whose bits are set.
    pub fn signer_keys<'a>(
        &self,
        validators: &'a [ValidatorEntry],
    ) -> Result<Vec<&'a ValidatorEntry>, WarpError> {
        signers_of(&self.signers, validators)
    }
}

fn signers_of<'a>(
    signers: &SignerBitSet,
    validators: &'a [ValidatorEntry],
) -> Result<Vec<&'a ValidatorEntry>, WarpError> {
    if signers.bit_len() > validators.len() {
        return Err(WarpError::AggregateFailed(format!(
            "signer index {} out of range for {} validators",
            signers.bit_len() - 1,
            validators.len()
        )));
    }
    Ok(signers.iter().map(|i| &validators[i]).collect())
}

impl Message {
    /// Check this message against a canonical validator set. Every set bit
    /// must index a validator, the signers must hold `num / den` of
    /// `set.total_weight`, and the aggregate must verify under their
    /// combined keys.
    pub fn verify_signature(
        &self,
        set: &CanonicalValidatorSet,
        quorum_num: u64,
        quorum_den: u64,
    ) -> Result<(), WarpError> {
        let total_weight = set.total_weight;
        let required = required_weight(total_weight, quorum_num, quorum_den)?;

        let signers = self.signature().signer_keys(&set.validators)?;
        let signed_weight = sum_weights(signers.iter().map(|v| v.weight))?;
        if signed_weight > total_weight {
            return Err(WarpError::InvalidValidatorSet(format!(
                "signers weigh {signed_weight}, set total is {total_weight}"
            )));
        }
        if signed_weight < required {
            return Err(WarpError::InsufficientQuorum {
                accumulated: signed_weight,
                total_weight,
                required,
            });
        }

        let keys = signers
            .iter()
            .map(|v| parse_public_key(&v.public_key))
            .collect::<Result<Vec<_>, _>>()?;
        let aggregate_key = aggregate_public_keys(&keys)?;
        let signature = parse_signature(&self.signature().signature)?;
        if !verify(&aggregate_key, self.unsigned().bytes(), &signature) {
            return Err(WarpError::AggregateFailed(
                "aggregate signature does not verify".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::UnsignedMessage;

    fn entry(signer: &LocalSigner, index: usize, weight: u64) -> ValidatorEntry {
        ValidatorEntry {
            node_ids: vec![[index as u8; 20]],
            public_key: signer.public_key(),
            weight,
            index,
        }
    }

    #[test]
    fn test_sign_verify() {
        let signer = LocalSigner::generate().unwrap();
        let sig = signer.sign(b"warp").unwrap();
        assert!(verify_bytes(&signer.public_key(), b"warp", &sig));
        assert!(!verify_bytes(&signer.public_key(), b"other", &sig));
    }

    #[test]
    fn test_signing_is_deterministic() {
        let signer = LocalSigner::from_secret_bytes(&{
            let mut k = [0u8; 32];
            k[31] = 7;
            k
        })
        .unwrap();
        assert_eq!(signer.sign(b"m").unwrap(), signer.sign(b"m").unwrap());
    }

    #[test]
    fn test_sign_unsigned_uses_canonical_bytes() {
        let signer = LocalSigner::generate().unwrap();
        let msg = UnsignedMessage::new(1, [0x11; 32], b"payload".to_vec()).unwrap();
        assert_eq!(
            signer.sign_unsigned(&msg).unwrap(),
            signer.sign(msg.bytes()).unwrap()
        );
    }

    #[test]
    fn test_garbage_signature_rejected() {
        let signer = LocalSigner::generate().unwrap();
        assert!(!verify_bytes(&signer.public_key(), b"warp", &[0xAB; 96]));
        assert!(!verify_bytes(&signer.public_key(), b"warp", &[0u8; 95]));
    }

    #[test]
    fn test_debug_hides_secret() {
        let signer = LocalSigner::generate().unwrap();
        let rendered = format!("{signer:?}");
        assert!(rendered.contains(&hex::encode(signer.public_key())));
        assert!(rendered.contains(".."));
    }

    #[test]
    fn test_message_verify_signature() {
        let signers: Vec<_> = (0..3).map(|_| LocalSigner::generate().unwrap()).collect();
        let set = CanonicalValidatorSet::from_entries(
            signers
                .iter()
                .enumerate()
                .map(|(i, s)| entry(s, i, 100))
                .collect(),
        )
        .unwrap();
        let unsigned = UnsignedMessage::new(1, [0x11; 32], b"hello".to_vec()).unwrap();

        let sigs: Vec<_> = signers[..2]
            .iter()
            .map(|s| parse_signature(&s.sign_unsigned(&unsigned).unwrap()).unwrap())
            .collect();
        let mut bits = SignerBitSet::new();
        bits.add(0);
        bits.add(1);
        let message = Message::new(
            unsigned,
            BitSetSignature {
                signers: bits,
                signature: aggregate_signatures(&sigs).unwrap(),
            },
        );

        assert!(message.verify_signature(&set, 67, 100).is_ok());
        assert!(matches!(
            message.verify_signature(&set, 100, 100),
            Err(WarpError::InsufficientQuorum {
                accumulated: 200,
                total_weight: 300,
                required: 300
            })
        ));
    }

    #[test]
    fn test_verify_signature_rejects_wrong_bits() {
        let signers: Vec<_> = (0..2).map(|_| LocalSigner::generate().unwrap()).collect();
        let set = CanonicalValidatorSet::from_entries(
            signers
                .iter()
                .enumerate()
                .map(|(i, s)| entry(s, i, 100))
                .collect(),
        )
        .unwrap();
        let unsigned = UnsignedMessage::new(1, [0x11; 32], b"hello".to_vec()).unwrap();
        let sig = parse_signature(&signers[0].sign_unsigned(&unsigned).unwrap()).unwrap();

        // Bit 1 claims the signature came from the other validator.
        let mut bits = SignerBitSet::new();
        bits.add(1);
        let message = Message::new(
            unsigned,
            BitSetSignature {
                signers: bits,
                signature: sig.to_bytes(),
            },
        );
        assert!(matches!(
            message.verify_signature(&set, 50, 100),
            Err(WarpError::AggregateFailed(_))
        ));
    }

    #[test]
    fn test_out_of_range_bit_rejected() {
        let signer = LocalSigner::generate().unwrap();
        let set = CanonicalValidatorSet::from_entries(vec![entry(&signer, 0, 1)]).unwrap();
        let unsigned = UnsignedMessage::new(1, [0; 32], Vec::new()).unwrap();
        let mut bits = SignerBitSet::new();
        bits.add(4);
        let message = Message::new(
            unsigned,
            BitSetSignature {
                signers: bits,
                signature: [0; 96],
            },
        );
        assert!(message.verify_signature(&set, 1, 1).is_err());
    }

    #[test]
    fn test_infinity_signature_rejected() {
        let mut infinity = [0u8; 96];
        infinity[0] = 0xc0;
        assert!(matches!(
            parse_signature(&infinity),
            Err(ParseError::InvalidBls(_))
        ));
    }

    #[test]
    fn test_unsigned_stake_raises_threshold() {
        let signers: Vec<_> = (0..2).map(|_| LocalSigner::generate().unwrap()).collect();
        let unsigned = UnsignedMessage::new(1, [0x11; 32], b"hello".to_vec()).unwrap();
        let sigs: Vec<_> = signers
            .iter()
            .map(|s| parse_signature(&s.sign_unsigned(&unsigned).unwrap()).unwrap())
            .collect();
        let mut bits = SignerBitSet::new();
        bits.add(0);
        bits.add(1);
        let message = Message::new(
            unsigned,
            BitSetSignature {
                signers: bits,
                signature: aggregate_signatures(&sigs).unwrap(),
            },
        );

        // 200 of 200 signs, but a further 200 of stake has no key.
        let mut set = CanonicalValidatorSet::from_entries(
            signers
                .iter()
                .enumerate()
                .map(|(i, s)| entry(s, i, 100))
                .collect(),
        )
        .unwrap();
        assert!(message.verify_signature(&set, 67, 100).is_ok());
        set.total_weight = 400;
        assert!(matches!(
            message.verify_signature(&set, 67, 100),
            Err(WarpError::InsufficientQuorum {
                accumulated: 200,
                total_weight: 400,
                required: 268
            })
        ));
    }
}
