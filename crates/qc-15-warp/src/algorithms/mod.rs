//! # Algorithms Module
//!
//! BLS primitives, quorum arithmetic and threshold aggregation.

pub mod aggregator;
pub mod bls;
pub mod quorum;

pub use aggregator::SignatureAggregator;
pub use bls::{
    aggregate_public_keys, aggregate_signatures, parse_public_key, parse_signature, verify,
    verify_bytes, LocalSigner, DST,
};
pub use quorum::{check_quorum, required_weight, sum_weights, verify_weight};
