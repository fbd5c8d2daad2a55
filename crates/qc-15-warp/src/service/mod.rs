//! # Warp Services
//!
//! The backend behind local and peer signing, the verifier it consults for
//! unknown messages, the API that drives aggregation, and shared counters.

pub mod api;
pub mod backend;
pub mod stats;
pub mod verifier;

pub use api::{canonical_validator_set, WarpApiService};
pub use backend::{WarpBackend, WarpBackendDependencies};
pub use stats::{StatsSnapshot, WarpStats};
pub use verifier::MessageVerifier;
