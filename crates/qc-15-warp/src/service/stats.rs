//! Counters for verification failures and peer signature requests.

use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe Warp counters.
#[derive(Debug, Default)]
pub struct WarpStats {
    /// Unknown messages whose payload failed to parse
    pub message_parse_failures: AtomicU64,
    /// Hash payloads for blocks that were not accepted
    pub block_validation_failures: AtomicU64,
    /// Uptime claims that could not be confirmed
    pub uptime_validation_failures: AtomicU64,
    /// Peer requests for message signatures
    pub message_signature_requests: AtomicU64,
    /// Peer requests answered from the signature cache
    pub message_signature_hits: AtomicU64,
    /// Peer requests that had to verify and sign
    pub message_signature_misses: AtomicU64,
    /// Peer requests for block signatures
    pub block_signature_requests: AtomicU64,
    /// Block requests answered from the signature cache
    pub block_signature_hits: AtomicU64,
    /// Block requests that had to consult the block oracle
    pub block_signature_misses: AtomicU64,
}

impl WarpStats {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn inc_message_parse_failures(&self) {
        self.message_parse_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_block_validation_failures(&self) {
        self.block_validation_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_uptime_validation_failures(&self) {
        self.uptime_validation_failures
            .fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_message_signature_requests(&self) {
        self.message_signature_requests
            .fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_message_signature_hit(&self) {
        self.message_signature_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_message_signature_miss(&self) {
        self.message_signature_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_block_signature_requests(&self) {
        self.block_signature_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_block_signature_hit(&self) {
        self.block_signature_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_block_signature_miss(&self) {
        self.block_signature_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Current values
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            message_parse_failures: self.message_parse_failures.load(Ordering::Relaxed),
            block_validation_failures: self.block_validation_failures.load(Ordering::Relaxed),
            uptime_validation_failures: self.uptime_validation_failures.load(Ordering::Relaxed),
            message_signature_requests: self.message_signature_requests.load(Ordering::Relaxed),
            message_signature_hits: self.message_signature_hits.load(Ordering::Relaxed),
            message_signature_misses: self.message_signature_misses.load(Ordering::Relaxed),
            block_signature_requests: self.block_signature_requests.load(Ordering::Relaxed),
            block_signature_hits: self.block_signature_hits.load(Ordering::Relaxed),
            block_signature_misses: self.block_signature_misses.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`WarpStats`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct StatsSnapshot {
    pub message_parse_failures: u64,
    pub block_validation_failures: u64,
    pub uptime_validation_failures: u64,
    pub message_signature_requests: u64,
    pub message_signature_hits: u64,
    pub message_signature_misses: u64,
    pub block_signature_requests: u64,
    pub block_signature_hits: u64,
    pub block_signature_misses: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_counters() {
        let stats = WarpStats::new();
        stats.inc_message_signature_requests();
        stats.inc_message_signature_requests();
        stats.inc_message_signature_hit();
        stats.inc_block_validation_failures();

        let snap = stats.snapshot();
        assert_eq!(snap.message_signature_requests, 2);
        assert_eq!(snap.message_signature_hits, 1);
        assert_eq!(snap.message_signature_misses, 0);
        assert_eq!(snap.block_validation_failures, 1);
    }
}
