//! Test utilities for Warp.
//!
//! Deterministic oracles, counting and failing signers, scripted peers and
//! a harness that wires a [`WarpBackend`] over in-memory collaborators.
//! Helpers panic on setup failure.
//!
//! # Example
//!
//! ```rust
//! use qc_15_warp::test_utils::{test_config, TestHarness};
//!
//! let harness = TestHarness::new(&test_config());
//! assert_eq!(harness.signer.sign_count(), 0);
//! ```

use crate::adapters::{InMemoryKVStore, SignatureRequestHandler};
use crate::algorithms::LocalSigner;
use crate::domain::{
    AcceptedBlock, BlockId, CanonicalValidatorSet, ChainId, Hash, KVStoreError, NodeId, OracleError, PublicKeyBytes,
    SignatureBytes, TransportError, UnsignedMessage, ValidatorEntry, ValidatorOutput, WarpConfig,
    WarpError,
};
use crate::ports::{
    BlockOracle, KeyValueStore, RequestClient, SignatureGetter, UptimeOracle, ValidatorOracle,
    WarpSigner,
};
use crate::service::{WarpBackend, WarpBackendDependencies};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Network id used by [`test_config`].
pub const TEST_NETWORK_ID: u32 = 54321;

/// Source chain id used by [`test_config`].
pub const TEST_CHAIN_ID: ChainId = [0x11; 32];

/// Configuration for [`TEST_NETWORK_ID`] / [`TEST_CHAIN_ID`], otherwise
/// default.
pub fn test_config() -> WarpConfig {
    WarpConfig {
        network_id: TEST_NETWORK_ID,
        source_chain_id: hex::encode(TEST_CHAIN_ID),
        ..WarpConfig::default()
    }
}

/// Block oracle over an explicit accepted set.
#[derive(Default)]
pub struct MemoryBlockOracle {
    accepted: RwLock<HashMap<BlockId, u64>>,
    calls: AtomicU64,
}

impl MemoryBlockOracle {
    /// Oracle with no accepted blocks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `block_id` accepted at `height`.
    pub fn accept(&self, block_id: BlockId, height: u64) {
        self.accepted.write().insert(block_id, height);
    }

    /// Number of lookups served.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl BlockOracle for MemoryBlockOracle {
    async fn get_accepted_block(&self, block_id: BlockId) -> Result<AcceptedBlock, OracleError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.accepted
            .read()
            .get(&block_id)
            .map(|&height| AcceptedBlock {
                id: block_id,
                height,
            })
            .ok_or(OracleError::NotFound)
    }
}

/// Uptime oracle over a fixed table.
#[derive(Default)]
pub struct StaticUptimeOracle {
    uptimes: RwLock<HashMap<Hash, u64>>,
}

impl StaticUptimeOracle {
    /// Builder form of [`StaticUptimeOracle::set`].
    pub fn with(self, validation_id: Hash, seconds: u64) -> Self {
        self.set(validation_id, seconds);
        self
    }

    /// Record `seconds` of uptime for `validation_id`.
    pub fn set(&self, validation_id: Hash, seconds: u64) {
        self.uptimes.write().insert(validation_id, seconds);
    }
}

impl UptimeOracle for StaticUptimeOracle {
    fn current_uptime_seconds(&self, validation_id: &Hash) -> Result<u64, OracleError> {
        self.uptimes
            .read()
            .get(validation_id)
            .copied()
            .ok_or(OracleError::NotFound)
    }
}

/// Validator oracle with fixed sets per chain. Unknown chains have no
/// validators.
pub struct StaticValidatorOracle {
    height: u64,
    sets: HashMap<ChainId, Vec<ValidatorOutput>>,
}

impl StaticValidatorOracle {
    /// Oracle reporting `height` as current.
    pub fn new(height: u64) -> Self {
        Self {
            height,
            sets: HashMap::new(),
        }
    }

    /// Register the validator set of `chain_id`.
    pub fn with_set(mut self, chain_id: ChainId, outputs: Vec<ValidatorOutput>) -> Self {
        self.sets.insert(chain_id, outputs);
        self
    }
}

#[async_trait]
impl ValidatorOracle for StaticValidatorOracle {
    async fn current_height(&self) -> Result<u64, OracleError> {
        Ok(self.height)
    }

    async fn validator_set(
        &self,
        _height: u64,
        chain_id: ChainId,
    ) -> Result<Vec<ValidatorOutput>, OracleError> {
        Ok(self.sets.get(&chain_id).cloned().unwrap_or_default())
    }
}

/// Signer that counts how often it is used.
pub struct CountingSigner {
    inner: Box<dyn WarpSigner>,
    count: AtomicUsize,
}

impl CountingSigner {
    /// Wrap a fresh random key.
    ///
    /// # Panics
    ///
    /// If key generation fails.
    pub fn new() -> Self {
        Self::wrap(LocalSigner::generate().expect("BLS key generation"))
    }

    /// Wrap an existing signer.
    pub fn wrap(inner: impl WarpSigner + 'static) -> Self {
        Self {
            inner: Box::new(inner),
            count: AtomicUsize::new(0),
        }
    }

    /// Signing attempts so far, failed ones included.
    pub fn sign_count(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }
}

impl Default for CountingSigner {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CountingSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CountingSigner")
            .field("public_key", &hex::encode(self.inner.public_key()))
            .field("count", &self.sign_count())
            .finish()
    }
}

impl WarpSigner for CountingSigner {
    fn sign(&self, bytes: &[u8]) -> Result<SignatureBytes, WarpError> {
        self.count.fetch_add(1, Ordering::Relaxed);
        self.inner.sign(bytes)
    }

    fn public_key(&self) -> PublicKeyBytes {
        self.inner.public_key()
    }
}

/// Signer with a real public key whose signing always fails.
#[derive(Debug)]
pub struct FailingSigner {
    public_key: PublicKeyBytes,
}

impl FailingSigner {
    /// Failing signer over a fresh key.
    ///
    /// # Panics
    ///
    /// If key generation fails.
    pub fn new() -> Self {
        Self {
            public_key: LocalSigner::generate()
                .expect("BLS key generation")
                .public_key(),
        }
    }
}

impl Default for FailingSigner {
    fn default() -> Self {
        Self::new()
    }
}

impl WarpSigner for FailingSigner {
    fn sign(&self, _bytes: &[u8]) -> Result<SignatureBytes, WarpError> {
        Err(WarpError::Sign("key unavailable".into()))
    }

    fn public_key(&self) -> PublicKeyBytes {
        self.public_key
    }
}

/// Store whose writes always fail.
pub struct FailingStore;

impl KeyValueStore for FailingStore {
    fn get(&self, _key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError> {
        Ok(None)
    }

    fn put(&self, _key: &[u8], _value: &[u8]) -> Result<(), KVStoreError> {
        Err(KVStoreError::Io("disk full".into()))
    }

    fn delete(&self, _key: &[u8]) -> Result<(), KVStoreError> {
        Ok(())
    }

    fn iter_prefix(&self, _prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, KVStoreError> {
        Ok(Vec::new())
    }
}

/// How a scripted peer answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerBehavior {
    /// Correct signature.
    Valid,
    /// Application error.
    Error,
    /// Well-formed signature over different bytes.
    InvalidSignature,
    /// Correct signature after a delay.
    Delay(Duration),
    /// Never answers until cancelled.
    Hang,
}

/// Signature getter answering per node from in-process keys.
#[derive(Default)]
pub struct ScriptedSignatureGetter {
    signers: HashMap<NodeId, Arc<LocalSigner>>,
    behaviors: HashMap<NodeId, PeerBehavior>,
}

impl ScriptedSignatureGetter {
    /// Every node of every validator answers with a valid signature.
    /// `signers[i]` must hold the key of `validators[i]`.
    pub fn all_valid(signers: &[Arc<LocalSigner>], validators: &[ValidatorEntry]) -> Self {
        let signers = validators
            .iter()
            .zip(signers)
            .flat_map(|(v, s)| v.node_ids.iter().map(move |&id| (id, Arc::clone(s))))
            .collect();
        Self {
            signers,
            behaviors: HashMap::new(),
        }
    }

    /// Override one node's behavior.
    pub fn with(mut self, node_id: NodeId, behavior: PeerBehavior) -> Self {
        self.behaviors.insert(node_id, behavior);
        self
    }

    /// Answer for `node_id` with `signer`'s key.
    pub fn with_signer(mut self, node_id: NodeId, signer: Arc<LocalSigner>) -> Self {
        self.signers.insert(node_id, signer);
        self
    }

    fn sign(&self, node_id: NodeId, bytes: &[u8]) -> Result<SignatureBytes, WarpError> {
        let signer = self
            .signers
            .get(&node_id)
            .ok_or_else(|| TransportError::Failed(format!("unknown peer {}", hex::encode(node_id))))?;
        signer.sign(bytes)
    }
}

#[async_trait]
impl SignatureGetter for ScriptedSignatureGetter {
    async fn get_signature(
        &self,
        ctx: &CancellationToken,
        node_id: NodeId,
        message: &UnsignedMessage,
    ) -> Result<SignatureBytes, WarpError> {
        let behavior = self
            .behaviors
            .get(&node_id)
            .copied()
            .unwrap_or(PeerBehavior::Valid);
        match behavior {
            PeerBehavior::Valid => self.sign(node_id, message.bytes()),
            PeerBehavior::Error => Err(TransportError::App {
                code: crate::domain::VERIFY_ERR_CODE,
                message: "refused".into(),
            }
            .into()),
            PeerBehavior::InvalidSignature => self.sign(node_id, b"some other message"),
            PeerBehavior::Delay(delay) => {
                tokio::select! {
                    _ = ctx.cancelled() => Err(WarpError::Cancelled),
                    _ = tokio::time::sleep(delay) => self.sign(node_id, message.bytes()),
                }
            }
            PeerBehavior::Hang => {
                ctx.cancelled().await;
                Err(WarpError::Cancelled)
            }
        }
    }
}

/// Fresh keys and a set for the given weights. Entry `i` has index `i`,
/// the single node id `[i + 1; 20]` and is signed by `signers[i]`. The
/// total saturates so overflowing weights surface in the code under test.
///
/// # Panics
///
/// If key generation fails.
pub fn make_validators(weights: &[u64]) -> (Vec<Arc<LocalSigner>>, CanonicalValidatorSet) {
    let (signers, validators): (Vec<_>, Vec<_>) = weights
        .iter()
        .enumerate()
        .map(|(index, &weight)| {
            let signer = Arc::new(LocalSigner::generate().expect("BLS key generation"));
            let entry = ValidatorEntry {
                node_ids: vec![[index as u8 + 1; 20]],
                public_key: signer.public_key(),
                weight,
                index,
            };
            (signer, entry)
        })
        .unzip();
    let total_weight = weights.iter().fold(0u64, |acc, w| acc.saturating_add(*w));
    (
        signers,
        CanonicalValidatorSet {
            validators,
            total_weight,
        },
    )
}

/// Request client delivering frames to in-process handlers.
#[derive(Default)]
pub struct LoopbackRequestClient {
    handlers: RwLock<HashMap<NodeId, Arc<SignatureRequestHandler>>>,
}

impl LoopbackRequestClient {
    /// Empty routing table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Route requests for `node_id` to `handler`.
    pub fn register(&self, node_id: NodeId, handler: Arc<SignatureRequestHandler>) {
        self.handlers.write().insert(node_id, handler);
    }
}

#[async_trait]
impl RequestClient for LoopbackRequestClient {
    async fn send_request(
        &self,
        node_id: NodeId,
        request: Vec<u8>,
    ) -> Result<Vec<u8>, TransportError> {
        let handler = self
            .handlers
            .read()
            .get(&node_id)
            .cloned()
            .ok_or_else(|| TransportError::Failed(format!("no route to {}", hex::encode(node_id))))?;
        handler
            .handle(&CancellationToken::new(), node_id, &request)
            .await
            .map_err(|e| TransportError::App {
                code: e.code,
                message: e.message,
            })
    }
}

/// A backend wired to in-memory collaborators.
pub struct TestHarness {
    /// Backend under test.
    pub backend: Arc<WarpBackend>,
    /// Signer the backend uses.
    pub signer: Arc<CountingSigner>,
    /// Block oracle the backend consults.
    pub blocks: Arc<MemoryBlockOracle>,
    /// Uptime oracle the backend consults.
    pub uptimes: Arc<StaticUptimeOracle>,
    /// Store the backend writes to, unless replaced via `with_store`.
    pub store: Arc<InMemoryKVStore>,
}

impl TestHarness {
    /// Harness over `config`.
    ///
    /// # Panics
    ///
    /// If the backend rejects `config`.
    pub fn new(config: &WarpConfig) -> Self {
        Self::try_new(config).expect("backend construction")
    }

    /// Harness over `config`, surfacing construction errors.
    pub fn try_new(config: &WarpConfig) -> Result<Self, WarpError> {
        let store = Arc::new(InMemoryKVStore::new());
        Self::build(
            config,
            CountingSigner::new(),
            Arc::clone(&store) as Arc<dyn KeyValueStore>,
            store,
        )
    }

    /// Harness whose backend signs through `signer`.
    ///
    /// # Panics
    ///
    /// If the backend rejects `config`.
    pub fn with_signer(config: &WarpConfig, signer: impl WarpSigner + 'static) -> Self {
        let store = Arc::new(InMemoryKVStore::new());
        Self::build(
            config,
            CountingSigner::wrap(signer),
            Arc::clone(&store) as Arc<dyn KeyValueStore>,
            store,
        )
        .expect("backend construction")
    }

    /// Harness whose backend writes to `store`.
    ///
    /// # Panics
    ///
    /// If the backend rejects `config`.
    pub fn with_store(config: &WarpConfig, store: Arc<dyn KeyValueStore>) -> Self {
        Self::build(
            config,
            CountingSigner::new(),
            store,
            Arc::new(InMemoryKVStore::new()),
        )
        .expect("backend construction")
    }

    fn build(
        config: &WarpConfig,
        signer: CountingSigner,
        backend_store: Arc<dyn KeyValueStore>,
        store: Arc<InMemoryKVStore>,
    ) -> Result<Self, WarpError> {
        let signer = Arc::new(signer);
        let blocks = Arc::new(MemoryBlockOracle::new());
        let uptimes = Arc::new(StaticUptimeOracle::default());
        let backend = WarpBackend::new(
            config,
            WarpBackendDependencies {
                signer: Arc::clone(&signer) as Arc<dyn WarpSigner>,
                store: backend_store,
                block_oracle: Arc::clone(&blocks) as Arc<dyn BlockOracle>,
                uptime_oracle: Arc::clone(&uptimes) as Arc<dyn UptimeOracle>,
            },
        )?;
        Ok(Self {
            backend: Arc::new(backend),
            signer,
            blocks,
            uptimes,
            store,
        })
    }

    /// Validator entry describing this harness's key.
    pub fn validator_output(&self, node_id: NodeId, weight: u64) -> ValidatorOutput {
        ValidatorOutput {
            node_id,
            public_key: Some(self.signer.public_key()),
            weight,
        }
    }
}
