//! The interfaces this crate consumes from the rest of the node.
//!
//! Everything the RPC core needs from fork choice, storage, the execution
//! engine, the builder and gossip arrives through these traits; the chain
//! never calls back into the RPC layer. Long-haul operations (builder and
//! engine round trips) are async via boxed futures, everything else is a
//! synchronous in-process call.

use futures::future::BoxFuture;
use std::fmt;
use std::sync::Arc;
use types::{
    Attestation, AttesterSlashing, BeaconBlock, BeaconState, BlindedBeaconBlock, BlobSidecar,
    BlobsBundle,
    DepositData, Epoch, EthSpec, ExecutionBlockHash, ExecutionPayload, ExecutionRequests,
    Hash256, PayloadAttestationMessage, ProposerSlashing, PublicKeyBytes, SignedAggregateAndProof,
    SignedBeaconBlock, SignedBlindedBeaconBlock, SignedBlsToExecutionChange,
    SignedBuilderBid, SignedContributionAndProof, SignedExecutionPayloadBid,
    SignedExecutionPayloadEnvelope, SignedVoluntaryExit, Slot, SubnetId,
    SyncCommitteeContribution, SyncCommitteeMessage, SyncSubnetId, Uint256,
};

/// Failure of a chain-side collaborator.
#[derive(Debug, Clone, PartialEq)]
pub enum ChainError {
    HeadUnavailable,
    StateUnavailable,
    Other(String),
}

impl fmt::Display for ChainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainError::HeadUnavailable => write!(f, "head unavailable"),
            ChainError::StateUnavailable => write!(f, "state unavailable"),
            ChainError::Other(message) => write!(f, "{message}"),
        }
    }
}

impl std::error::Error for ChainError {}

/// Read access to the canonical head.
pub trait HeadFetcher<E: EthSpec>: Send + Sync {
    fn head_root(&self) -> Result<Hash256, ChainError>;

    /// A cloned snapshot of the head state, free to mutate.
    fn head_state(&self) -> Result<BeaconState<E>, ChainError>;

    /// A shared read-only handle to the head state.
    fn head_state_read_only(&self) -> Result<Arc<BeaconState<E>>, ChainError>;

    /// Indices of validators active at `epoch` on the head state.
    fn head_validators_indices(&self, epoch: Epoch) -> Result<Vec<usize>, ChainError> {
        Ok(self
            .head_state_read_only()?
            .get_active_validator_indices(epoch))
    }

    fn head_genesis_validators_root(&self) -> Result<Hash256, ChainError> {
        Ok(self.head_state_read_only()?.genesis_validators_root)
    }

    fn head_pubkey_to_index(&self, pubkey: &PublicKeyBytes) -> Result<Option<usize>, ChainError> {
        Ok(self.head_state_read_only()?.get_validator_index(pubkey))
    }
}

/// Fork-choice facts used by the readiness gate, the circuit breaker and
/// sync-message block roots.
pub trait ForkchoiceFetcher: Send + Sync {
    /// The highest slot for which a block has been received.
    fn highest_received_block_slot(&self) -> Slot;

    /// How many of the last epoch's slots carried a received block.
    fn received_blocks_last_epoch(&self) -> Result<u64, ChainError>;

    /// The highest received block's slot and root.
    fn highest_received_block_slot_root(&self) -> (Slot, Hash256);
}

pub trait OptimisticModeFetcher: Send + Sync {
    /// Whether the head rests on execution payloads the engine has not yet
    /// validated.
    fn is_optimistic(&self) -> Result<bool, ChainError>;
}

pub trait SyncChecker: Send + Sync {
    fn is_syncing(&self) -> bool;
}

/// Access to historical states and the empty-slot replayer.
pub trait StateGen<E: EthSpec>: Send + Sync {
    fn state_by_root(&self, root: Hash256) -> Result<Option<BeaconState<E>>, ChainError>;

    fn state_by_slot(&self, slot: Slot) -> Result<BeaconState<E>, ChainError>;

    /// Advance `state` to `slot` by empty-slot processing. Implementations
    /// keep a next-slot cache so repeated advancement over the same range
    /// amortizes.
    fn replay_to_slot(
        &self,
        state: BeaconState<E>,
        slot: Slot,
    ) -> Result<BeaconState<E>, ChainError>;

    /// The post-state root of applying `block` to `state`, via the full
    /// state-transition function.
    fn compute_state_root(
        &self,
        block: &BeaconBlock<E>,
        state: &BeaconState<E>,
    ) -> Result<Hash256, ChainError>;

    /// As `compute_state_root`, for a blinded proposal (the header stands
    /// in for the payload).
    fn compute_blinded_state_root(
        &self,
        block: &BlindedBeaconBlock<E>,
        state: &BeaconState<E>,
    ) -> Result<Hash256, ChainError>;
}

/// A message bound for gossip.
#[derive(Debug, Clone)]
pub enum PubsubMessage<E: EthSpec> {
    BeaconBlock(Arc<SignedBeaconBlock<E>>),
    BlobSidecar(Arc<BlobSidecar<E>>),
    AggregateAndProof(Box<SignedAggregateAndProof<E>>),
    VoluntaryExit(Box<SignedVoluntaryExit>),
    ProposerSlashing(Box<ProposerSlashing>),
    AttesterSlashing(Box<AttesterSlashing<E>>),
    BlsToExecutionChange(Box<SignedBlsToExecutionChange>),
    SignedContributionAndProof(Box<SignedContributionAndProof<E>>),
    ExecutionPayloadBid(Box<SignedExecutionPayloadBid<E>>),
    ExecutionPayloadEnvelope(Box<SignedExecutionPayloadEnvelope<E>>),
    PayloadAttestationMessage(Box<PayloadAttestationMessage>),
}

/// Hands messages to the gossip layer. Enqueueing is synchronous; delivery
/// is the network stack's problem.
pub trait Broadcaster<E: EthSpec>: Send + Sync {
    fn broadcast(&self, message: PubsubMessage<E>) -> Result<(), ChainError>;

    fn broadcast_attestation(
        &self,
        subnet: SubnetId,
        attestation: Attestation<E>,
    ) -> Result<(), ChainError>;

    fn broadcast_sync_committee_message(
        &self,
        subnet: SyncSubnetId,
        message: SyncCommitteeMessage,
    ) -> Result<(), ChainError>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum BuilderError {
    NotRegistered,
    Unavailable(String),
    Rejected(String),
}

impl fmt::Display for BuilderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuilderError::NotRegistered => write!(f, "validator not registered with builder"),
            BuilderError::Unavailable(message) => write!(f, "builder unavailable: {message}"),
            BuilderError::Rejected(message) => write!(f, "builder rejected request: {message}"),
        }
    }
}

/// A validator's registration with the external builder.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatorRegistration {
    pub pubkey: PublicKeyBytes,
    pub gas_limit: u64,
}

/// The external block builder (relay).
pub trait BlockBuilder<E: EthSpec>: Send + Sync {
    fn registration_by_validator_id(&self, validator_index: u64) -> Option<ValidatorRegistration>;

    /// Request a signed bid (blinded header) for `slot` on `parent_hash`.
    fn get_header<'a>(
        &'a self,
        slot: Slot,
        parent_hash: ExecutionBlockHash,
        pubkey: PublicKeyBytes,
    ) -> BoxFuture<'a, Result<SignedBuilderBid<E>, BuilderError>>;

    /// Submit the signed blinded block; the builder reveals the payload
    /// (and, post-Deneb, the blobs bundle).
    fn submit_blinded_block<'a>(
        &'a self,
        block: SignedBlindedBeaconBlock<E>,
    ) -> BoxFuture<'a, Result<(ExecutionPayload<E>, Option<BlobsBundle<E>>), BuilderError>>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineError {
    Unavailable(String),
    InvalidPayloadAttributes(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Unavailable(message) => write!(f, "engine unavailable: {message}"),
            EngineError::InvalidPayloadAttributes(message) => {
                write!(f, "invalid payload attributes: {message}")
            }
        }
    }
}

/// What a local payload build yields.
#[derive(Debug, Clone)]
pub struct PayloadResponse<E: EthSpec> {
    pub payload: ExecutionPayload<E>,
    /// The payload's declared value to the proposer, in Wei.
    pub bid_wei: Uint256,
    pub blobs_bundle: Option<BlobsBundle<E>>,
    pub execution_requests: Option<ExecutionRequests>,
}

/// The local execution engine's payload-building interface.
pub trait ExecutionEngine<E: EthSpec>: Send + Sync {
    fn get_payload<'a>(
        &'a self,
        parent_hash: ExecutionBlockHash,
        slot: Slot,
        proposer_index: u64,
        randao_reveal_root: Hash256,
    ) -> BoxFuture<'a, Result<PayloadResponse<E>, EngineError>>;
}

/// Source of deposit records for validators not yet in the state.
pub trait DepositFetcher: Send + Sync {
    fn deposit_by_pubkey(&self, pubkey: &PublicKeyBytes) -> Option<DepositData>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum PoolError {
    Full,
    Invalid(String),
}

/// The unaggregated/aggregated attestation pool.
pub trait AttestationPool<E: EthSpec>: Send + Sync {
    /// Insert, deduplicating by data root and aggregation bits.
    fn save(&self, attestation: Attestation<E>) -> Result<(), PoolError>;

    /// The strongest known aggregate for `(slot, data_root)`; post-Electra
    /// callers additionally pin the committee index.
    fn get_aggregate(
        &self,
        slot: Slot,
        data_root: Hash256,
        committee_index: Option<u64>,
    ) -> Option<Attestation<E>>;

    /// Attestations eligible for inclusion in a block at `slot`.
    fn pending(&self, slot: Slot) -> Vec<Attestation<E>>;
}

pub trait SlashingPool<E: EthSpec>: Send + Sync {
    fn save_proposer_slashing(&self, slashing: ProposerSlashing) -> Result<(), PoolError>;
    fn save_attester_slashing(&self, slashing: AttesterSlashing<E>) -> Result<(), PoolError>;
    fn pending_proposer_slashings(&self) -> Vec<ProposerSlashing>;
    fn pending_attester_slashings(&self) -> Vec<AttesterSlashing<E>>;
}

pub trait VoluntaryExitPool: Send + Sync {
    fn save(&self, exit: SignedVoluntaryExit) -> Result<(), PoolError>;
    fn pending(&self) -> Vec<SignedVoluntaryExit>;
}

pub trait SyncCommitteePool<E: EthSpec>: Send + Sync {
    fn save_message(&self, message: SyncCommitteeMessage) -> Result<(), PoolError>;
    fn save_contribution(&self, contribution: SyncCommitteeContribution<E>)
    -> Result<(), PoolError>;

    /// The best (most participants) contribution for the triple.
    fn best_contribution(
        &self,
        slot: Slot,
        beacon_block_root: Hash256,
        subcommittee_index: u64,
    ) -> Option<SyncCommitteeContribution<E>>;

    /// The best contribution of every subcommittee for `(slot, root)`.
    fn contributions(&self, slot: Slot, beacon_block_root: Hash256)
    -> Vec<SyncCommitteeContribution<E>>;
}

pub trait BlsChangesPool: Send + Sync {
    fn save(&self, change: SignedBlsToExecutionChange) -> Result<(), PoolError>;
    fn pending(&self) -> Vec<SignedBlsToExecutionChange>;
}

/// Accepts a proposed block into the chain.
pub trait BlockReceiver<E: EthSpec>: Send + Sync {
    fn receive_block(&self, block: SignedBeaconBlock<E>) -> Result<(), ChainError>;
}

/// Accepts the blob sidecars accompanying a proposed block.
pub trait BlobReceiver<E: EthSpec>: Send + Sync {
    fn receive_blobs(&self, sidecars: Vec<BlobSidecar<E>>) -> Result<(), ChainError>;
}

/// Accepts a revealed execution-payload envelope (ePBS).
pub trait PayloadEnvelopeReceiver<E: EthSpec>: Send + Sync {
    fn receive_envelope(
        &self,
        envelope: SignedExecutionPayloadEnvelope<E>,
    ) -> Result<(), ChainError>;
}

/// The operation pools, bundled for injection.
#[derive(Clone)]
pub struct Pools<E: EthSpec> {
    pub attestations: Arc<dyn AttestationPool<E>>,
    pub slashings: Arc<dyn SlashingPool<E>>,
    pub voluntary_exits: Arc<dyn VoluntaryExitPool>,
    pub sync_committee: Arc<dyn SyncCommitteePool<E>>,
    pub bls_changes: Arc<dyn BlsChangesPool>,
}
