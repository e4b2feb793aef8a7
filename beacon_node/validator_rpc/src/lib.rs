//! The validator-facing RPC core of a beacon node.
//!
//! This crate mediates between external validator clients and the node's
//! chain, pools, network and execution-engine components: it hands
//! validators the inputs they must sign (attestation data, block
//! proposals, sync-committee messages) and accepts their signed outputs
//! for broadcast and pool inclusion.
//!
//! Transport is out of scope: every RPC is a plain async method on
//! [`ValidatorServer`] returning [`errors::RpcError`] with a
//! transport-neutral status code. Cancellation follows the usual async
//! convention of dropping the request future; the long-running duties
//! resolver additionally takes an explicit token so a transport can abort
//! it between validators.

pub mod attestation_data_cache;
pub mod chain;
pub mod errors;
pub mod events;
pub mod test_utils;

mod attestation_producer;
mod attestation_submitter;
mod block_production;
mod block_publishing;
mod circuit_breaker;
mod duties;
mod epbs;
mod metrics;
mod operations;
mod readiness;
mod status;
mod streams;
mod subnet_tracker;
mod sync_committees;
mod validation;

pub use attestation_data_cache::{AttestationDataCache, AttestationRequestKey};
pub use block_production::ProducedBlock;
pub use block_publishing::PublishBlockRequest;
pub use circuit_breaker::builder_circuit_breaker_active;
pub use duties::{DutiesResponse, ValidatorDuty};
pub use epbs::ProposalSlotState;
pub use readiness::ReadinessGate;
pub use status::{
    ChainStartResponse, DoppelgangerRequest, DoppelgangerResponse, ValidatorStatus,
    ValidatorStatusResponse,
};
pub use subnet_tracker::SubnetTracker;

use crate::attestation_submitter::PoolSaveQueue;
use crate::chain::{
    BlobReceiver, BlockBuilder, BlockReceiver, Broadcaster, DepositFetcher, ExecutionEngine,
    ForkchoiceFetcher, HeadFetcher, OptimisticModeFetcher, PayloadEnvelopeReceiver, Pools,
    StateGen, SyncChecker,
};
use crate::errors::RpcError;
use crate::events::{BlockNotifier, OperationNotifier, StateNotifier};
use parking_lot::Mutex;
use slot_clock::SlotClock;
use std::ops::Deref;
use std::sync::Arc;
use types::{ChainSpec, Domain, Epoch, EthSpec, ForkName, Hash256, Slot};

/// How many detached pool saves may sit in the queue before new ones are
/// dropped (with a counter increment, never blocking the RPC).
const POOL_SAVE_QUEUE_CAPACITY: usize = 256;

pub struct Inner<E: EthSpec, S: SlotClock> {
    pub spec: Arc<ChainSpec>,
    pub slot_clock: S,
    pub head: Arc<dyn HeadFetcher<E>>,
    pub forkchoice: Arc<dyn ForkchoiceFetcher>,
    pub sync_checker: Arc<dyn SyncChecker>,
    pub optimistic: Arc<dyn OptimisticModeFetcher>,
    pub state_gen: Arc<dyn StateGen<E>>,
    pub broadcaster: Arc<dyn Broadcaster<E>>,
    pub builder: Option<Arc<dyn BlockBuilder<E>>>,
    pub execution_engine: Arc<dyn ExecutionEngine<E>>,
    pub deposits: Arc<dyn DepositFetcher>,
    pub pools: Pools<E>,
    pub block_receiver: Arc<dyn BlockReceiver<E>>,
    pub blob_receiver: Arc<dyn BlobReceiver<E>>,
    pub envelope_receiver: Arc<dyn PayloadEnvelopeReceiver<E>>,

    pub operation_notifier: OperationNotifier<E>,
    pub block_notifier: BlockNotifier<E>,
    pub state_notifier: StateNotifier,

    pub(crate) readiness: ReadinessGate<E, S>,
    pub(crate) attestation_data_cache: AttestationDataCache,
    pub(crate) subnet_tracker: SubnetTracker,
    pub(crate) proposal_state: Mutex<ProposalSlotState<E>>,
    pub(crate) pool_save_queue: PoolSaveQueue<E>,
}

/// The server backing every validator RPC. Cheap to clone; all state is
/// shared behind the inner `Arc`.
pub struct ValidatorServer<E: EthSpec, S: SlotClock> {
    inner: Arc<Inner<E, S>>,
}

impl<E: EthSpec, S: SlotClock> Clone for ValidatorServer<E, S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<E: EthSpec, S: SlotClock> Deref for ValidatorServer<E, S> {
    type Target = Inner<E, S>;

    fn deref(&self) -> &Self::Target {
        self.inner.deref()
    }
}

impl<E: EthSpec, S: SlotClock> ValidatorServer<E, S> {
    /// Admit a validator request, or tell the caller to retry later.
    pub fn admit(&self) -> Result<(), RpcError> {
        self.readiness.admit()
    }

    pub fn current_slot(&self) -> Result<Slot, RpcError> {
        self.slot_clock
            .now_or_genesis()
            .ok_or_else(|| RpcError::unavailable("slot clock unreadable"))
    }

    pub fn current_epoch(&self) -> Result<Epoch, RpcError> {
        Ok(self.current_slot()?.epoch(E::slots_per_epoch()))
    }

    pub fn fork_name_at_slot(&self, slot: Slot) -> ForkName {
        self.spec.fork_name_at_slot::<E>(slot)
    }

    /// Evict per-slot scratch state. Callers wire this to their slot timer.
    pub fn on_slot(&self, current_slot: Slot) {
        self.attestation_data_cache.prune(current_slot);
        self.subnet_tracker.prune(current_slot, E::slots_per_epoch());
    }

    /// `DomainData(epoch, domain)`: the 32-byte signature domain for
    /// `epoch`, bound to this chain's fork schedule and genesis validators
    /// root.
    pub fn domain_data(&self, epoch: Epoch, domain: Domain) -> Result<Hash256, RpcError> {
        let genesis_validators_root = self
            .head
            .head_genesis_validators_root()
            .map_err(|e| RpcError::internal(format!("genesis validators root: {e}")))?;
        let fork = self.spec.fork_at_epoch(epoch);
        Ok(self
            .spec
            .get_domain(epoch, domain, &fork, genesis_validators_root))
    }
}

/// Assembles a [`ValidatorServer`]. Must be built inside a tokio runtime;
/// the detached pool-save worker is spawned at build time.
pub struct ValidatorServerBuilder<E: EthSpec, S: SlotClock> {
    spec: Option<Arc<ChainSpec>>,
    slot_clock: Option<S>,
    head: Option<Arc<dyn HeadFetcher<E>>>,
    forkchoice: Option<Arc<dyn ForkchoiceFetcher>>,
    sync_checker: Option<Arc<dyn SyncChecker>>,
    optimistic: Option<Arc<dyn OptimisticModeFetcher>>,
    state_gen: Option<Arc<dyn StateGen<E>>>,
    broadcaster: Option<Arc<dyn Broadcaster<E>>>,
    builder: Option<Arc<dyn BlockBuilder<E>>>,
    execution_engine: Option<Arc<dyn ExecutionEngine<E>>>,
    deposits: Option<Arc<dyn DepositFetcher>>,
    pools: Option<Pools<E>>,
    block_receiver: Option<Arc<dyn BlockReceiver<E>>>,
    blob_receiver: Option<Arc<dyn BlobReceiver<E>>>,
    envelope_receiver: Option<Arc<dyn PayloadEnvelopeReceiver<E>>>,
}

impl<E: EthSpec, S: SlotClock> Default for ValidatorServerBuilder<E, S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: EthSpec, S: SlotClock> ValidatorServerBuilder<E, S> {
    pub fn new() -> Self {
        Self {
            spec: None,
            slot_clock: None,
            head: None,
            forkchoice: None,
            sync_checker: None,
            optimistic: None,
            state_gen: None,
            broadcaster: None,
            builder: None,
            execution_engine: None,
            deposits: None,
            pools: None,
            block_receiver: None,
            blob_receiver: None,
            envelope_receiver: None,
        }
    }

    pub fn spec(mut self, spec: Arc<ChainSpec>) -> Self {
        self.spec = Some(spec);
        self
    }

    pub fn slot_clock(mut self, slot_clock: S) -> Self {
        self.slot_clock = Some(slot_clock);
        self
    }

    pub fn head(mut self, head: Arc<dyn HeadFetcher<E>>) -> Self {
        self.head = Some(head);
        self
    }

    pub fn forkchoice(mut self, forkchoice: Arc<dyn ForkchoiceFetcher>) -> Self {
        self.forkchoice = Some(forkchoice);
        self
    }

    pub fn sync_checker(mut self, sync_checker: Arc<dyn SyncChecker>) -> Self {
        self.sync_checker = Some(sync_checker);
        self
    }

    pub fn optimistic(mut self, optimistic: Arc<dyn OptimisticModeFetcher>) -> Self {
        self.optimistic = Some(optimistic);
        self
    }

    pub fn state_gen(mut self, state_gen: Arc<dyn StateGen<E>>) -> Self {
        self.state_gen = Some(state_gen);
        self
    }

    pub fn broadcaster(mut self, broadcaster: Arc<dyn Broadcaster<E>>) -> Self {
        self.broadcaster = Some(broadcaster);
        self
    }

    /// Optional: omitting the builder disables outsourced construction.
    pub fn block_builder(mut self, builder: Arc<dyn BlockBuilder<E>>) -> Self {
        self.builder = Some(builder);
        self
    }

    pub fn execution_engine(mut self, execution_engine: Arc<dyn ExecutionEngine<E>>) -> Self {
        self.execution_engine = Some(execution_engine);
        self
    }

    pub fn deposits(mut self, deposits: Arc<dyn DepositFetcher>) -> Self {
        self.deposits = Some(deposits);
        self
    }

    pub fn pools(mut self, pools: Pools<E>) -> Self {
        self.pools = Some(pools);
        self
    }

    pub fn block_receiver(mut self, block_receiver: Arc<dyn BlockReceiver<E>>) -> Self {
        self.block_receiver = Some(block_receiver);
        self
    }

    pub fn blob_receiver(mut self, blob_receiver: Arc<dyn BlobReceiver<E>>) -> Self {
        self.blob_receiver = Some(blob_receiver);
        self
    }

    pub fn envelope_receiver(
        mut self,
        envelope_receiver: Arc<dyn PayloadEnvelopeReceiver<E>>,
    ) -> Self {
        self.envelope_receiver = Some(envelope_receiver);
        self
    }

    pub fn build(self) -> Result<ValidatorServer<E, S>, String> {
        let spec = self.spec.ok_or("Cannot build ValidatorServer without spec")?;
        let slot_clock = self
            .slot_clock
            .ok_or("Cannot build ValidatorServer without slot_clock")?;
        let sync_checker = self
            .sync_checker
            .ok_or("Cannot build ValidatorServer without sync_checker")?;
        let optimistic = self
            .optimistic
            .ok_or("Cannot build ValidatorServer without optimistic")?;
        let pools = self.pools.ok_or("Cannot build ValidatorServer without pools")?;

        let readiness = ReadinessGate::new(
            sync_checker.clone(),
            optimistic.clone(),
            slot_clock.clone(),
            spec.clone(),
        );
        let pool_save_queue =
            PoolSaveQueue::spawn(pools.attestations.clone(), POOL_SAVE_QUEUE_CAPACITY);

        Ok(ValidatorServer {
            inner: Arc::new(Inner {
                spec,
                slot_clock,
                head: self.head.ok_or("Cannot build ValidatorServer without head")?,
                forkchoice: self
                    .forkchoice
                    .ok_or("Cannot build ValidatorServer without forkchoice")?,
                sync_checker,
                optimistic,
                state_gen: self
                    .state_gen
                    .ok_or("Cannot build ValidatorServer without state_gen")?,
                broadcaster: self
                    .broadcaster
                    .ok_or("Cannot build ValidatorServer without broadcaster")?,
                builder: self.builder,
                execution_engine: self
                    .execution_engine
                    .ok_or("Cannot build ValidatorServer without execution_engine")?,
                deposits: self
                    .deposits
                    .ok_or("Cannot build ValidatorServer without deposits")?,
                pools,
                block_receiver: self
                    .block_receiver
                    .ok_or("Cannot build ValidatorServer without block_receiver")?,
                blob_receiver: self
                    .blob_receiver
                    .ok_or("Cannot build ValidatorServer without blob_receiver")?,
                envelope_receiver: self
                    .envelope_receiver
                    .ok_or("Cannot build ValidatorServer without envelope_receiver")?,
                operation_notifier: OperationNotifier::default(),
                block_notifier: BlockNotifier::default(),
                state_notifier: StateNotifier::default(),
                readiness,
                attestation_data_cache: AttestationDataCache::new(),
                subnet_tracker: SubnetTracker::default(),
                proposal_state: Mutex::new(ProposalSlotState::default()),
                pool_save_queue,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestRig;
    use types::MinimalEthSpec;

    type E = MinimalEthSpec;

    #[tokio::test]
    async fn domain_data_is_chain_bound() {
        let rig = TestRig::<E>::new(8).at_slot(5);
        let attester = rig
            .server()
            .domain_data(Epoch::new(0), Domain::BeaconAttester)
            .unwrap();
        let proposer = rig
            .server()
            .domain_data(Epoch::new(0), Domain::BeaconProposer)
            .unwrap();
        assert_ne!(attester, proposer);
        assert_eq!(&attester.as_slice()[..4], &[1, 0, 0, 0]);
    }

    #[tokio::test]
    async fn on_slot_prunes_per_slot_state() {
        let rig = TestRig::<E>::new(8).at_slot(5);
        rig.server()
            .subscribe_committee_subnets(&[Slot::new(5)], &[0], &[false])
            .unwrap();
        assert!(!rig.server().subnet_tracker.attester_subnets(Slot::new(5)).is_empty());

        // Three epochs later everything at slot 5 is gone.
        rig.server().on_slot(Slot::new(5 + 3 * E::slots_per_epoch()));
        assert!(rig.server().subnet_tracker.attester_subnets(Slot::new(5)).is_empty());
        assert!(rig.server().attestation_data_cache.is_empty());
    }
}
