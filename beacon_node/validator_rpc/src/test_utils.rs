//! A mock chain and a `TestRig` wiring it into a [`ValidatorServer`], used
//! across this crate's tests.

use crate::chain::{
    AttestationPool, BlobReceiver, BlockBuilder, BlockReceiver, Broadcaster, BuilderError,
    ChainError, DepositFetcher, EngineError, ExecutionEngine, ForkchoiceFetcher, HeadFetcher,
    OptimisticModeFetcher, PayloadEnvelopeReceiver, PayloadResponse, PoolError, Pools,
    PubsubMessage, SlashingPool, StateGen, SyncChecker, SyncCommitteePool, ValidatorRegistration,
    VoluntaryExitPool,
};
use crate::events::BlockEvent;
use crate::{ValidatorServer, ValidatorServerBuilder};
use futures::future::BoxFuture;
use parking_lot::RwLock;
use slot_clock::{ManualSlotClock, SlotClock};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tree_hash::TreeHash;
use types::test_utils::{interop_pubkey, interop_state};
use types::{
    Attestation, AttesterSlashing, BeaconBlock, BeaconState, BlindedBeaconBlock,
    BlindedBeaconBlockBodyDeneb, BlindedBeaconBlockDeneb, Blob, BlobSidecar, BlobsBundle,
    ChainSpec, Checkpoint, DepositData, Epoch, EthSpec, ExecutionBlockHash, ExecutionPayload,
    ExecutionPayloadHeader, ExecutionPayloadHeaderDeneb, ForkName, Graffiti, Hash256,
    KzgCommitment, KzgProof, ProposerSlashing, PublicKeyBytes, SignatureBytes,
    SignedBeaconBlock, SignedBlindedBeaconBlock, SignedBlsToExecutionChange, SignedBuilderBid,
    SignedExecutionPayloadEnvelope, SignedVoluntaryExit, Slot, SubnetId, SyncAggregate,
    SyncCommittee, SyncCommitteeContribution, SyncCommitteeMessage, SyncSubnetId, Uint256,
    BuilderBid, KzgCommitments,
};

/// Every collaborator of the server, scripted for tests.
pub struct MockChain<E: EthSpec> {
    pub spec: Arc<ChainSpec>,
    pub head_root: RwLock<Hash256>,
    pub head_state: RwLock<BeaconState<E>>,
    pub states_by_root: RwLock<HashMap<Hash256, BeaconState<E>>>,
    pub syncing: AtomicBool,
    pub optimistic: AtomicBool,
    pub fail_head_state_once: AtomicBool,
    pub head_state_fetches: AtomicUsize,
    pub replays: AtomicUsize,
    pub highest_received: RwLock<(Slot, Hash256)>,
    pub received_last_epoch: AtomicU64,
    pub deposits: RwLock<HashMap<PublicKeyBytes, DepositData>>,
    pub engine_bid_wei: RwLock<Uint256>,
    pub engine_blobs: RwLock<Option<BlobsBundle<E>>>,
    pub broadcasts: RwLock<Vec<PubsubMessage<E>>>,
    pub broadcast_attestations: RwLock<Vec<(SubnetId, Attestation<E>)>>,
    pub broadcast_sync_messages: RwLock<Vec<(SyncSubnetId, SyncCommitteeMessage)>>,
    pub received_blocks: RwLock<Vec<SignedBeaconBlock<E>>>,
    pub received_blobs: RwLock<Vec<BlobSidecar<E>>>,
    pub received_envelopes: AtomicUsize,
}

impl<E: EthSpec> MockChain<E> {
    pub fn new(validator_count: usize, spec: Arc<ChainSpec>) -> Self {
        Self {
            head_root: RwLock::new(Hash256::repeat_byte(0x42)),
            head_state: RwLock::new(interop_state::<E>(validator_count, &spec)),
            states_by_root: RwLock::new(HashMap::new()),
            syncing: AtomicBool::new(false),
            optimistic: AtomicBool::new(false),
            fail_head_state_once: AtomicBool::new(false),
            head_state_fetches: AtomicUsize::new(0),
            replays: AtomicUsize::new(0),
            highest_received: RwLock::new((Slot::new(0), Hash256::ZERO)),
            received_last_epoch: AtomicU64::new(E::slots_per_epoch()),
            deposits: RwLock::new(HashMap::new()),
            engine_bid_wei: RwLock::new(Uint256::from(100u64)),
            engine_blobs: RwLock::new(None),
            broadcasts: RwLock::new(Vec::new()),
            broadcast_attestations: RwLock::new(Vec::new()),
            broadcast_sync_messages: RwLock::new(Vec::new()),
            received_blocks: RwLock::new(Vec::new()),
            received_blobs: RwLock::new(Vec::new()),
            received_envelopes: AtomicUsize::new(0),
            spec,
        }
    }

    fn advanced(&self, mut state: BeaconState<E>, slot: Slot) -> BeaconState<E> {
        state.slot = slot;
        state.fork = self.spec.fork_at_epoch(slot.epoch(E::slots_per_epoch()));
        state
    }
}

impl<E: EthSpec> HeadFetcher<E> for MockChain<E> {
    fn head_root(&self) -> Result<Hash256, ChainError> {
        Ok(*self.head_root.read())
    }

    fn head_state(&self) -> Result<BeaconState<E>, ChainError> {
        if self.fail_head_state_once.swap(false, Ordering::SeqCst) {
            return Err(ChainError::StateUnavailable);
        }
        self.head_state_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.head_state.read().clone())
    }

    fn head_state_read_only(&self) -> Result<Arc<BeaconState<E>>, ChainError> {
        Ok(Arc::new(self.head_state.read().clone()))
    }
}

impl<E: EthSpec> ForkchoiceFetcher for MockChain<E> {
    fn highest_received_block_slot(&self) -> Slot {
        self.highest_received.read().0
    }

    fn received_blocks_last_epoch(&self) -> Result<u64, ChainError> {
        Ok(self.received_last_epoch.load(Ordering::SeqCst))
    }

    fn highest_received_block_slot_root(&self) -> (Slot, Hash256) {
        *self.highest_received.read()
    }
}

impl<E: EthSpec> OptimisticModeFetcher for MockChain<E> {
    fn is_optimistic(&self) -> Result<bool, ChainError> {
        Ok(self.optimistic.load(Ordering::SeqCst))
    }
}

impl<E: EthSpec> SyncChecker for MockChain<E> {
    fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::SeqCst)
    }
}

impl<E: EthSpec> StateGen<E> for MockChain<E> {
    fn state_by_root(&self, root: Hash256) -> Result<Option<BeaconState<E>>, ChainError> {
        Ok(self.states_by_root.read().get(&root).cloned())
    }

    fn state_by_slot(&self, slot: Slot) -> Result<BeaconState<E>, ChainError> {
        Ok(self.advanced(self.head_state.read().clone(), slot))
    }

    fn replay_to_slot(
        &self,
        state: BeaconState<E>,
        slot: Slot,
    ) -> Result<BeaconState<E>, ChainError> {
        self.replays.fetch_add(1, Ordering::SeqCst);
        Ok(self.advanced(state, slot))
    }

    fn compute_state_root(
        &self,
        block: &BeaconBlock<E>,
        _state: &BeaconState<E>,
    ) -> Result<Hash256, ChainError> {
        Ok(block.body_root())
    }

    fn compute_blinded_state_root(
        &self,
        block: &BlindedBeaconBlock<E>,
        _state: &BeaconState<E>,
    ) -> Result<Hash256, ChainError> {
        Ok(block.body_root())
    }
}

impl<E: EthSpec> Broadcaster<E> for MockChain<E> {
    fn broadcast(&self, message: PubsubMessage<E>) -> Result<(), ChainError> {
        self.broadcasts.write().push(message);
        Ok(())
    }

    fn broadcast_attestation(
        &self,
        subnet: SubnetId,
        attestation: Attestation<E>,
    ) -> Result<(), ChainError> {
        self.broadcast_attestations.write().push((subnet, attestation));
        Ok(())
    }

    fn broadcast_sync_committee_message(
        &self,
        subnet: SyncSubnetId,
        message: SyncCommitteeMessage,
    ) -> Result<(), ChainError> {
        self.broadcast_sync_messages.write().push((subnet, message));
        Ok(())
    }
}

impl<E: EthSpec> ExecutionEngine<E> for MockChain<E> {
    fn get_payload<'a>(
        &'a self,
        _parent_hash: ExecutionBlockHash,
        slot: Slot,
        _proposer_index: u64,
        _randao_reveal_root: Hash256,
    ) -> BoxFuture<'a, Result<PayloadResponse<E>, EngineError>> {
        let fork_name = self.spec.fork_name_at_slot::<E>(slot);
        let result = ExecutionPayload::default_at_fork(fork_name)
            .ok_or_else(|| {
                EngineError::InvalidPayloadAttributes("pre-merge payload request".to_string())
            })
            .map(|payload| PayloadResponse {
                payload,
                bid_wei: *self.engine_bid_wei.read(),
                blobs_bundle: self.engine_blobs.read().clone(),
                execution_requests: None,
            });
        Box::pin(async move { result })
    }
}

impl<E: EthSpec> DepositFetcher for MockChain<E> {
    fn deposit_by_pubkey(&self, pubkey: &PublicKeyBytes) -> Option<DepositData> {
        self.deposits.read().get(pubkey).cloned()
    }
}

impl<E: EthSpec> BlockReceiver<E> for MockChain<E> {
    fn receive_block(&self, block: SignedBeaconBlock<E>) -> Result<(), ChainError> {
        self.received_blocks.write().push(block);
        Ok(())
    }
}

impl<E: EthSpec> BlobReceiver<E> for MockChain<E> {
    fn receive_blobs(&self, sidecars: Vec<BlobSidecar<E>>) -> Result<(), ChainError> {
        self.received_blobs.write().extend(sidecars);
        Ok(())
    }
}

impl<E: EthSpec> PayloadEnvelopeReceiver<E> for MockChain<E> {
    fn receive_envelope(
        &self,
        _envelope: SignedExecutionPayloadEnvelope<E>,
    ) -> Result<(), ChainError> {
        self.received_envelopes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// An in-memory attestation pool deduplicating by data root and bits.
#[derive(Default)]
pub struct MockAttestationPool<E: EthSpec> {
    attestations: RwLock<Vec<Attestation<E>>>,
}

impl<E: EthSpec> MockAttestationPool<E> {
    pub fn len(&self) -> usize {
        self.attestations.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.attestations.read().is_empty()
    }
}

impl<E: EthSpec> AttestationPool<E> for MockAttestationPool<E> {
    fn save(&self, attestation: Attestation<E>) -> Result<(), PoolError> {
        let mut attestations = self.attestations.write();
        if !attestations
            .iter()
            .any(|known| known.matches_modulo_signature(&attestation))
        {
            attestations.push(attestation);
        }
        Ok(())
    }

    fn get_aggregate(
        &self,
        slot: Slot,
        data_root: Hash256,
        committee_index: Option<u64>,
    ) -> Option<Attestation<E>> {
        self.attestations
            .read()
            .iter()
            .filter(|attestation| {
                attestation.data().slot == slot
                    && attestation.data().tree_hash_root() == data_root
                    && committee_index
                        .is_none_or(|index| attestation.committee_index() == Some(index))
            })
            .max_by_key(|attestation| attestation.num_set_aggregation_bits())
            .cloned()
    }

    fn pending(&self, slot: Slot) -> Vec<Attestation<E>> {
        self.attestations
            .read()
            .iter()
            .filter(|attestation| attestation.data().slot < slot)
            .cloned()
            .collect()
    }
}

#[derive(Default)]
pub struct MockSlashingPool<E: EthSpec> {
    proposer: RwLock<Vec<ProposerSlashing>>,
    attester: RwLock<Vec<AttesterSlashing<E>>>,
}

impl<E: EthSpec> SlashingPool<E> for MockSlashingPool<E> {
    fn save_proposer_slashing(&self, slashing: ProposerSlashing) -> Result<(), PoolError> {
        self.proposer.write().push(slashing);
        Ok(())
    }

    fn save_attester_slashing(&self, slashing: AttesterSlashing<E>) -> Result<(), PoolError> {
        self.attester.write().push(slashing);
        Ok(())
    }

    fn pending_proposer_slashings(&self) -> Vec<ProposerSlashing> {
        self.proposer.read().clone()
    }

    fn pending_attester_slashings(&self) -> Vec<AttesterSlashing<E>> {
        self.attester.read().clone()
    }
}

#[derive(Default)]
pub struct MockExitPool {
    exits: RwLock<Vec<SignedVoluntaryExit>>,
}

impl VoluntaryExitPool for MockExitPool {
    fn save(&self, exit: SignedVoluntaryExit) -> Result<(), PoolError> {
        self.exits.write().push(exit);
        Ok(())
    }

    fn pending(&self) -> Vec<SignedVoluntaryExit> {
        self.exits.read().clone()
    }
}

#[derive(Default)]
pub struct MockSyncCommitteePool<E: EthSpec> {
    messages: RwLock<Vec<SyncCommitteeMessage>>,
    contributions: RwLock<Vec<SyncCommitteeContribution<E>>>,
}

impl<E: EthSpec> SyncCommitteePool<E> for MockSyncCommitteePool<E> {
    fn save_message(&self, message: SyncCommitteeMessage) -> Result<(), PoolError> {
        self.messages.write().push(message);
        Ok(())
    }

    fn save_contribution(
        &self,
        contribution: SyncCommitteeContribution<E>,
    ) -> Result<(), PoolError> {
        self.contributions.write().push(contribution);
        Ok(())
    }

    fn best_contribution(
        &self,
        slot: Slot,
        beacon_block_root: Hash256,
        subcommittee_index: u64,
    ) -> Option<SyncCommitteeContribution<E>> {
        self.contributions
            .read()
            .iter()
            .filter(|contribution| {
                contribution.slot == slot
                    && contribution.beacon_block_root == beacon_block_root
                    && contribution.subcommittee_index == subcommittee_index
            })
            .max_by_key(|contribution| contribution.num_set_bits())
            .cloned()
    }

    fn contributions(
        &self,
        slot: Slot,
        beacon_block_root: Hash256,
    ) -> Vec<SyncCommitteeContribution<E>> {
        let subcommittees: std::collections::BTreeSet<u64> = self
            .contributions
            .read()
            .iter()
            .filter(|c| c.slot == slot && c.beacon_block_root == beacon_block_root)
            .map(|c| c.subcommittee_index)
            .collect();
        subcommittees
            .into_iter()
            .filter_map(|index| self.best_contribution(slot, beacon_block_root, index))
            .collect()
    }
}

#[derive(Default)]
pub struct MockBlsChangesPool {
    changes: RwLock<Vec<SignedBlsToExecutionChange>>,
}

impl crate::chain::BlsChangesPool for MockBlsChangesPool {
    fn save(&self, change: SignedBlsToExecutionChange) -> Result<(), PoolError> {
        self.changes.write().push(change);
        Ok(())
    }

    fn pending(&self) -> Vec<SignedBlsToExecutionChange> {
        self.changes.read().clone()
    }
}

/// A relay that bids a fixed value and reveals the payload it bid on.
pub struct MockBuilder<E: EthSpec> {
    payload: RwLock<ExecutionPayload<E>>,
    value: Uint256,
    tamper: AtomicBool,
    unblind_calls: AtomicUsize,
}

impl<E: EthSpec> MockBuilder<E> {
    pub fn new(payload: ExecutionPayload<E>, value: Uint256) -> Self {
        Self {
            payload: RwLock::new(payload),
            value,
            tamper: AtomicBool::new(false),
            unblind_calls: AtomicUsize::new(0),
        }
    }
}

impl<E: EthSpec> BlockBuilder<E> for MockBuilder<E> {
    fn registration_by_validator_id(&self, _validator_index: u64) -> Option<ValidatorRegistration> {
        Some(ValidatorRegistration {
            pubkey: interop_pubkey(0),
            gas_limit: 30_000_000,
        })
    }

    fn get_header<'a>(
        &'a self,
        _slot: Slot,
        _parent_hash: ExecutionBlockHash,
        pubkey: PublicKeyBytes,
    ) -> BoxFuture<'a, Result<SignedBuilderBid<E>, BuilderError>> {
        let header = ExecutionPayloadHeader::from(&*self.payload.read());
        let bid = SignedBuilderBid {
            message: BuilderBid {
                header,
                blob_kzg_commitments: KzgCommitments::<E>::default(),
                value: self.value,
                pubkey,
            },
            signature: SignatureBytes::empty(),
        };
        Box::pin(async move { Ok(bid) })
    }

    fn submit_blinded_block<'a>(
        &'a self,
        _block: SignedBlindedBeaconBlock<E>,
    ) -> BoxFuture<'a, Result<(ExecutionPayload<E>, Option<BlobsBundle<E>>), BuilderError>> {
        self.unblind_calls.fetch_add(1, Ordering::SeqCst);
        let mut payload = self.payload.read().clone();
        if self.tamper.load(Ordering::SeqCst) {
            match &mut payload {
                ExecutionPayload::Bellatrix(p) => p.gas_limit += 1,
                ExecutionPayload::Capella(p) => p.gas_limit += 1,
                ExecutionPayload::Deneb(p) => p.gas_limit += 1,
            }
        }
        Box::pin(async move { Ok((payload, None)) })
    }
}

/// A server wired to a fully scripted mock chain.
pub struct TestRig<E: EthSpec> {
    pub mock: Arc<MockChain<E>>,
    pub attestation_pool: Arc<MockAttestationPool<E>>,
    pub builder: Option<Arc<MockBuilder<E>>>,
    clock: ManualSlotClock,
    spec: ChainSpec,
    server: ValidatorServer<E, ManualSlotClock>,
}

impl<E: EthSpec> TestRig<E> {
    /// A rig at the Altair fork with `validator_count` interop validators.
    pub fn new(validator_count: usize) -> Self {
        Self::with_spec(
            validator_count,
            ForkName::Altair.make_genesis_spec(ChainSpec::minimal()),
        )
    }

    pub fn with_spec(validator_count: usize, spec: ChainSpec) -> Self {
        let spec_arc = Arc::new(spec.clone());
        let mock = Arc::new(MockChain::<E>::new(validator_count, spec_arc.clone()));
        let clock = ManualSlotClock::new(
            Slot::new(0),
            Duration::from_secs(0),
            Duration::from_secs(spec.seconds_per_slot),
        );
        let attestation_pool = Arc::new(MockAttestationPool::<E>::default());
        let server = Self::build_server(&mock, &attestation_pool, None, &clock, spec_arc);
        Self {
            mock,
            attestation_pool,
            builder: None,
            clock,
            spec,
            server,
        }
    }

    fn build_server(
        mock: &Arc<MockChain<E>>,
        attestation_pool: &Arc<MockAttestationPool<E>>,
        builder: Option<Arc<MockBuilder<E>>>,
        clock: &ManualSlotClock,
        spec: Arc<ChainSpec>,
    ) -> ValidatorServer<E, ManualSlotClock> {
        let pools = Pools {
            attestations: attestation_pool.clone(),
            slashings: Arc::new(MockSlashingPool::<E>::default()),
            voluntary_exits: Arc::new(MockExitPool::default()),
            sync_committee: Arc::new(MockSyncCommitteePool::<E>::default()),
            bls_changes: Arc::new(MockBlsChangesPool::default()),
        };
        let mut server_builder = ValidatorServerBuilder::new()
            .spec(spec)
            .slot_clock(clock.clone())
            .head(mock.clone())
            .forkchoice(mock.clone())
            .sync_checker(mock.clone())
            .optimistic(mock.clone())
            .state_gen(mock.clone())
            .broadcaster(mock.clone())
            .execution_engine(mock.clone())
            .deposits(mock.clone())
            .pools(pools)
            .block_receiver(mock.clone())
            .blob_receiver(mock.clone())
            .envelope_receiver(mock.clone());
        if let Some(builder) = builder {
            server_builder = server_builder.block_builder(builder);
        }
        server_builder.build().expect("mock server builds")
    }

    /// Re-create the server (and the mock's spec handle) after a spec
    /// change, preserving all scripted chain state.
    fn rebuild(&mut self) {
        let spec_arc = Arc::new(self.spec.clone());
        self.mock = Arc::new(MockChain {
            spec: spec_arc.clone(),
            head_root: RwLock::new(*self.mock.head_root.read()),
            head_state: RwLock::new(self.mock.head_state.read().clone()),
            states_by_root: RwLock::new(self.mock.states_by_root.read().clone()),
            syncing: AtomicBool::new(self.mock.syncing.load(Ordering::SeqCst)),
            optimistic: AtomicBool::new(self.mock.optimistic.load(Ordering::SeqCst)),
            fail_head_state_once: AtomicBool::new(false),
            head_state_fetches: AtomicUsize::new(0),
            replays: AtomicUsize::new(0),
            highest_received: RwLock::new(*self.mock.highest_received.read()),
            received_last_epoch: AtomicU64::new(
                self.mock.received_last_epoch.load(Ordering::SeqCst),
            ),
            deposits: RwLock::new(self.mock.deposits.read().clone()),
            engine_bid_wei: RwLock::new(*self.mock.engine_bid_wei.read()),
            engine_blobs: RwLock::new(self.mock.engine_blobs.read().clone()),
            broadcasts: RwLock::new(Vec::new()),
            broadcast_attestations: RwLock::new(Vec::new()),
            broadcast_sync_messages: RwLock::new(Vec::new()),
            received_blocks: RwLock::new(Vec::new()),
            received_blobs: RwLock::new(Vec::new()),
            received_envelopes: AtomicUsize::new(0),
        });
        self.server = Self::build_server(
            &self.mock,
            &self.attestation_pool,
            self.builder.clone(),
            &self.clock,
            spec_arc,
        );
    }

    pub fn server(&self) -> &ValidatorServer<E, ManualSlotClock> {
        &self.server
    }

    pub fn spec(&self) -> &ChainSpec {
        &self.spec
    }

    /*
     * Builder-style configuration.
     */

    /// Re-pin every fork up to `fork_name` at genesis.
    pub fn at_fork(mut self, fork_name: ForkName) -> Self {
        self.spec = fork_name.make_genesis_spec(ChainSpec::minimal());
        self.rebuild();
        let spec = self.spec.clone();
        let mut state = self.mock.head_state.write();
        state.fork = spec.fork_at_epoch(Epoch::new(0));
        drop(state);
        self
    }

    /// Move both the head state and the wall clock to `slot`.
    pub fn at_slot(self, slot: u64) -> Self {
        {
            let mut state = self.mock.head_state.write();
            state.slot = Slot::new(slot);
            drop(state);
            self.clock.set_slot(slot);
            *self.mock.highest_received.write() = (
                Slot::new(slot.saturating_sub(1)),
                *self.mock.head_root.read(),
            );
        }
        self
    }

    pub fn with_justified_epoch(self, epoch: Epoch) -> Self {
        self.mock.head_state.write().current_justified_checkpoint = Checkpoint {
            epoch,
            root: Hash256::repeat_byte(0x99),
        };
        self
    }

    /// Put validator `index`'s key into the current sync committee.
    pub fn with_sync_committee_member(self, index: usize) -> Self {
        {
            let mut state = self.mock.head_state.write();
            let mut committee = SyncCommittee::<E>::naive();
            committee.pubkeys[0] = interop_pubkey(index);
            state.current_sync_committee = Arc::new(committee);
        }
        self
    }

    pub fn with_epbs(mut self) -> Self {
        self.spec.epbs_fork_epoch = Some(Epoch::new(0));
        self.rebuild();
        self
    }

    /// Give the local engine `count` blobs to bundle with its payloads.
    pub fn with_blobs(self, count: usize) -> Self {
        let commitments: Vec<KzgCommitment> =
            (0..count).map(|i| KzgCommitment([i as u8 + 1; 48])).collect();
        let proofs: Vec<KzgProof> = (0..count).map(|_| KzgProof::empty()).collect();
        let blobs: Vec<Blob<E>> = (0..count).map(|_| Blob::<E>::empty()).collect();
        *self.mock.engine_blobs.write() = Some(BlobsBundle {
            commitments: ssz_types::VariableList::new(commitments)
                .expect("within commitment bound"),
            proofs: ssz_types::VariableList::new(proofs).expect("within commitment bound"),
            blobs: ssz_types::VariableList::new(blobs).expect("within commitment bound"),
        });
        self
    }

    /// Attach a relay bidding `value` Wei on the engine's payload shape.
    pub fn with_builder(mut self, value: Uint256) -> Self {
        let fork_name = self.spec.fork_name_at_epoch(Epoch::new(0));
        let payload =
            ExecutionPayload::default_at_fork(fork_name).expect("builder rigs are post-merge");
        self.builder = Some(Arc::new(MockBuilder::new(payload, value)));
        self.rebuild();
        self
    }

    /*
     * Scripting helpers.
     */

    pub fn set_clock_slot(&self, slot: u64) {
        self.clock.set_slot(slot);
    }

    pub fn set_syncing(&self, syncing: bool) {
        self.mock.syncing.store(syncing, Ordering::SeqCst);
    }

    pub fn fail_next_head_state(&self) {
        self.mock.fail_head_state_once.store(true, Ordering::SeqCst);
    }

    pub fn set_block_root_at(&self, slot: Slot, root: Hash256) {
        let mut state = self.mock.head_state.write();
        let index = slot.as_usize() % E::slots_per_historical_root();
        state.block_roots[index] = root;
    }

    pub fn store_state_for_root(&self, root: Hash256, slot: u64) {
        let state = self
            .mock
            .advanced(self.mock.head_state.read().clone(), Slot::new(slot));
        self.mock.states_by_root.write().insert(root, state);
    }

    pub fn set_highest_received(&self, slot: Slot, root: Hash256) {
        *self.mock.highest_received.write() = (slot, root);
    }

    pub fn add_deposit(&self, pubkey: PublicKeyBytes) {
        self.mock.deposits.write().insert(
            pubkey,
            DepositData {
                pubkey,
                withdrawal_credentials: Hash256::ZERO,
                amount: self.spec.max_effective_balance,
                signature: SignatureBytes::empty(),
            },
        );
    }

    pub fn tamper_builder_payload(&self) {
        self.builder
            .as_ref()
            .expect("rig has a builder")
            .tamper
            .store(true, Ordering::SeqCst);
    }

    pub fn emit_block_event(&self, slot: Slot, root: Hash256, verified: bool) {
        let block = dummy_block::<E>(slot);
        self.server.block_notifier.send(BlockEvent::ReceivedBlock {
            root,
            slot,
            verified,
            block: Arc::new(block),
        });
    }

    pub fn dummy_blinded_block(&self, slot: u64) -> SignedBlindedBeaconBlock<E> {
        SignedBlindedBeaconBlock {
            message: BlindedBeaconBlock::Deneb(BlindedBeaconBlockDeneb {
                slot: Slot::new(slot),
                proposer_index: 0,
                parent_root: Hash256::ZERO,
                state_root: Hash256::ZERO,
                body: BlindedBeaconBlockBodyDeneb {
                    randao_reveal: SignatureBytes::empty(),
                    eth1_data: Default::default(),
                    graffiti: Graffiti::ZERO,
                    proposer_slashings: Default::default(),
                    attester_slashings: Default::default(),
                    attestations: Default::default(),
                    deposits: Default::default(),
                    voluntary_exits: Default::default(),
                    sync_aggregate: SyncAggregate::new(),
                    execution_payload_header: ExecutionPayloadHeaderDeneb::default(),
                    bls_to_execution_changes: Default::default(),
                    blob_kzg_commitments: Default::default(),
                },
            }),
            signature: SignatureBytes::empty(),
        }
    }

    /*
     * Observations.
     */

    pub fn head_root(&self) -> Hash256 {
        *self.mock.head_root.read()
    }

    pub fn justified_checkpoint(&self) -> Checkpoint {
        self.mock.head_state.read().current_justified_checkpoint
    }

    pub fn head_state_fetches(&self) -> usize {
        self.mock.head_state_fetches.load(Ordering::SeqCst)
    }

    pub fn replays(&self) -> usize {
        self.mock.replays.load(Ordering::SeqCst)
    }

    pub fn broadcast_attestations(&self) -> Vec<(SubnetId, Attestation<E>)> {
        self.mock.broadcast_attestations.read().clone()
    }

    pub fn broadcast_sync_messages(&self) -> Vec<(SyncSubnetId, SyncCommitteeMessage)> {
        self.mock.broadcast_sync_messages.read().clone()
    }

    pub fn pool_attestation_count(&self) -> usize {
        self.attestation_pool.len()
    }

    pub fn received_blocks(&self) -> usize {
        self.mock.received_blocks.read().len()
    }

    pub fn received_blob_sidecars(&self) -> Vec<BlobSidecar<E>> {
        self.mock.received_blobs.read().clone()
    }

    pub fn received_envelopes(&self) -> usize {
        self.mock.received_envelopes.load(Ordering::SeqCst)
    }

    pub fn builder_unblind_calls(&self) -> usize {
        self.builder
            .as_ref()
            .map(|builder| builder.unblind_calls.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    pub fn stored_blobs_bundle(&self) -> Option<BlobsBundle<E>> {
        self.server.proposal_state.lock().blobs_bundle.clone()
    }

    pub fn broadcast_contains_block(&self, root: Hash256) -> bool {
        self.mock.broadcasts.read().iter().any(|message| {
            matches!(message, PubsubMessage::BeaconBlock(block) if block.canonical_root() == root)
        })
    }
}

fn dummy_block<E: EthSpec>(slot: Slot) -> SignedBeaconBlock<E> {
    use types::{BeaconBlockBase, BeaconBlockBodyBase, Eth1Data};
    SignedBeaconBlock::from_block(
        BeaconBlock::Base(BeaconBlockBase {
            slot,
            proposer_index: 0,
            parent_root: Hash256::ZERO,
            state_root: Hash256::ZERO,
            body: BeaconBlockBodyBase {
                randao_reveal: SignatureBytes::empty(),
                eth1_data: Eth1Data::default(),
                graffiti: Graffiti::ZERO,
                proposer_slashings: Default::default(),
                attester_slashings: Default::default(),
                attestations: Default::default(),
                deposits: Default::default(),
                voluntary_exits: Default::default(),
            },
        }),
        SignatureBytes::empty(),
    )
}
