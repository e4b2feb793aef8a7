mod committee_cache;

pub use committee_cache::{BeaconCommittee, CommitteeAssignment, CommitteeCache};

use crate::{
    BeaconBlockHeader, ChainSpec, Checkpoint, Domain, Epoch, Eth1Data, EthSpec,
    ExecutionBlockHash, Fork, Hash256, RelativeEpoch, Slot, SyncCommittee,
    relative_epoch::Error as RelativeEpochError,
};
use bls::PublicKeyBytes;
use derivative::Derivative;
use ethereum_hashing::hash;
use safe_arith::ArithError;
use ssz_types::typenum::Unsigned;
use ssz_types::{FixedVector, VariableList};
use std::collections::HashMap;
use std::sync::Arc;
use swap_or_not_shuffle::compute_shuffled_index;

/// How far ahead the shuffling seed is decided, in epochs.
const MIN_SEED_LOOKAHEAD: u64 = 1;
const MAX_RANDOM_BYTE: u64 = u8::MAX as u64;

#[derive(Debug, PartialEq, Clone)]
pub enum Error {
    UnknownValidator(usize),
    SlotOutOfBounds,
    EpochOutOfBounds,
    InsufficientValidators,
    UnableToShuffle,
    InvalidCommitteeIndex(u64),
    CommitteeCacheUninitialized,
    RelativeEpochError(RelativeEpochError),
    SyncCommitteeNotKnown { current_epoch: Epoch, epoch: Epoch },
    ProposerSamplingDidNotConverge,
    ArithError(ArithError),
}

impl From<RelativeEpochError> for Error {
    fn from(e: RelativeEpochError) -> Self {
        Error::RelativeEpochError(e)
    }
}

impl From<ArithError> for Error {
    fn from(e: ArithError) -> Self {
        Error::ArithError(e)
    }
}

/// The beacon state, restricted to the view this workspace reads.
///
/// Post-Altair fields are always present; states for earlier forks carry
/// naive sync committees and empty participation lists. The full
/// state-transition machinery lives behind the `StateGen` trait, so this
/// container only answers queries: roots, committees, proposers, seeds.
#[derive(Debug, Clone, Derivative)]
#[derivative(PartialEq)]
pub struct BeaconState<E: EthSpec> {
    /*
     * Versioning
     */
    pub genesis_time: u64,
    pub genesis_validators_root: Hash256,
    pub slot: Slot,
    pub fork: Fork,
    /*
     * History
     */
    pub latest_block_header: BeaconBlockHeader,
    pub block_roots: FixedVector<Hash256, E::SlotsPerHistoricalRoot>,
    pub state_roots: FixedVector<Hash256, E::SlotsPerHistoricalRoot>,
    /*
     * Eth1
     */
    pub eth1_data: Eth1Data,
    pub eth1_data_votes: VariableList<Eth1Data, E::SlotsPerEth1VotingPeriod>,
    pub eth1_deposit_index: u64,
    /*
     * Registry
     */
    pub validators: VariableList<crate::Validator, E::ValidatorRegistryLimit>,
    pub balances: VariableList<u64, E::ValidatorRegistryLimit>,
    /*
     * Randomness
     */
    pub randao_mixes: FixedVector<Hash256, E::EpochsPerHistoricalVector>,
    /*
     * Participation (Altair and later)
     */
    pub previous_epoch_participation: VariableList<u8, E::ValidatorRegistryLimit>,
    pub current_epoch_participation: VariableList<u8, E::ValidatorRegistryLimit>,
    /*
     * Finality
     */
    pub previous_justified_checkpoint: Checkpoint,
    pub current_justified_checkpoint: Checkpoint,
    pub finalized_checkpoint: Checkpoint,
    /*
     * Sync committees (Altair and later)
     */
    pub current_sync_committee: Arc<SyncCommittee<E>>,
    pub next_sync_committee: Arc<SyncCommittee<E>>,
    /*
     * Execution (Bellatrix and later)
     */
    /// The block hash of the latest execution payload, i.e. the parent
    /// hash the engine builds the next payload on.
    pub latest_execution_block_hash: ExecutionBlockHash,
    /*
     * Caches, not part of the canonical state.
     */
    #[derivative(PartialEq = "ignore")]
    pub(crate) committee_caches: [CommitteeCache; 3],
    #[derivative(PartialEq = "ignore")]
    pub(crate) pubkey_cache: HashMap<PublicKeyBytes, usize>,
}

impl<E: EthSpec> BeaconState<E> {
    /// An empty state at the genesis slot, with the fork matching `spec`.
    pub fn new(genesis_time: u64, eth1_data: Eth1Data, spec: &ChainSpec) -> Self {
        Self {
            genesis_time,
            genesis_validators_root: Hash256::ZERO,
            slot: spec.genesis_slot,
            fork: spec.fork_at_epoch(Epoch::new(0)),
            latest_block_header: BeaconBlockHeader::default(),
            block_roots: FixedVector::default(),
            state_roots: FixedVector::default(),
            eth1_data,
            eth1_data_votes: VariableList::empty(),
            eth1_deposit_index: 0,
            validators: VariableList::empty(),
            balances: VariableList::empty(),
            randao_mixes: FixedVector::default(),
            previous_epoch_participation: VariableList::empty(),
            current_epoch_participation: VariableList::empty(),
            previous_justified_checkpoint: Checkpoint::default(),
            current_justified_checkpoint: Checkpoint::default(),
            finalized_checkpoint: Checkpoint::default(),
            current_sync_committee: Arc::new(SyncCommittee::naive()),
            next_sync_committee: Arc::new(SyncCommittee::naive()),
            latest_execution_block_hash: ExecutionBlockHash::zero(),
            committee_caches: [
                CommitteeCache::default(),
                CommitteeCache::default(),
                CommitteeCache::default(),
            ],
            pubkey_cache: HashMap::new(),
        }
    }

    pub fn current_epoch(&self) -> Epoch {
        self.slot.epoch(E::slots_per_epoch())
    }

    pub fn previous_epoch(&self) -> Epoch {
        self.current_epoch().saturating_sub(1u64)
    }

    pub fn next_epoch(&self) -> Epoch {
        self.current_epoch() + 1
    }

    /// Indices of validators active at `epoch`, in registry order.
    pub fn get_active_validator_indices(&self, epoch: Epoch) -> Vec<usize> {
        self.validators
            .iter()
            .enumerate()
            .filter_map(|(index, validator)| validator.is_active_at(epoch).then_some(index))
            .collect()
    }

    /// The block root at `slot`, which must be within the historical window
    /// and strictly before the state's slot.
    pub fn get_block_root(&self, slot: Slot) -> Result<Hash256, Error> {
        if slot >= self.slot || self.slot > slot + E::slots_per_historical_root() as u64 {
            return Err(Error::SlotOutOfBounds);
        }
        Ok(self.block_roots[slot.as_usize() % E::slots_per_historical_root()])
    }

    /// The block root at the start of `epoch`.
    pub fn get_block_root_at_epoch(&self, epoch: Epoch) -> Result<Hash256, Error> {
        self.get_block_root(epoch.start_slot(E::slots_per_epoch()))
    }

    pub fn get_randao_mix(&self, epoch: Epoch) -> Hash256 {
        let len = E::EpochsPerHistoricalVector::to_u64();
        self.randao_mixes[(epoch.as_u64() % len) as usize]
    }

    /// The shuffling seed for `epoch` under `domain`.
    pub fn get_seed(
        &self,
        epoch: Epoch,
        domain: Domain,
        _spec: &ChainSpec,
    ) -> Result<Hash256, Error> {
        let len = E::EpochsPerHistoricalVector::to_u64();
        let mix_epoch = Epoch::new(
            epoch
                .as_u64()
                .saturating_add(len)
                .saturating_sub(MIN_SEED_LOOKAHEAD + 1),
        );
        let mix = self.get_randao_mix(mix_epoch);

        let mut preimage = Vec::with_capacity(4 + 8 + 32);
        preimage.extend_from_slice(&domain.domain_type());
        preimage.extend_from_slice(&epoch.as_u64().to_le_bytes());
        preimage.extend_from_slice(mix.as_slice());
        Ok(Hash256::from_slice(&hash(&preimage)))
    }

    /// The committee count per slot for `epoch`, derived from the active
    /// validator count alone.
    pub fn get_committee_count_per_slot(&self, epoch: Epoch, spec: &ChainSpec) -> u64 {
        crate::compute_committees_per_slot::<E>(
            self.get_active_validator_indices(epoch).len() as u64,
            spec,
        )
    }

    /*
     * Committee caches.
     */

    pub fn build_committee_cache(
        &mut self,
        relative_epoch: RelativeEpoch,
        spec: &ChainSpec,
    ) -> Result<(), Error> {
        let epoch = relative_epoch.into_epoch(self.current_epoch());
        if !self.committee_caches[Self::cache_index(relative_epoch)].is_initialized_at(epoch) {
            let cache = CommitteeCache::initialized(self, epoch, spec)?;
            self.committee_caches[Self::cache_index(relative_epoch)] = cache;
        }
        Ok(())
    }

    pub fn build_all_committee_caches(&mut self, spec: &ChainSpec) -> Result<(), Error> {
        self.build_committee_cache(RelativeEpoch::Previous, spec)?;
        self.build_committee_cache(RelativeEpoch::Current, spec)?;
        self.build_committee_cache(RelativeEpoch::Next, spec)
    }

    pub fn committee_cache(&self, relative_epoch: RelativeEpoch) -> Result<&CommitteeCache, Error> {
        let cache = &self.committee_caches[Self::cache_index(relative_epoch)];
        if cache.is_initialized_at(relative_epoch.into_epoch(self.current_epoch())) {
            Ok(cache)
        } else {
            Err(Error::CommitteeCacheUninitialized)
        }
    }

    pub fn committee_cache_at_epoch(&self, epoch: Epoch) -> Result<&CommitteeCache, Error> {
        let relative_epoch = RelativeEpoch::from_epoch(self.current_epoch(), epoch)?;
        self.committee_cache(relative_epoch)
    }

    /// The members of committee `index` at `slot`. The matching cache must
    /// have been built.
    pub fn get_beacon_committee(
        &self,
        slot: Slot,
        index: u64,
    ) -> Result<BeaconCommittee<'_>, Error> {
        let relative_epoch =
            RelativeEpoch::from_slot(self.slot, slot, E::slots_per_epoch())?;
        self.committee_cache(relative_epoch)?
            .get_beacon_committee(slot, index)
    }

    fn cache_index(relative_epoch: RelativeEpoch) -> usize {
        match relative_epoch {
            RelativeEpoch::Previous => 0,
            RelativeEpoch::Current => 1,
            RelativeEpoch::Next => 2,
        }
    }

    /*
     * Proposers.
     */

    /// The proposer of `slot`, sampled by effective balance from the active
    /// set of the slot's epoch.
    pub fn get_beacon_proposer_index(&self, slot: Slot, spec: &ChainSpec) -> Result<usize, Error> {
        let epoch = slot.epoch(E::slots_per_epoch());
        let indices = self.get_active_validator_indices(epoch);
        if indices.is_empty() {
            return Err(Error::InsufficientValidators);
        }

        let epoch_seed = self.get_seed(epoch, Domain::BeaconProposer, spec)?;
        let mut preimage = Vec::with_capacity(32 + 8);
        preimage.extend_from_slice(epoch_seed.as_slice());
        preimage.extend_from_slice(&slot.as_u64().to_le_bytes());
        let seed = hash(&preimage);

        self.compute_proposer_index(&indices, &seed, spec)
    }

    fn compute_proposer_index(
        &self,
        indices: &[usize],
        seed: &[u8],
        spec: &ChainSpec,
    ) -> Result<usize, Error> {
        let total = indices.len();
        // Each iteration accepts with probability >= 1/32 for a non-empty
        // active set, so this bound is never reached in practice.
        let max_iterations = total.saturating_mul(256).max(4096);

        for i in 0..max_iterations {
            let shuffled = compute_shuffled_index(i % total, total, seed, spec.shuffle_round_count)
                .ok_or(Error::UnableToShuffle)?;
            let candidate = indices[shuffled];

            let mut preimage = Vec::with_capacity(seed.len() + 8);
            preimage.extend_from_slice(seed);
            preimage.extend_from_slice(&(i as u64 / 32).to_le_bytes());
            let random_byte = hash(&preimage)[i % 32] as u64;

            let effective_balance = self
                .validators
                .get(candidate)
                .ok_or(Error::UnknownValidator(candidate))?
                .effective_balance;
            if effective_balance * MAX_RANDOM_BYTE >= spec.max_effective_balance * random_byte {
                return Ok(candidate);
            }
        }
        Err(Error::ProposerSamplingDidNotConverge)
    }

    /*
     * Validator lookups.
     */

    /// Build the pubkey-to-index map. Call after mutating the registry.
    pub fn build_pubkey_cache(&mut self) {
        self.pubkey_cache = self
            .validators
            .iter()
            .enumerate()
            .map(|(index, validator)| (validator.pubkey, index))
            .collect();
    }

    /// Resolve a pubkey to its registry index. Falls back to a scan when
    /// the cache was never built.
    pub fn get_validator_index(&self, pubkey: &PublicKeyBytes) -> Option<usize> {
        if self.pubkey_cache.len() == self.validators.len() {
            self.pubkey_cache.get(pubkey).copied()
        } else {
            self.validators
                .iter()
                .position(|validator| &validator.pubkey == pubkey)
        }
    }

    /*
     * Sync committees.
     */

    /// The sync committee serving `epoch`, which must fall in the current
    /// or next sync-committee period.
    pub fn get_built_sync_committee(
        &self,
        epoch: Epoch,
        spec: &ChainSpec,
    ) -> Result<&Arc<SyncCommittee<E>>, Error> {
        let current_period = self.current_epoch().sync_committee_period(spec)?;
        let period = epoch.sync_committee_period(spec)?;

        if period == current_period {
            Ok(&self.current_sync_committee)
        } else if period == current_period + 1 {
            Ok(&self.next_sync_committee)
        } else {
            Err(Error::SyncCommitteeNotKnown {
                current_epoch: self.current_epoch(),
                epoch,
            })
        }
    }
}
