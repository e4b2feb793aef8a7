use crate::{Epoch, EthSpec, Fork, ForkData, ForkName, Hash256, Slot};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tree_hash::TreeHash;

/// The signature domains.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum Domain {
    BeaconProposer,
    BeaconAttester,
    Randao,
    Deposit,
    VoluntaryExit,
    SelectionProof,
    AggregateAndProof,
    SyncCommittee,
    SyncCommitteeSelectionProof,
    ContributionAndProof,
    BlsToExecutionChange,
    ApplicationBuilder,
    PtcAttester,
}

impl Domain {
    /// The 4-byte domain type, little-endian encoding of the constant.
    pub fn domain_type(self) -> [u8; 4] {
        let id: u32 = match self {
            Domain::BeaconProposer => 0,
            Domain::BeaconAttester => 1,
            Domain::Randao => 2,
            Domain::Deposit => 3,
            Domain::VoluntaryExit => 4,
            Domain::SelectionProof => 5,
            Domain::AggregateAndProof => 6,
            Domain::SyncCommittee => 7,
            Domain::SyncCommitteeSelectionProof => 8,
            Domain::ContributionAndProof => 9,
            Domain::BlsToExecutionChange => 10,
            Domain::ApplicationBuilder => 0x00000001 | 0x00010000,
            Domain::PtcAttester => 12,
        };
        id.to_le_bytes()
    }
}

/// Runtime configuration: fork schedule, timing, subnet layout and the
/// builder circuit-breaker windows.
///
/// Values that vary between presets carry both mainnet and minimal
/// constructors; everything is an ordinary field so tests can override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainSpec {
    pub config_name: Option<String>,

    /*
     * Time parameters.
     */
    pub seconds_per_slot: u64,
    pub genesis_slot: Slot,
    /// The tolerated clock skew when validating request slots against the
    /// wall clock, in milliseconds.
    pub maximum_gossip_clock_disparity_millis: u64,

    /*
     * Fork schedule. `None` means the fork is not scheduled.
     */
    #[serde(with = "serde_utils::bytes_4_hex")]
    pub genesis_fork_version: [u8; 4],
    pub altair_fork_epoch: Option<Epoch>,
    #[serde(with = "serde_utils::bytes_4_hex")]
    pub altair_fork_version: [u8; 4],
    pub bellatrix_fork_epoch: Option<Epoch>,
    #[serde(with = "serde_utils::bytes_4_hex")]
    pub bellatrix_fork_version: [u8; 4],
    pub capella_fork_epoch: Option<Epoch>,
    #[serde(with = "serde_utils::bytes_4_hex")]
    pub capella_fork_version: [u8; 4],
    pub deneb_fork_epoch: Option<Epoch>,
    #[serde(with = "serde_utils::bytes_4_hex")]
    pub deneb_fork_version: [u8; 4],
    pub electra_fork_epoch: Option<Epoch>,
    #[serde(with = "serde_utils::bytes_4_hex")]
    pub electra_fork_version: [u8; 4],
    /// Scheduled activation of enshrined proposer-builder separation.
    /// Gates the payload-envelope RPC surface; not a block-body fork here.
    pub epbs_fork_epoch: Option<Epoch>,

    /*
     * Committees and subnets.
     */
    pub attestation_subnet_count: u64,
    pub sync_committee_subnet_count: u64,
    pub target_committee_size: u64,
    pub shuffle_round_count: u8,
    pub epochs_per_sync_committee_period: u64,

    /*
     * Balances, used by proposer sampling.
     */
    pub max_effective_balance: u64,
    pub effective_balance_increment: u64,
    /// Minimum epochs a validator must serve before a voluntary exit.
    pub shard_committee_period: u64,

    /*
     * Builder circuit breaker.
     */
    pub max_builder_consecutive_missed_slots: u64,
    pub max_builder_epoch_missed_slots: u64,
}

impl ChainSpec {
    /// Ethereum Foundation mainnet configuration.
    pub fn mainnet() -> Self {
        Self {
            config_name: Some("mainnet".to_string()),
            seconds_per_slot: 12,
            genesis_slot: Slot::new(0),
            maximum_gossip_clock_disparity_millis: 500,
            genesis_fork_version: [0, 0, 0, 0],
            altair_fork_epoch: Some(Epoch::new(74240)),
            altair_fork_version: [1, 0, 0, 0],
            bellatrix_fork_epoch: Some(Epoch::new(144896)),
            bellatrix_fork_version: [2, 0, 0, 0],
            capella_fork_epoch: Some(Epoch::new(194048)),
            capella_fork_version: [3, 0, 0, 0],
            deneb_fork_epoch: Some(Epoch::new(269568)),
            deneb_fork_version: [4, 0, 0, 0],
            electra_fork_epoch: Some(Epoch::new(364032)),
            electra_fork_version: [5, 0, 0, 0],
            epbs_fork_epoch: None,
            attestation_subnet_count: 64,
            sync_committee_subnet_count: 4,
            target_committee_size: 128,
            shuffle_round_count: 90,
            epochs_per_sync_committee_period: 256,
            max_effective_balance: 32_000_000_000,
            shard_committee_period: 256,
            effective_balance_increment: 1_000_000_000,
            max_builder_consecutive_missed_slots: 3,
            max_builder_epoch_missed_slots: 8,
        }
    }

    /// Configuration paired with `MinimalEthSpec` in tests.
    pub fn minimal() -> Self {
        Self {
            config_name: Some("minimal".to_string()),
            seconds_per_slot: 6,
            target_committee_size: 4,
            shuffle_round_count: 10,
            epochs_per_sync_committee_period: 8,
            shard_committee_period: 64,
            ..Self::mainnet()
        }
    }

    /// Returns a spec where every fork up to and including `fork_name`
    /// activates at genesis and later forks are unscheduled.
    pub fn make_genesis_spec(fork_name: ForkName, mut spec: ChainSpec) -> ChainSpec {
        let at_genesis = |fork: ForkName| (fork <= fork_name).then(|| Epoch::new(0));
        spec.altair_fork_epoch = at_genesis(ForkName::Altair);
        spec.bellatrix_fork_epoch = at_genesis(ForkName::Bellatrix);
        spec.capella_fork_epoch = at_genesis(ForkName::Capella);
        spec.deneb_fork_epoch = at_genesis(ForkName::Deneb);
        spec.electra_fork_epoch = at_genesis(ForkName::Electra);
        spec
    }

    pub fn maximum_gossip_clock_disparity(&self) -> Duration {
        Duration::from_millis(self.maximum_gossip_clock_disparity_millis)
    }

    /// The fork active at `epoch`.
    pub fn fork_name_at_epoch(&self, epoch: Epoch) -> ForkName {
        let scheduled = |fork_epoch: Option<Epoch>| fork_epoch.is_some_and(|e| epoch >= e);
        if scheduled(self.electra_fork_epoch) {
            ForkName::Electra
        } else if scheduled(self.deneb_fork_epoch) {
            ForkName::Deneb
        } else if scheduled(self.capella_fork_epoch) {
            ForkName::Capella
        } else if scheduled(self.bellatrix_fork_epoch) {
            ForkName::Bellatrix
        } else if scheduled(self.altair_fork_epoch) {
            ForkName::Altair
        } else {
            ForkName::Base
        }
    }

    pub fn fork_name_at_slot<E: EthSpec>(&self, slot: Slot) -> ForkName {
        self.fork_name_at_epoch(slot.epoch(E::slots_per_epoch()))
    }

    pub fn fork_version_for_name(&self, fork_name: ForkName) -> [u8; 4] {
        match fork_name {
            ForkName::Base => self.genesis_fork_version,
            ForkName::Altair => self.altair_fork_version,
            ForkName::Bellatrix => self.bellatrix_fork_version,
            ForkName::Capella => self.capella_fork_version,
            ForkName::Deneb => self.deneb_fork_version,
            ForkName::Electra => self.electra_fork_version,
        }
    }

    /// The `Fork` value a state at `epoch` would carry.
    pub fn fork_at_epoch(&self, epoch: Epoch) -> Fork {
        let current_fork = self.fork_name_at_epoch(epoch);
        let previous_fork = match current_fork {
            ForkName::Base => ForkName::Base,
            ForkName::Altair => ForkName::Base,
            ForkName::Bellatrix => ForkName::Altair,
            ForkName::Capella => ForkName::Bellatrix,
            ForkName::Deneb => ForkName::Capella,
            ForkName::Electra => ForkName::Deneb,
        };
        Fork {
            previous_version: self.fork_version_for_name(previous_fork),
            current_version: self.fork_version_for_name(current_fork),
            epoch: current_fork
                .activation_epoch(self)
                .unwrap_or_else(|| Epoch::new(0)),
        }
    }

    /// True when the slot's epoch is at or past the Bellatrix fork, i.e.
    /// the optimistic-execution status is meaningful.
    pub fn is_merge_transition_complete_at<E: EthSpec>(&self, slot: Slot) -> bool {
        self.bellatrix_fork_epoch
            .is_some_and(|fork_epoch| slot.epoch(E::slots_per_epoch()) >= fork_epoch)
    }

    pub fn is_epbs_scheduled(&self) -> bool {
        self.epbs_fork_epoch.is_some()
    }

    pub fn is_epbs_enabled_at(&self, epoch: Epoch) -> bool {
        self.epbs_fork_epoch.is_some_and(|fork_epoch| epoch >= fork_epoch)
    }

    /// Compute the domain for signing, mixing in the fork version active at
    /// `epoch` and the chain's genesis validators root.
    pub fn get_domain(
        &self,
        epoch: Epoch,
        domain: Domain,
        fork: &Fork,
        genesis_validators_root: Hash256,
    ) -> Hash256 {
        let fork_version = fork.get_fork_version(epoch);
        self.compute_domain(domain, fork_version, genesis_validators_root)
    }

    /// `DomainData` for builder registrations, which always uses the
    /// genesis fork version and an empty genesis validators root.
    pub fn get_builder_domain(&self) -> Hash256 {
        self.compute_domain(
            Domain::ApplicationBuilder,
            self.genesis_fork_version,
            Hash256::ZERO,
        )
    }

    pub fn compute_domain(
        &self,
        domain: Domain,
        fork_version: [u8; 4],
        genesis_validators_root: Hash256,
    ) -> Hash256 {
        let fork_data_root = ForkData {
            current_version: fork_version,
            genesis_validators_root,
        }
        .tree_hash_root();

        let mut domain_bytes = [0; 32];
        domain_bytes[..4].copy_from_slice(&domain.domain_type());
        domain_bytes[4..].copy_from_slice(&fork_data_root.as_slice()[..28]);
        Hash256::from_slice(&domain_bytes)
    }
}

impl Default for ChainSpec {
    fn default() -> Self {
        ChainSpec::mainnet()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MainnetEthSpec;

    #[test]
    fn fork_name_progression() {
        let spec = ChainSpec::mainnet();
        assert_eq!(spec.fork_name_at_epoch(Epoch::new(0)), ForkName::Base);
        assert_eq!(spec.fork_name_at_epoch(Epoch::new(74240)), ForkName::Altair);
        assert_eq!(
            spec.fork_name_at_epoch(Epoch::new(364032)),
            ForkName::Electra
        );
    }

    #[test]
    fn genesis_spec_truncates_schedule() {
        let spec = ChainSpec::make_genesis_spec(ForkName::Capella, ChainSpec::minimal());
        assert_eq!(spec.capella_fork_epoch, Some(Epoch::new(0)));
        assert_eq!(spec.deneb_fork_epoch, None);
        assert_eq!(spec.fork_name_at_epoch(Epoch::new(0)), ForkName::Capella);
    }

    #[test]
    fn merge_transition_gate() {
        let mut spec = ChainSpec::make_genesis_spec(ForkName::Base, ChainSpec::minimal());
        assert!(!spec.is_merge_transition_complete_at::<MainnetEthSpec>(Slot::new(100)));
        spec.bellatrix_fork_epoch = Some(Epoch::new(2));
        assert!(!spec.is_merge_transition_complete_at::<MainnetEthSpec>(Slot::new(32)));
        assert!(spec.is_merge_transition_complete_at::<MainnetEthSpec>(Slot::new(64)));
    }

    #[test]
    fn domains_differ_by_type_and_fork() {
        let spec = ChainSpec::mainnet();
        let fork = spec.fork_at_epoch(Epoch::new(0));
        let gvr = Hash256::repeat_byte(0x42);
        let attester = spec.get_domain(Epoch::new(0), Domain::BeaconAttester, &fork, gvr);
        let proposer = spec.get_domain(Epoch::new(0), Domain::BeaconProposer, &fork, gvr);
        assert_ne!(attester, proposer);
        assert_eq!(&attester.as_slice()[..4], &[1, 0, 0, 0]);

        let other_chain = spec.get_domain(
            Epoch::new(0),
            Domain::BeaconAttester,
            &fork,
            Hash256::repeat_byte(0x43),
        );
        assert_ne!(attester, other_chain);
    }
}
