use crate::Epoch;
use ssz_types::typenum::{
    U1, U2, U4, U8, U10, U16, U17, U32, U64, U128, U256, U512, U2048, U4096, U8192, U131072, U65536,
    U1048576, U1073741824, U1099511627776, Unsigned,
};
use std::fmt::Debug;

/// Compile-time constants of a network preset.
///
/// The unsigned-integer associated types parameterize the `ssz_types`
/// containers; the accessor functions are what most code calls.
pub trait EthSpec:
    'static + Default + Sync + Send + Clone + Debug + PartialEq + Eq + std::hash::Hash
{
    type SlotsPerEpoch: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    type SlotsPerHistoricalRoot: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    type EpochsPerEth1VotingPeriod: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    /// `EpochsPerEth1VotingPeriod * SlotsPerEpoch`, the bound of the
    /// eth1-data vote list.
    type SlotsPerEth1VotingPeriod: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    type EpochsPerHistoricalVector: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    type MaxValidatorsPerCommittee: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    type MaxCommitteesPerSlot: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    /// `MaxValidatorsPerCommittee * MaxCommitteesPerSlot`, the width of an
    /// Electra aggregation bitfield.
    type MaxValidatorsPerSlot: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    type ValidatorRegistryLimit: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    type SyncCommitteeSize: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    type SyncSubcommitteeSize: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    /*
     * Block body lengths.
     */
    type MaxProposerSlashings: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    type MaxAttesterSlashings: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    type MaxAttestations: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    type MaxDeposits: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    type MaxVoluntaryExits: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    type MaxBlsToExecutionChanges: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    type MaxAttesterSlashingsElectra: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    type MaxAttestationsElectra: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    /*
     * Execution payload lengths.
     */
    type MaxBytesPerTransaction: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    type MaxTransactionsPerPayload: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    type BytesPerLogsBloom: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    type MaxExtraDataBytes: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    type MaxWithdrawalsPerPayload: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    /*
     * Blobs.
     */
    type MaxBlobCommitmentsPerBlock: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    type BytesPerBlob: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    type KzgCommitmentInclusionProofDepth: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    /// The payload-timeliness-committee size (enshrined PBS).
    type PtcSize: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;

    fn slots_per_epoch() -> u64 {
        Self::SlotsPerEpoch::to_u64()
    }

    fn slots_per_historical_root() -> usize {
        Self::SlotsPerHistoricalRoot::to_usize()
    }

    fn epochs_per_eth1_voting_period() -> u64 {
        Self::EpochsPerEth1VotingPeriod::to_u64()
    }

    /// The number of slots eth1 votes are collected over.
    fn slots_per_eth1_voting_period() -> u64 {
        Self::epochs_per_eth1_voting_period() * Self::slots_per_epoch()
    }

    fn max_validators_per_committee() -> usize {
        Self::MaxValidatorsPerCommittee::to_usize()
    }

    fn max_committees_per_slot() -> usize {
        Self::MaxCommitteesPerSlot::to_usize()
    }

    fn sync_committee_size() -> usize {
        Self::SyncCommitteeSize::to_usize()
    }

    fn sync_subcommittee_size() -> usize {
        Self::SyncSubcommitteeSize::to_usize()
    }

    fn max_blobs_per_block() -> usize {
        Self::MaxBlobCommitmentsPerBlock::to_usize()
    }

    fn kzg_commitment_inclusion_proof_depth() -> usize {
        Self::KzgCommitmentInclusionProofDepth::to_usize()
    }

    /// The epoch a slot's committee shuffling was decided: the epoch prior.
    fn shuffling_epoch(epoch: Epoch) -> Epoch {
        epoch.saturating_sub(1u64)
    }
}

/// Ethereum Foundation specification ("mainnet" preset).
#[derive(Clone, PartialEq, Eq, Debug, Default, Hash, serde::Serialize, serde::Deserialize)]
pub struct MainnetEthSpec;

impl EthSpec for MainnetEthSpec {
    type SlotsPerEpoch = U32;
    type SlotsPerHistoricalRoot = U8192;
    type EpochsPerEth1VotingPeriod = U64;
    type SlotsPerEth1VotingPeriod = U2048;
    type EpochsPerHistoricalVector = U65536;
    type MaxValidatorsPerCommittee = U2048;
    type MaxCommitteesPerSlot = U64;
    type MaxValidatorsPerSlot = U131072;
    type ValidatorRegistryLimit = U1099511627776;
    type SyncCommitteeSize = U512;
    type SyncSubcommitteeSize = U128;
    type MaxProposerSlashings = U16;
    type MaxAttesterSlashings = U2;
    type MaxAttestations = U128;
    type MaxDeposits = U16;
    type MaxVoluntaryExits = U16;
    type MaxBlsToExecutionChanges = U16;
    type MaxAttesterSlashingsElectra = U1;
    type MaxAttestationsElectra = U8;
    type MaxBytesPerTransaction = U1073741824;
    type MaxTransactionsPerPayload = U1048576;
    type BytesPerLogsBloom = U256;
    type MaxExtraDataBytes = U32;
    type MaxWithdrawalsPerPayload = U16;
    type MaxBlobCommitmentsPerBlock = U4096;
    type BytesPerBlob = U131072;
    type KzgCommitmentInclusionProofDepth = U17;
    type PtcSize = U512;
}

/// Specification for the "minimal" preset used in tests.
#[derive(Clone, PartialEq, Eq, Debug, Default, Hash, serde::Serialize, serde::Deserialize)]
pub struct MinimalEthSpec;

impl EthSpec for MinimalEthSpec {
    type SlotsPerEpoch = U8;
    type SlotsPerHistoricalRoot = U64;
    type EpochsPerEth1VotingPeriod = U4;
    type SlotsPerEth1VotingPeriod = U32;
    type EpochsPerHistoricalVector = U64;
    type MaxValidatorsPerCommittee = U2048;
    type MaxCommitteesPerSlot = U4;
    type MaxValidatorsPerSlot = U8192;
    type ValidatorRegistryLimit = U1099511627776;
    type SyncCommitteeSize = U32;
    type SyncSubcommitteeSize = U8;
    type MaxProposerSlashings = U16;
    type MaxAttesterSlashings = U2;
    type MaxAttestations = U128;
    type MaxDeposits = U16;
    type MaxVoluntaryExits = U16;
    type MaxBlsToExecutionChanges = U16;
    type MaxAttesterSlashingsElectra = U1;
    type MaxAttestationsElectra = U8;
    type MaxBytesPerTransaction = U1073741824;
    type MaxTransactionsPerPayload = U1048576;
    type BytesPerLogsBloom = U256;
    type MaxExtraDataBytes = U32;
    type MaxWithdrawalsPerPayload = U4;
    type MaxBlobCommitmentsPerBlock = U32;
    type BytesPerBlob = U131072;
    type KzgCommitmentInclusionProofDepth = U10;
    type PtcSize = U8;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mainnet_preset_values() {
        assert_eq!(MainnetEthSpec::slots_per_epoch(), 32);
        assert_eq!(MainnetEthSpec::slots_per_historical_root(), 8192);
        assert_eq!(MainnetEthSpec::slots_per_eth1_voting_period(), 2048);
        assert_eq!(MainnetEthSpec::sync_committee_size(), 512);
    }

    #[test]
    fn minimal_preset_values() {
        assert_eq!(MinimalEthSpec::slots_per_epoch(), 8);
        assert_eq!(MinimalEthSpec::max_committees_per_slot(), 4);
    }

    #[test]
    fn inclusion_proof_depth_matches_commitment_bound() {
        // depth = log2(max commitments) + 1 (length mixin) + 4 (body fields).
        let mainnet = (MainnetEthSpec::max_blobs_per_block() as u64).ilog2() as usize + 1 + 4;
        assert_eq!(
            MainnetEthSpec::kzg_commitment_inclusion_proof_depth(),
            mainnet
        );
        let minimal = (MinimalEthSpec::max_blobs_per_block() as u64).ilog2() as usize + 1 + 4;
        assert_eq!(
            MinimalEthSpec::kzg_commitment_inclusion_proof_depth(),
            minimal
        );
    }
}
