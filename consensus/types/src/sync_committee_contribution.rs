use crate::{EthSpec, Hash256, SignedRoot, Slot};
use bls::{AggregateSignature, SignatureBytes};
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use ssz_types::BitVector;
use tree_hash_derive::TreeHash;

/// An aggregation of sync-committee messages for one subcommittee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode, TreeHash)]
#[serde(bound = "E: EthSpec")]
pub struct SyncCommitteeContribution<E: EthSpec> {
    pub slot: Slot,
    pub beacon_block_root: Hash256,
    #[serde(with = "serde_utils::quoted_u64")]
    pub subcommittee_index: u64,
    pub aggregation_bits: BitVector<E::SyncSubcommitteeSize>,
    pub signature: AggregateSignature,
}

impl<E: EthSpec> SyncCommitteeContribution<E> {
    pub fn num_set_bits(&self) -> usize {
        self.aggregation_bits.num_set_bits()
    }
}

impl<E: EthSpec> SignedRoot for SyncCommitteeContribution<E> {}

/// A contribution plus the aggregator's selection proof.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode, TreeHash)]
#[serde(bound = "E: EthSpec")]
pub struct ContributionAndProof<E: EthSpec> {
    #[serde(with = "serde_utils::quoted_u64")]
    pub aggregator_index: u64,
    pub contribution: SyncCommitteeContribution<E>,
    pub selection_proof: SignatureBytes,
}

impl<E: EthSpec> SignedRoot for ContributionAndProof<E> {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode, TreeHash)]
#[serde(bound = "E: EthSpec")]
pub struct SignedContributionAndProof<E: EthSpec> {
    pub message: ContributionAndProof<E>,
    pub signature: SignatureBytes,
}
