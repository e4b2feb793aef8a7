use crate::EthSpec;
use bls::PublicKeyBytes;
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use ssz_types::FixedVector;
use tree_hash_derive::TreeHash;

/// The rotating committee signing over the head each slot (post-Altair).
///
/// Members are listed by pubkey and may repeat; a validator's subcommittee
/// assignments are the positions it occupies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode, TreeHash)]
#[serde(bound = "E: EthSpec")]
pub struct SyncCommittee<E: EthSpec> {
    pub pubkeys: FixedVector<PublicKeyBytes, E::SyncCommitteeSize>,
    pub aggregate_pubkey: PublicKeyBytes,
}

impl<E: EthSpec> SyncCommittee<E> {
    /// A committee of all-empty pubkeys, for pre-computation states.
    pub fn naive() -> Self {
        Self {
            pubkeys: FixedVector::from_elem(PublicKeyBytes::empty()),
            aggregate_pubkey: PublicKeyBytes::empty(),
        }
    }

    pub fn contains(&self, pubkey: &PublicKeyBytes) -> bool {
        self.pubkeys.iter().any(|member| member == pubkey)
    }

    /// All positions `pubkey` occupies in the committee.
    pub fn positions_of(&self, pubkey: &PublicKeyBytes) -> Vec<usize> {
        self.pubkeys
            .iter()
            .enumerate()
            .filter_map(|(position, member)| (member == pubkey).then_some(position))
            .collect()
    }

    /// The subcommittees (of `E::SyncSubcommitteeSize` members each) that
    /// `pubkey` belongs to.
    pub fn subcommittee_indices_of(&self, pubkey: &PublicKeyBytes) -> Vec<u64> {
        let mut subcommittees: Vec<u64> = self
            .positions_of(pubkey)
            .into_iter()
            .map(|position| (position / E::sync_subcommittee_size()) as u64)
            .collect();
        subcommittees.dedup();
        subcommittees
    }
}
