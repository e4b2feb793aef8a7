use crate::{EthSpec, IndexedAttestation};
use serde::{Deserialize, Serialize};
use ssz_derive::Encode;
use std::collections::BTreeSet;
use tree_hash_derive::TreeHash;

/// Two conflicting indexed attestations; validators present in both are
/// slashable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, TreeHash)]
#[serde(bound = "E: EthSpec")]
pub struct AttesterSlashing<E: EthSpec> {
    pub attestation_1: IndexedAttestation<E>,
    pub attestation_2: IndexedAttestation<E>,
}

impl<E: EthSpec> AttesterSlashing<E> {
    /// The validators attesting in both conflicting attestations.
    pub fn intersecting_indices(&self) -> Vec<u64> {
        let first: BTreeSet<u64> = self.attestation_1.attesting_indices_iter().copied().collect();
        self.attestation_2
            .attesting_indices_iter()
            .filter(|index| first.contains(index))
            .copied()
            .collect()
    }
}
