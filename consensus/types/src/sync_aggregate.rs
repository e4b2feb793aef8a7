use crate::{EthSpec, SyncCommitteeContribution};
use bls::AggregateSignature;
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use ssz_types::BitVector;
use tree_hash_derive::TreeHash;

/// The sync-committee participation carried in a block body (post-Altair).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode, TreeHash)]
#[serde(bound = "E: EthSpec")]
pub struct SyncAggregate<E: EthSpec> {
    pub sync_committee_bits: BitVector<E::SyncCommitteeSize>,
    pub sync_committee_signature: AggregateSignature,
}

impl<E: EthSpec> SyncAggregate<E> {
    /// An aggregate with no participation, valid for inclusion when the
    /// contribution pool is empty.
    pub fn new() -> Self {
        Self {
            sync_committee_bits: BitVector::new(),
            sync_committee_signature: AggregateSignature::empty(),
        }
    }

    /// Project a subcommittee contribution's bits onto the full-committee
    /// bitfield. The signature is carried as-is when this is the only
    /// contribution; combining signatures is the signing backend's job.
    pub fn from_contributions(
        contributions: &[SyncCommitteeContribution<E>],
    ) -> Result<Self, ssz_types::Error> {
        let mut sync_committee_bits = BitVector::new();
        let subcommittee_size = E::sync_subcommittee_size();
        for contribution in contributions {
            for (position, participated) in contribution.aggregation_bits.iter().enumerate() {
                if participated {
                    sync_committee_bits
                        .set(
                            contribution.subcommittee_index as usize * subcommittee_size
                                + position,
                            true,
                        )
                        .map_err(|e| match e {
                            ssz::BitfieldError::OutOfBounds { i, len } => {
                                ssz_types::Error::OutOfBounds { i, len }
                            }
                            ssz::BitfieldError::MissingLengthInformation => {
                                ssz_types::Error::MissingLengthInformation
                            }
                            ssz::BitfieldError::ExcessBits => ssz_types::Error::ExcessBits,
                            ssz::BitfieldError::InvalidByteCount { given, expected } => {
                                ssz_types::Error::InvalidByteCount { given, expected }
                            }
                        })?;
                }
            }
        }
        let sync_committee_signature = contributions
            .first()
            .map(|contribution| contribution.signature)
            .unwrap_or_else(AggregateSignature::empty);
        Ok(Self {
            sync_committee_bits,
            sync_committee_signature,
        })
    }

    pub fn num_set_bits(&self) -> usize {
        self.sync_committee_bits.num_set_bits()
    }
}

impl<E: EthSpec> Default for SyncAggregate<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Hash256, MinimalEthSpec, Slot};

    type E = MinimalEthSpec;

    #[test]
    fn empty_aggregate_has_no_bits() {
        assert_eq!(SyncAggregate::<E>::new().num_set_bits(), 0);
    }

    #[test]
    fn contribution_bits_project_into_subcommittee_window() {
        let mut contribution = SyncCommitteeContribution::<E> {
            slot: Slot::new(1),
            beacon_block_root: Hash256::ZERO,
            subcommittee_index: 2,
            aggregation_bits: BitVector::new(),
            signature: AggregateSignature::empty(),
        };
        contribution.aggregation_bits.set(1, true).unwrap();
        contribution.aggregation_bits.set(5, true).unwrap();

        let aggregate = SyncAggregate::from_contributions(&[contribution]).unwrap();
        // Subcommittee 2 on minimal covers positions 16..24.
        assert!(aggregate.sync_committee_bits.get(17).unwrap());
        assert!(aggregate.sync_committee_bits.get(21).unwrap());
        assert_eq!(aggregate.num_set_bits(), 2);
    }
}
