use crate::{AttestationData, EthSpec};
use bls::AggregateSignature;
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use ssz_types::VariableList;
use superstruct::superstruct;
use tree_hash_derive::TreeHash;

/// An attestation with its committee bitfield resolved to validator indices,
/// the form slashing evidence is exchanged in.
#[superstruct(
    variants(Base, Electra),
    variant_attributes(
        derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode, TreeHash),
        serde(bound = "E: EthSpec", deny_unknown_fields),
    )
)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, TreeHash)]
#[serde(untagged, bound = "E: EthSpec")]
#[ssz(enum_behaviour = "transparent")]
#[tree_hash(enum_behaviour = "transparent")]
pub struct IndexedAttestation<E: EthSpec> {
    #[superstruct(only(Base), partial_getter(rename = "attesting_indices_base"))]
    pub attesting_indices: VariableList<u64, E::MaxValidatorsPerCommittee>,
    #[superstruct(only(Electra), partial_getter(rename = "attesting_indices_electra"))]
    pub attesting_indices: VariableList<u64, E::MaxValidatorsPerSlot>,
    pub data: AttestationData,
    pub signature: AggregateSignature,
}

impl<E: EthSpec> IndexedAttestation<E> {
    pub fn attesting_indices_iter(&self) -> impl Iterator<Item = &u64> {
        match self {
            IndexedAttestation::Base(att) => att.attesting_indices.iter(),
            IndexedAttestation::Electra(att) => att.attesting_indices.iter(),
        }
    }

    /// Double vote or surround vote per the slashing conditions.
    pub fn is_slashable_with(&self, other: &Self) -> bool {
        let (a, b) = (self.data(), other.data());
        let double_vote = a != b && a.target.epoch == b.target.epoch;
        let surround_vote =
            a.source.epoch < b.source.epoch && b.target.epoch < a.target.epoch;
        double_vote || surround_vote
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Checkpoint, Epoch, Hash256, MainnetEthSpec, Slot};

    type E = MainnetEthSpec;

    fn indexed(source: u64, target: u64, root: u8) -> IndexedAttestation<E> {
        IndexedAttestation::Base(IndexedAttestationBase {
            attesting_indices: VariableList::new(vec![0, 1, 2]).unwrap(),
            data: AttestationData {
                slot: Epoch::new(target).start_slot(32),
                index: 0,
                beacon_block_root: Hash256::repeat_byte(root),
                source: Checkpoint {
                    epoch: Epoch::new(source),
                    root: Hash256::ZERO,
                },
                target: Checkpoint {
                    epoch: Epoch::new(target),
                    root: Hash256::repeat_byte(root),
                },
            },
            signature: AggregateSignature::empty(),
        })
    }

    #[test]
    fn double_vote_is_slashable() {
        let a = indexed(0, 2, 0xaa);
        let b = indexed(0, 2, 0xbb);
        assert!(a.is_slashable_with(&b));
    }

    #[test]
    fn surround_vote_is_slashable() {
        let surrounding = indexed(0, 5, 0xaa);
        let surrounded = indexed(1, 4, 0xbb);
        assert!(surrounding.is_slashable_with(&surrounded));
        // The surrounded attestation does not surround back.
        assert!(!surrounded.is_slashable_with(&surrounding));
    }

    #[test]
    fn same_attestation_not_slashable() {
        let a = indexed(0, 2, 0xaa);
        assert!(!a.is_slashable_with(&a.clone()));
    }

    #[test]
    fn disjoint_epochs_not_slashable() {
        let a = indexed(0, 2, 0xaa);
        let b = indexed(2, 3, 0xbb);
        assert!(!a.is_slashable_with(&b));
    }

    #[test]
    fn slot_mismatch_same_target_still_double_vote() {
        let a = indexed(0, 2, 0xaa);
        let mut b = indexed(0, 2, 0xaa);
        if let IndexedAttestation::Base(inner) = &mut b {
            inner.data.slot = inner.data.slot + 1;
        }
        assert!(a.is_slashable_with(&b));
    }
}
