use crate::{AttestationData, EthSpec, SignedRoot};
use bls::AggregateSignature;
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use ssz_types::{BitList, BitVector};
use superstruct::superstruct;
use tree_hash_derive::TreeHash;

#[derive(Debug, PartialEq, Clone)]
pub enum Error {
    SszTypesError(ssz_types::Error),
    /// An Electra attestation whose `committee_bits` does not have exactly
    /// one bit set.
    InvalidCommitteeLength,
    /// An Electra attestation whose `data.index` is non-zero.
    InvalidCommitteeIndex,
}

impl From<ssz_types::Error> for Error {
    fn from(e: ssz_types::Error) -> Self {
        Error::SszTypesError(e)
    }
}

/// A validator vote for a head block and its source/target checkpoints.
///
/// Electra moved the committee index out of `AttestationData` and into a
/// dedicated `committee_bits` field; `data.index` must be zero there. The
/// accessors on the enum branch once so callers never match on the shape.
#[superstruct(
    variants(Base, Electra),
    variant_attributes(
        derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode, TreeHash),
        serde(bound = "E: EthSpec", deny_unknown_fields),
    ),
    ref_attributes(derive(Debug))
)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, TreeHash)]
#[serde(untagged, bound = "E: EthSpec")]
#[ssz(enum_behaviour = "transparent")]
#[tree_hash(enum_behaviour = "transparent")]
pub struct Attestation<E: EthSpec> {
    #[superstruct(only(Base), partial_getter(rename = "aggregation_bits_base"))]
    pub aggregation_bits: BitList<E::MaxValidatorsPerCommittee>,
    #[superstruct(only(Electra), partial_getter(rename = "aggregation_bits_electra"))]
    pub aggregation_bits: BitList<E::MaxValidatorsPerSlot>,
    pub data: AttestationData,
    #[superstruct(only(Electra))]
    pub committee_bits: BitVector<E::MaxCommitteesPerSlot>,
    pub signature: AggregateSignature,
}

impl<E: EthSpec> SignedRoot for Attestation<E> {}

impl<E: EthSpec> Attestation<E> {
    /// The committee this attestation belongs to, when it names exactly one.
    pub fn committee_index(&self) -> Option<u64> {
        match self {
            Attestation::Base(att) => Some(att.data.index),
            Attestation::Electra(att) => att.committee_index(),
        }
    }

    pub fn num_set_aggregation_bits(&self) -> usize {
        match self {
            Attestation::Base(att) => att.aggregation_bits.num_set_bits(),
            Attestation::Electra(att) => att.aggregation_bits.num_set_bits(),
        }
    }

    pub fn is_aggregation_bits_zero(&self) -> bool {
        self.num_set_aggregation_bits() == 0
    }

    /// Equality over everything except the signature, the basis for pool
    /// deduplication.
    pub fn matches_modulo_signature(&self, other: &Self) -> bool {
        match (self, other) {
            (Attestation::Base(a), Attestation::Base(b)) => {
                a.data == b.data && a.aggregation_bits == b.aggregation_bits
            }
            (Attestation::Electra(a), Attestation::Electra(b)) => {
                a.data == b.data
                    && a.aggregation_bits == b.aggregation_bits
                    && a.committee_bits == b.committee_bits
            }
            _ => false,
        }
    }
}

impl<E: EthSpec> AttestationElectra<E> {
    pub fn get_committee_indices(&self) -> Vec<u64> {
        self.committee_bits
            .iter()
            .enumerate()
            .filter_map(|(index, bit)| if bit { Some(index as u64) } else { None })
            .collect()
    }

    pub fn committee_index(&self) -> Option<u64> {
        self.get_committee_indices().first().copied()
    }

    /// Enforce the Electra shape rules: a zero `data.index` and exactly one
    /// committee bit.
    pub fn verify_committee_bits(&self) -> Result<(), Error> {
        if self.data.index != 0 {
            return Err(Error::InvalidCommitteeIndex);
        }
        if self.committee_bits.num_set_bits() != 1 {
            return Err(Error::InvalidCommitteeLength);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Checkpoint, Epoch, Hash256, MainnetEthSpec, Slot};

    type E = MainnetEthSpec;

    fn attestation_data(committee_index: u64) -> AttestationData {
        AttestationData {
            slot: Slot::new(1),
            index: committee_index,
            beacon_block_root: Hash256::repeat_byte(0xaa),
            source: Checkpoint::default(),
            target: Checkpoint {
                epoch: Epoch::new(0),
                root: Hash256::repeat_byte(0xbb),
            },
        }
    }

    fn base_attestation(committee_index: u64) -> Attestation<E> {
        Attestation::Base(AttestationBase {
            aggregation_bits: BitList::with_capacity(8).unwrap(),
            data: attestation_data(committee_index),
            signature: AggregateSignature::empty(),
        })
    }

    fn electra_attestation(committee_bit: Option<usize>) -> AttestationElectra<E> {
        let mut committee_bits = BitVector::new();
        if let Some(bit) = committee_bit {
            committee_bits.set(bit, true).unwrap();
        }
        AttestationElectra {
            aggregation_bits: BitList::with_capacity(8).unwrap(),
            data: attestation_data(0),
            committee_bits,
            signature: AggregateSignature::empty(),
        }
    }

    #[test]
    fn base_committee_index_comes_from_data() {
        assert_eq!(base_attestation(5).committee_index(), Some(5));
    }

    #[test]
    fn electra_committee_index_comes_from_bits() {
        let att = electra_attestation(Some(9));
        assert_eq!(att.committee_index(), Some(9));
        assert!(att.verify_committee_bits().is_ok());
    }

    #[test]
    fn electra_rejects_zero_committee_bits() {
        let att = electra_attestation(None);
        assert_eq!(att.committee_index(), None);
        assert_eq!(
            att.verify_committee_bits(),
            Err(Error::InvalidCommitteeLength)
        );
    }

    #[test]
    fn electra_rejects_multiple_committee_bits() {
        let mut att = electra_attestation(Some(1));
        att.committee_bits.set(2, true).unwrap();
        assert_eq!(
            att.verify_committee_bits(),
            Err(Error::InvalidCommitteeLength)
        );
    }

    #[test]
    fn electra_rejects_nonzero_data_index() {
        let mut att = electra_attestation(Some(1));
        att.data.index = 3;
        assert_eq!(
            att.verify_committee_bits(),
            Err(Error::InvalidCommitteeIndex)
        );
    }

    #[test]
    fn set_bits_counted() {
        let mut att = electra_attestation(Some(0));
        att.aggregation_bits.set(1, true).unwrap();
        att.aggregation_bits.set(4, true).unwrap();
        let att = Attestation::Electra(att);
        assert_eq!(att.num_set_aggregation_bits(), 2);
        assert!(!att.is_aggregation_bits_zero());
    }

    #[test]
    fn dedup_ignores_signature() {
        let a = base_attestation(1);
        let mut b = base_attestation(1);
        assert!(a.matches_modulo_signature(&b));
        if let Attestation::Base(inner) = &mut b {
            inner.aggregation_bits.set(0, true).unwrap();
        }
        assert!(!a.matches_modulo_signature(&b));
    }
}
