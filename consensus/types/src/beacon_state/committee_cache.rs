use crate::{
    BeaconState, BeaconStateError as Error, ChainSpec, Domain, Epoch, EthSpec, Slot,
    compute_committees_per_slot,
};
use serde::{Deserialize, Serialize};
use swap_or_not_shuffle::shuffle_list;

/// A validator's committee assignment for one epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitteeAssignment {
    /// The members of the committee, as validator indices.
    pub committee: Vec<usize>,
    pub committee_index: u64,
    /// The slot the committee attests in.
    pub attester_slot: Slot,
}

/// One committee of one slot, borrowing the cache's shuffling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeaconCommittee<'a> {
    pub slot: Slot,
    pub index: u64,
    pub committee: &'a [usize],
}

/// The shuffled committee layout of a single epoch.
///
/// Computed once per (state, epoch) and immutable afterwards.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitteeCache {
    initialized_epoch: Option<Epoch>,
    shuffling: Vec<usize>,
    committees_per_slot: u64,
    slots_per_epoch: u64,
}

impl CommitteeCache {
    /// Shuffle the active validators of `epoch` and lay them out into
    /// committees.
    pub fn initialized<E: EthSpec>(
        state: &BeaconState<E>,
        epoch: Epoch,
        spec: &ChainSpec,
    ) -> Result<Self, Error> {
        let active_validator_indices = state.get_active_validator_indices(epoch);
        if active_validator_indices.is_empty() {
            return Err(Error::InsufficientValidators);
        }

        let committees_per_slot =
            compute_committees_per_slot::<E>(active_validator_indices.len() as u64, spec);

        let seed = state.get_seed(epoch, Domain::BeaconAttester, spec)?;
        let shuffling = shuffle_list(
            active_validator_indices,
            spec.shuffle_round_count,
            seed.as_slice(),
            false,
        )
        .ok_or(Error::UnableToShuffle)?;

        Ok(Self {
            initialized_epoch: Some(epoch),
            shuffling,
            committees_per_slot,
            slots_per_epoch: E::slots_per_epoch(),
        })
    }

    pub fn is_initialized_at(&self, epoch: Epoch) -> bool {
        self.initialized_epoch == Some(epoch)
    }

    pub fn epoch(&self) -> Option<Epoch> {
        self.initialized_epoch
    }

    pub fn committees_per_slot(&self) -> u64 {
        self.committees_per_slot
    }

    pub fn active_validator_count(&self) -> usize {
        self.shuffling.len()
    }

    pub fn epoch_committee_count(&self) -> usize {
        (self.committees_per_slot * self.slots_per_epoch) as usize
    }

    /// The members of committee `index` at `slot`.
    pub fn get_beacon_committee(&self, slot: Slot, index: u64) -> Result<BeaconCommittee<'_>, Error> {
        let epoch = self
            .initialized_epoch
            .ok_or(Error::CommitteeCacheUninitialized)?;
        if slot.epoch(self.slots_per_epoch) != epoch {
            return Err(Error::SlotOutOfBounds);
        }
        if index >= self.committees_per_slot {
            return Err(Error::InvalidCommitteeIndex(index));
        }

        let committee_global_index =
            (slot % self.slots_per_epoch) * self.committees_per_slot + index;
        let committee = self.compute_committee(committee_global_index as usize)?;

        Ok(BeaconCommittee {
            slot,
            index,
            committee,
        })
    }

    /// Every committee of `slot`, in index order.
    pub fn get_beacon_committees_at_slot(&self, slot: Slot) -> Result<Vec<BeaconCommittee<'_>>, Error> {
        (0..self.committees_per_slot)
            .map(|index| self.get_beacon_committee(slot, index))
            .collect()
    }

    /// The committee assignment of `validator_index` in this epoch, if any.
    pub fn get_committee_assignment(
        &self,
        validator_index: usize,
    ) -> Option<CommitteeAssignment> {
        let epoch = self.initialized_epoch?;
        for slot in epoch.slot_iter(self.slots_per_epoch) {
            for index in 0..self.committees_per_slot {
                let committee = self.get_beacon_committee(slot, index).ok()?;
                if committee.committee.contains(&validator_index) {
                    return Some(CommitteeAssignment {
                        committee: committee.committee.to_vec(),
                        committee_index: index,
                        attester_slot: slot,
                    });
                }
            }
        }
        None
    }

    fn compute_committee(&self, index: usize) -> Result<&[usize], Error> {
        let count = self.epoch_committee_count();
        let len = self.shuffling.len();
        let start = (len * index) / count;
        let end = (len * (index + 1)) / count;
        self.shuffling.get(start..end).ok_or(Error::SlotOutOfBounds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MinimalEthSpec;
    use crate::test_utils::interop_state;

    type E = MinimalEthSpec;

    #[test]
    fn every_active_validator_sits_in_exactly_one_committee() {
        let spec = ChainSpec::minimal();
        let state = interop_state::<E>(64, &spec);
        let cache = CommitteeCache::initialized(&state, Epoch::new(0), &spec).unwrap();

        let mut seen = vec![0u32; 64];
        for slot in Epoch::new(0).slot_iter(E::slots_per_epoch()) {
            for committee in cache.get_beacon_committees_at_slot(slot).unwrap() {
                for &validator in committee.committee {
                    seen[validator] += 1;
                }
            }
        }
        assert!(seen.iter().all(|&count| count == 1));
    }

    #[test]
    fn assignment_matches_committee_lookup() {
        let spec = ChainSpec::minimal();
        let state = interop_state::<E>(64, &spec);
        let cache = CommitteeCache::initialized(&state, Epoch::new(0), &spec).unwrap();

        let assignment = cache.get_committee_assignment(7).unwrap();
        let committee = cache
            .get_beacon_committee(assignment.attester_slot, assignment.committee_index)
            .unwrap();
        assert!(committee.committee.contains(&7));
        assert_eq!(assignment.committee, committee.committee.to_vec());
    }

    #[test]
    fn wrong_epoch_slot_rejected() {
        let spec = ChainSpec::minimal();
        let state = interop_state::<E>(64, &spec);
        let cache = CommitteeCache::initialized(&state, Epoch::new(0), &spec).unwrap();
        assert_eq!(
            cache
                .get_beacon_committee(Epoch::new(1).start_slot(E::slots_per_epoch()), 0)
                .unwrap_err(),
            Error::SlotOutOfBounds
        );
    }

    #[test]
    fn out_of_range_committee_index_rejected() {
        let spec = ChainSpec::minimal();
        let state = interop_state::<E>(64, &spec);
        let cache = CommitteeCache::initialized(&state, Epoch::new(0), &spec).unwrap();
        let committees_per_slot = cache.committees_per_slot();
        assert_eq!(
            cache
                .get_beacon_committee(Slot::new(0), committees_per_slot)
                .unwrap_err(),
            Error::InvalidCommitteeIndex(committees_per_slot)
        );
    }

    #[test]
    fn no_active_validators_is_an_error() {
        let spec = ChainSpec::minimal();
        let mut state = interop_state::<E>(8, &spec);
        for validator in state.validators.iter_mut() {
            validator.activation_epoch = Epoch::new(10);
        }
        assert_eq!(
            CommitteeCache::initialized(&state, Epoch::new(0), &spec).unwrap_err(),
            Error::InsufficientValidators
        );
    }
}
