use crate::{ChainSpec, EthSpec, Slot};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An attestation gossip subnet, always below
/// `spec.attestation_subnet_count`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SubnetId(u64);

impl SubnetId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubnetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A sync-committee gossip subnet, always below
/// `spec.sync_committee_subnet_count`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SyncSubnetId(u64);

impl SyncSubnetId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SyncSubnetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The number of committees at each slot of an epoch with
/// `active_validator_count` active validators.
pub fn compute_committees_per_slot<E: EthSpec>(
    active_validator_count: u64,
    spec: &ChainSpec,
) -> u64 {
    (active_validator_count / E::slots_per_epoch() / spec.target_committee_size)
        .clamp(1, E::max_committees_per_slot() as u64)
}

/// Maps `(committees_per_slot, slot, committee_index)` onto a gossip subnet.
///
/// Deterministic and total: any committee index is folded into the subnet
/// range, so the result is always `< spec.attestation_subnet_count`.
pub fn compute_subnet_for_attestation<E: EthSpec>(
    committees_per_slot: u64,
    slot: Slot,
    committee_index: u64,
    spec: &ChainSpec,
) -> SubnetId {
    let slots_since_epoch_start = slot % E::slots_per_epoch();
    let committees_since_epoch_start = committees_per_slot * slots_since_epoch_start;

    SubnetId::new(
        (committees_since_epoch_start + committee_index) % spec.attestation_subnet_count,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MainnetEthSpec;

    type E = MainnetEthSpec;

    #[test]
    fn committees_per_slot_clamps() {
        let spec = ChainSpec::mainnet();
        // Tiny validator set still yields one committee.
        assert_eq!(compute_committees_per_slot::<E>(10, &spec), 1);
        // 500k validators: 500_000 / 32 / 128 = 122, above the cap of 64.
        assert_eq!(compute_committees_per_slot::<E>(500_000, &spec), 64);
        // Mid-size set is unclamped: 131072 / 32 / 128 = 32.
        assert_eq!(compute_committees_per_slot::<E>(131_072, &spec), 32);
    }

    #[test]
    fn subnet_always_in_range() {
        let spec = ChainSpec::mainnet();
        for slot in 0..64 {
            for committee_index in 0..128 {
                let subnet = compute_subnet_for_attestation::<E>(
                    64,
                    Slot::new(slot),
                    committee_index,
                    &spec,
                );
                assert!(subnet.as_u64() < spec.attestation_subnet_count);
            }
        }
    }

    #[test]
    fn subnet_offsets_by_slot_within_epoch() {
        let spec = ChainSpec::mainnet();
        let committees_per_slot = 4;
        let a = compute_subnet_for_attestation::<E>(committees_per_slot, Slot::new(0), 1, &spec);
        let b = compute_subnet_for_attestation::<E>(committees_per_slot, Slot::new(1), 1, &spec);
        assert_eq!(b.as_u64(), a.as_u64() + committees_per_slot);
        // Epoch boundary resets the offset.
        let c = compute_subnet_for_attestation::<E>(committees_per_slot, Slot::new(32), 1, &spec);
        assert_eq!(c, a);
    }
}
