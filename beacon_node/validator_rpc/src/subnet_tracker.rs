//! Tracks which attestation subnets this node must join, per slot, and
//! which of those it will aggregate for.

use crate::ValidatorServer;
use crate::errors::RpcError;
use parking_lot::RwLock;
use slot_clock::SlotClock;
use std::collections::{HashMap, HashSet};
use tracing::debug;
use types::{
    Epoch, EthSpec, Slot, SubnetId, SyncSubnetId, compute_committees_per_slot,
    compute_subnet_for_attestation,
};

/// Registrations older than this many epochs behind the current slot are
/// evicted.
const RETENTION_EPOCHS: u64 = 2;

/// The process-wide registry of subnet registrations, keyed by slot.
///
/// Writes are idempotent: re-inserting a subnet for a slot is a no-op.
#[derive(Default)]
pub struct SubnetTracker {
    attester: RwLock<HashMap<Slot, HashSet<SubnetId>>>,
    aggregator: RwLock<HashMap<Slot, HashSet<SubnetId>>>,
    /// Sync-committee subnets this node serves, with their expiry epochs.
    sync: RwLock<HashMap<SyncSubnetId, Epoch>>,
}

impl SubnetTracker {
    pub fn record_attester(&self, slot: Slot, subnet: SubnetId) {
        self.attester.write().entry(slot).or_default().insert(subnet);
    }

    pub fn record_aggregator(&self, slot: Slot, subnet: SubnetId) {
        self.aggregator
            .write()
            .entry(slot)
            .or_default()
            .insert(subnet);
    }

    /// The subnets to listen on for `slot`, in ascending order.
    pub fn attester_subnets(&self, slot: Slot) -> Vec<SubnetId> {
        let mut subnets: Vec<_> = self
            .attester
            .read()
            .get(&slot)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        subnets.sort_unstable();
        subnets
    }

    /// The subnets to aggregate for at `slot`, in ascending order.
    pub fn aggregator_subnets(&self, slot: Slot) -> Vec<SubnetId> {
        let mut subnets: Vec<_> = self
            .aggregator
            .read()
            .get(&slot)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        subnets.sort_unstable();
        subnets
    }

    /// Keep serving a sync subnet until `until_epoch` (inclusive).
    /// Re-registering extends the expiry, never shortens it.
    pub fn record_sync_committee(&self, subnet: SyncSubnetId, until_epoch: Epoch) {
        let mut sync = self.sync.write();
        let expiry = sync.entry(subnet).or_insert(until_epoch);
        if until_epoch > *expiry {
            *expiry = until_epoch;
        }
    }

    /// The sync subnets currently served, in ascending order.
    pub fn sync_subnets(&self) -> Vec<SyncSubnetId> {
        let mut subnets: Vec<_> = self.sync.read().keys().copied().collect();
        subnets.sort_unstable();
        subnets
    }

    /// Drop registrations that fell out of the retention window.
    pub fn prune(&self, current_slot: Slot, slots_per_epoch: u64) {
        let retention = RETENTION_EPOCHS * slots_per_epoch;
        self.attester
            .write()
            .retain(|slot, _| *slot + retention >= current_slot);
        self.aggregator
            .write()
            .retain(|slot, _| *slot + retention >= current_slot);
        let current_epoch = current_slot.epoch(slots_per_epoch);
        self.sync
            .write()
            .retain(|_, until_epoch| *until_epoch + 1 >= current_epoch);
    }
}

impl<E: EthSpec, S: SlotClock> ValidatorServer<E, S> {
    /// `SubscribeCommitteeSubnets(slots, committees, is_aggregator)`.
    ///
    /// The active-validator count is loaded for the first slot's epoch and
    /// reloaded only when consecutive inputs cross an epoch boundary.
    pub fn subscribe_committee_subnets(
        &self,
        slots: &[Slot],
        committee_indices: &[u64],
        is_aggregator: &[bool],
    ) -> Result<(), RpcError> {
        if slots.is_empty()
            || slots.len() != committee_indices.len()
            || slots.len() != is_aggregator.len()
        {
            return Err(RpcError::invalid_argument(
                "request fields are not the same length",
            ));
        }

        let mut cached: Option<(Epoch, u64)> = None;
        for ((&slot, &committee_index), &aggregator) in slots
            .iter()
            .zip(committee_indices.iter())
            .zip(is_aggregator.iter())
        {
            let epoch = slot.epoch(E::slots_per_epoch());
            let committees_per_slot = match cached {
                Some((cached_epoch, count)) if cached_epoch == epoch => count,
                _ => {
                    let active = self
                        .head
                        .head_validators_indices(epoch)
                        .map_err(|e| {
                            RpcError::internal(format!("active validator count: {e}"))
                        })?
                        .len() as u64;
                    let count = compute_committees_per_slot::<E>(active, &self.spec);
                    cached = Some((epoch, count));
                    count
                }
            };

            let subnet = compute_subnet_for_attestation::<E>(
                committees_per_slot,
                slot,
                committee_index,
                &self.spec,
            );
            self.subnet_tracker.record_attester(slot, subnet);
            if aggregator {
                self.subnet_tracker.record_aggregator(slot, subnet);
            }
            debug!(
                slot = slot.as_u64(),
                committee_index,
                subnet = subnet.as_u64(),
                aggregator,
                "Registered committee subnet"
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::StatusCode;
    use crate::test_utils::TestRig;
    use types::MinimalEthSpec;

    type E = MinimalEthSpec;

    #[tokio::test]
    async fn mismatched_lengths_are_rejected() {
        let rig = TestRig::<E>::new(64).at_slot(5);
        let err = rig
            .server()
            .subscribe_committee_subnets(&[Slot::new(5), Slot::new(6)], &[0], &[false])
            .unwrap_err();
        assert_eq!(err.code(), StatusCode::InvalidArgument);
        assert_eq!(err.message(), "request fields are not the same length");

        let err = rig
            .server()
            .subscribe_committee_subnets(&[], &[], &[])
            .unwrap_err();
        assert_eq!(err.code(), StatusCode::InvalidArgument);
    }

    #[tokio::test]
    async fn subscription_registers_and_is_idempotent() {
        let rig = TestRig::<E>::new(64).at_slot(5);
        let slots = [Slot::new(5), Slot::new(5)];
        let committees = [0, 1];
        let aggregators = [false, true];

        rig.server()
            .subscribe_committee_subnets(&slots, &committees, &aggregators)
            .unwrap();
        let attester = rig.server().subnet_tracker.attester_subnets(Slot::new(5));
        let aggregator = rig.server().subnet_tracker.aggregator_subnets(Slot::new(5));
        assert_eq!(attester.len(), 2);
        assert_eq!(aggregator.len(), 1);
        for subnet in attester.iter().chain(aggregator.iter()) {
            assert!(subnet.as_u64() < rig.spec().attestation_subnet_count);
        }

        // Repeating the identical request changes nothing.
        rig.server()
            .subscribe_committee_subnets(&slots, &committees, &aggregators)
            .unwrap();
        assert_eq!(
            rig.server().subnet_tracker.attester_subnets(Slot::new(5)),
            attester
        );
        assert_eq!(
            rig.server().subnet_tracker.aggregator_subnets(Slot::new(5)),
            aggregator
        );
    }

    #[test]
    fn registrations_are_idempotent() {
        let tracker = SubnetTracker::default();
        tracker.record_attester(Slot::new(1), SubnetId::new(4));
        tracker.record_attester(Slot::new(1), SubnetId::new(4));
        tracker.record_attester(Slot::new(1), SubnetId::new(2));
        assert_eq!(
            tracker.attester_subnets(Slot::new(1)),
            vec![SubnetId::new(2), SubnetId::new(4)]
        );
    }

    #[test]
    fn aggregator_registrations_are_separate() {
        let tracker = SubnetTracker::default();
        tracker.record_attester(Slot::new(1), SubnetId::new(4));
        assert!(tracker.aggregator_subnets(Slot::new(1)).is_empty());
        tracker.record_aggregator(Slot::new(1), SubnetId::new(4));
        assert_eq!(
            tracker.aggregator_subnets(Slot::new(1)),
            vec![SubnetId::new(4)]
        );
    }

    #[test]
    fn prune_honors_retention_window() {
        let tracker = SubnetTracker::default();
        let slots_per_epoch = 8;
        tracker.record_attester(Slot::new(0), SubnetId::new(1));
        tracker.record_attester(Slot::new(20), SubnetId::new(2));
        tracker.prune(Slot::new(30), slots_per_epoch);
        assert!(tracker.attester_subnets(Slot::new(0)).is_empty());
        assert_eq!(
            tracker.attester_subnets(Slot::new(20)),
            vec![SubnetId::new(2)]
        );
    }
}
