//! Resolves per-epoch validator assignments: attester committees for the
//! requested epoch and the next, proposer slots for the requested epoch,
//! and sync-committee membership.

use crate::ValidatorServer;
use crate::errors::RpcError;
use crate::status::{ValidatorStatus, registry_status};
use slot_clock::SlotClock;
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use types::{
    BeaconState, ChainSpec, CommitteeAssignment, CommitteeCache, Epoch, EthSpec,
    PublicKeyBytes, Slot, SyncSubnetId,
};

/// One validator's assignments for one epoch.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatorDuty {
    pub pubkey: PublicKeyBytes,
    pub validator_index: Option<u64>,
    pub status: ValidatorStatus,
    /// The members of the validator's committee, as validator indices.
    pub committee: Vec<u64>,
    pub attester_slot: Option<Slot>,
    pub committee_index: Option<u64>,
    /// Slots this validator proposes at, in the requested epoch only.
    pub proposer_slots: Vec<Slot>,
    pub is_sync_committee: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DutiesResponse {
    pub current: Vec<ValidatorDuty>,
    pub next: Vec<ValidatorDuty>,
}

impl<E: EthSpec, S: SlotClock> ValidatorServer<E, S> {
    /// `GetDuties(epoch, pubkeys)`.
    ///
    /// `token` is checked between validators; cancellation discards the
    /// partial result and returns `Aborted`.
    pub fn get_duties(
        &self,
        epoch: Epoch,
        pubkeys: &[PublicKeyBytes],
        token: &CancellationToken,
    ) -> Result<DutiesResponse, RpcError> {
        if self.sync_checker.is_syncing() {
            return Err(RpcError::unavailable("Syncing to latest head"));
        }
        let current_epoch = self.current_epoch()?;
        if epoch > current_epoch + 1 {
            return Err(RpcError::unavailable(format!(
                "epoch {epoch} is ahead of current epoch {current_epoch}"
            )));
        }

        let mut state = self
            .head
            .head_state()
            .map_err(|e| RpcError::internal(format!("head state: {e}")))?;
        let epoch_start = epoch.start_slot(E::slots_per_epoch());
        if state.slot < epoch_start {
            state = self
                .state_gen
                .replay_to_slot(state, epoch_start)
                .map_err(|e| RpcError::internal(format!("could not process slots: {e}")))?;
        }

        // One shuffle per epoch, then one pass over each to index
        // assignments by validator.
        let current_cache = CommitteeCache::initialized(&state, epoch, &self.spec)
            .map_err(|e| RpcError::internal(format!("committee shuffle: {e:?}")))?;
        let next_cache = CommitteeCache::initialized(&state, epoch + 1, &self.spec)
            .map_err(|e| RpcError::internal(format!("committee shuffle: {e:?}")))?;
        let current_assignments = assignments_by_validator(&current_cache, epoch);
        let next_assignments = assignments_by_validator(&next_cache, epoch + 1);
        let proposer_slots = self.proposer_slots_for_epoch(&state, epoch)?;

        let mut current = Vec::with_capacity(pubkeys.len());
        let mut next = Vec::with_capacity(pubkeys.len());
        for pubkey in pubkeys {
            if token.is_cancelled() {
                debug!(
                    epoch = epoch.as_u64(),
                    resolved = current.len(),
                    "Duty resolution canceled"
                );
                return Err(RpcError::aborted("duty computation canceled"));
            }

            current.push(self.duty_for(
                &state,
                pubkey,
                epoch,
                &current_assignments,
                &proposer_slots,
                self.sync_membership(&state, pubkey, epoch, None)?,
            )?);
            let next_sync = self.sync_membership(
                &state,
                pubkey,
                epoch + 1,
                Some(current.last().map(|d| d.is_sync_committee).unwrap_or(false)),
            )?;
            next.push(self.duty_for(
                &state,
                pubkey,
                epoch + 1,
                &next_assignments,
                &HashMap::new(),
                next_sync,
            )?);
        }

        Ok(DutiesResponse { current, next })
    }

    fn duty_for(
        &self,
        state: &BeaconState<E>,
        pubkey: &PublicKeyBytes,
        epoch: Epoch,
        assignments: &HashMap<usize, CommitteeAssignment>,
        proposer_slots: &HashMap<usize, Vec<Slot>>,
        is_sync_committee: bool,
    ) -> Result<ValidatorDuty, RpcError> {
        let Some(validator_index) = state.get_validator_index(pubkey) else {
            // Not in the registry: status comes from the deposit log.
            let status = if self.deposits.deposit_by_pubkey(pubkey).is_some() {
                ValidatorStatus::Deposited
            } else {
                ValidatorStatus::Unknown
            };
            return Ok(ValidatorDuty {
                pubkey: *pubkey,
                validator_index: None,
                status,
                committee: Vec::new(),
                attester_slot: None,
                committee_index: None,
                proposer_slots: Vec::new(),
                is_sync_committee: false,
            });
        };

        let assignment = assignments.get(&validator_index);
        Ok(ValidatorDuty {
            pubkey: *pubkey,
            validator_index: Some(validator_index as u64),
            status: registry_status(&state.validators[validator_index], epoch),
            committee: assignment
                .map(|a| a.committee.iter().map(|&i| i as u64).collect())
                .unwrap_or_default(),
            attester_slot: assignment.map(|a| a.attester_slot),
            committee_index: assignment.map(|a| a.committee_index),
            proposer_slots: proposer_slots
                .get(&validator_index)
                .cloned()
                .unwrap_or_default(),
            is_sync_committee,
        })
    }

    /// Sync-committee membership for `epoch`.
    ///
    /// When resolving the next epoch (`mirror_current` is `Some`), the
    /// next-period committee is only consulted if `epoch` crosses a
    /// sync-committee period boundary; otherwise membership is unchanged
    /// from the current epoch.
    fn sync_membership(
        &self,
        state: &BeaconState<E>,
        pubkey: &PublicKeyBytes,
        epoch: Epoch,
        mirror_current: Option<bool>,
    ) -> Result<bool, RpcError> {
        if !self.spec.fork_name_at_epoch(epoch).altair_enabled() {
            return Ok(false);
        }
        if let Some(current_flag) = mirror_current {
            let this_period = epoch
                .saturating_sub(1u64)
                .sync_committee_period(&self.spec)
                .map_err(|e| RpcError::internal(format!("sync period: {e:?}")))?;
            let next_period = epoch
                .sync_committee_period(&self.spec)
                .map_err(|e| RpcError::internal(format!("sync period: {e:?}")))?;
            if next_period != this_period + 1 {
                return Ok(current_flag);
            }
        }

        let member = state
            .get_built_sync_committee(epoch, &self.spec)
            .map(|committee| committee.contains(pubkey))
            .unwrap_or(false);
        if member {
            self.register_sync_subnets(state, pubkey, epoch);
        }
        Ok(member)
    }

    fn register_sync_subnets(&self, state: &BeaconState<E>, pubkey: &PublicKeyBytes, epoch: Epoch) {
        let Ok(committee) = state.get_built_sync_committee(epoch, &self.spec) else {
            return;
        };
        let until_epoch = sync_period_end_epoch(epoch, &self.spec);
        for subnet in committee.subcommittee_indices_of(pubkey) {
            self.subnet_tracker
                .record_sync_committee(SyncSubnetId::new(subnet), until_epoch);
        }
    }

    fn proposer_slots_for_epoch(
        &self,
        state: &BeaconState<E>,
        epoch: Epoch,
    ) -> Result<HashMap<usize, Vec<Slot>>, RpcError> {
        let mut proposers: HashMap<usize, Vec<Slot>> = HashMap::new();
        for slot in epoch.slot_iter(E::slots_per_epoch()) {
            let proposer = state
                .get_beacon_proposer_index(slot, &self.spec)
                .map_err(|e| RpcError::internal(format!("proposer shuffle: {e:?}")))?;
            proposers.entry(proposer).or_default().push(slot);
        }
        Ok(proposers)
    }
}

/// Index an epoch's committees by member, in a single pass.
fn assignments_by_validator(
    cache: &CommitteeCache,
    epoch: Epoch,
) -> HashMap<usize, CommitteeAssignment> {
    let mut map = HashMap::with_capacity(cache.active_validator_count());
    if cache.epoch() != Some(epoch) {
        return map;
    }
    let slots_per_epoch =
        cache.epoch_committee_count() as u64 / cache.committees_per_slot().max(1);
    for slot in epoch.slot_iter(slots_per_epoch) {
        for index in 0..cache.committees_per_slot() {
            if let Ok(committee) = cache.get_beacon_committee(slot, index) {
                for &member in committee.committee {
                    map.insert(
                        member,
                        CommitteeAssignment {
                            committee: committee.committee.to_vec(),
                            committee_index: index,
                            attester_slot: slot,
                        },
                    );
                }
            }
        }
    }
    map
}

/// The last epoch of the sync-committee period containing `epoch`.
fn sync_period_end_epoch(epoch: Epoch, spec: &ChainSpec) -> Epoch {
    let period = epoch.as_u64() / spec.epochs_per_sync_committee_period;
    Epoch::new((period + 1) * spec.epochs_per_sync_committee_period - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::StatusCode;
    use crate::test_utils::TestRig;
    use types::MinimalEthSpec;
    use types::test_utils::interop_pubkey;

    type E = MinimalEthSpec;

    #[tokio::test]
    async fn duties_cover_current_and_next_epoch() {
        let rig = TestRig::<E>::new(64).at_slot(5);
        let pubkeys: Vec<_> = (0..4).map(interop_pubkey).collect();
        let response = rig
            .server()
            .get_duties(Epoch::new(0), &pubkeys, &CancellationToken::new())
            .unwrap();

        assert_eq!(response.current.len(), 4);
        assert_eq!(response.next.len(), 4);
        for duty in &response.current {
            assert_eq!(duty.status, ValidatorStatus::Active);
            let slot = duty.attester_slot.expect("every validator attests");
            assert!(slot.epoch(E::slots_per_epoch()) == Epoch::new(0));
            assert!(duty.committee.contains(&duty.validator_index.unwrap()));
        }
        for duty in &response.next {
            let slot = duty.attester_slot.expect("every validator attests");
            assert_eq!(slot.epoch(E::slots_per_epoch()), Epoch::new(1));
            // Proposer slots are only reported for the requested epoch.
            assert!(duty.proposer_slots.is_empty());
        }
    }

    #[tokio::test]
    async fn every_slot_of_the_epoch_has_a_proposer() {
        let rig = TestRig::<E>::new(64).at_slot(5);
        let pubkeys: Vec<_> = (0..64).map(interop_pubkey).collect();
        let response = rig
            .server()
            .get_duties(Epoch::new(0), &pubkeys, &CancellationToken::new())
            .unwrap();

        let proposed_slots: Vec<Slot> = response
            .current
            .iter()
            .flat_map(|duty| duty.proposer_slots.iter().copied())
            .collect();
        assert_eq!(proposed_slots.len(), E::slots_per_epoch() as usize);
    }

    #[tokio::test]
    async fn far_future_epoch_is_unavailable() {
        let rig = TestRig::<E>::new(64).at_slot(5);
        let err = rig
            .server()
            .get_duties(
                Epoch::new(2),
                &[interop_pubkey(0)],
                &CancellationToken::new(),
            )
            .unwrap_err();
        assert_eq!(err.code(), StatusCode::Unavailable);
    }

    #[tokio::test]
    async fn next_epoch_duties_are_allowed() {
        let rig = TestRig::<E>::new(64).at_slot(5);
        let response = rig
            .server()
            .get_duties(
                Epoch::new(1),
                &[interop_pubkey(0)],
                &CancellationToken::new(),
            )
            .unwrap();
        assert_eq!(response.current.len(), 1);
        assert_eq!(rig.replays(), 1);
    }

    #[tokio::test]
    async fn unknown_pubkey_resolves_through_deposits() {
        let rig = TestRig::<E>::new(8).at_slot(5);
        let stranger = interop_pubkey(1000);
        let response = rig
            .server()
            .get_duties(Epoch::new(0), &[stranger], &CancellationToken::new())
            .unwrap();
        assert_eq!(response.current[0].status, ValidatorStatus::Unknown);
        assert!(response.current[0].validator_index.is_none());

        rig.add_deposit(stranger);
        let response = rig
            .server()
            .get_duties(Epoch::new(0), &[stranger], &CancellationToken::new())
            .unwrap();
        assert_eq!(response.current[0].status, ValidatorStatus::Deposited);
    }

    #[tokio::test]
    async fn cancellation_aborts_with_partial_work_discarded() {
        let rig = TestRig::<E>::new(64).at_slot(5);
        let token = CancellationToken::new();
        token.cancel();
        let err = rig
            .server()
            .get_duties(Epoch::new(0), &[interop_pubkey(0)], &token)
            .unwrap_err();
        assert_eq!(err.code(), StatusCode::Aborted);
    }

    #[tokio::test]
    async fn sync_committee_membership_is_reported() {
        let rig = TestRig::<E>::new(32).at_slot(5).with_sync_committee_member(3);
        let response = rig
            .server()
            .get_duties(
                Epoch::new(0),
                &[interop_pubkey(3), interop_pubkey(4)],
                &CancellationToken::new(),
            )
            .unwrap();
        assert!(response.current[0].is_sync_committee);
        assert!(!response.current[1].is_sync_committee);
        // Epoch 1 stays within the same sync period: membership mirrors.
        assert!(response.next[0].is_sync_committee);
        // Member registration reached the sync-subnet registry.
        assert!(!rig.server().subnet_tracker.sync_subnets().is_empty());
    }
}
