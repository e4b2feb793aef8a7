//! Sync-committee RPC surface: block roots to sign over, message and
//! contribution submission, and subcommittee lookups.

use crate::ValidatorServer;
use crate::chain::PubsubMessage;
use crate::errors::{Reason, RpcError};
use crate::events::OperationEvent;
use slot_clock::SlotClock;
use tracing::debug;
use types::{
    EthSpec, Hash256, PublicKeyBytes, SignatureBytes, SignedContributionAndProof, Slot,
    SyncCommitteeContribution, SyncCommitteeMessage, SyncSubnetId,
};

impl<E: EthSpec, S: SlotClock> ValidatorServer<E, S> {
    /// `GetSyncMessageBlockRoot()`: the root sync-committee members sign
    /// over this slot.
    pub fn get_sync_message_block_root(&self) -> Result<Hash256, RpcError> {
        self.admit()?;
        self.head.head_root().map_err(|e| {
            RpcError::internal(format!("could not retrieve head root: {e}"))
                .with_reason(Reason::CannotRetrieveHeadRoot)
        })
    }

    /// `SubmitSyncMessage(message)`.
    pub fn submit_sync_message(&self, message: SyncCommitteeMessage) -> Result<(), RpcError> {
        validate_signature(&message.signature)?;

        let state = self
            .head
            .head_state_read_only()
            .map_err(|e| RpcError::internal(format!("head state: {e}")))?;
        let pubkey = state
            .validators
            .get(message.validator_index as usize)
            .map(|validator| validator.pubkey)
            .ok_or_else(|| {
                RpcError::not_found(format!(
                    "no validator at index {}",
                    message.validator_index
                ))
            })?;
        let epoch = message.slot.epoch(E::slots_per_epoch());
        let subnets: Vec<SyncSubnetId> = state
            .get_built_sync_committee(epoch, &self.spec)
            .map(|committee| committee.subcommittee_indices_of(&pubkey))
            .unwrap_or_default()
            .into_iter()
            .map(SyncSubnetId::new)
            .collect();

        self.operation_notifier
            .send(OperationEvent::SyncCommitteeMessageReceived(Box::new(
                message.clone(),
            )));

        for subnet in &subnets {
            self.broadcaster
                .broadcast_sync_committee_message(*subnet, message.clone())
                .map_err(|e| {
                    RpcError::internal(format!("could not broadcast sync message: {e}"))
                        .with_reason(Reason::BroadcastFailed)
                })?;
        }
        debug!(
            slot = message.slot.as_u64(),
            validator_index = message.validator_index,
            subnets = subnets.len(),
            "Broadcast sync committee message"
        );

        self.pools
            .sync_committee
            .save_message(message)
            .map_err(|e| RpcError::internal(format!("could not save sync message: {e:?}")))?;
        Ok(())
    }

    /// `GetSyncSubcommitteeIndex(pubkey, slot)`: the positions the key
    /// holds in the sync committee serving `slot`.
    pub fn get_sync_subcommittee_index(
        &self,
        pubkey: &PublicKeyBytes,
        slot: Slot,
    ) -> Result<Vec<u64>, RpcError> {
        let state = self
            .head
            .head_state_read_only()
            .map_err(|e| RpcError::internal(format!("head state: {e}")))?;
        if state.get_validator_index(pubkey).is_none() {
            return Err(RpcError::not_found("unknown validator public key"));
        }

        let epoch = slot.epoch(E::slots_per_epoch());
        let positions = state
            .get_built_sync_committee(epoch, &self.spec)
            .map(|committee| {
                committee
                    .positions_of(pubkey)
                    .into_iter()
                    .map(|position| position as u64)
                    .collect()
            })
            .unwrap_or_default();
        Ok(positions)
    }

    /// `GetSyncCommitteeContribution(slot, subnet, _pubkey)`: the best
    /// known contribution for the subcommittee at this node's head.
    pub fn get_sync_committee_contribution(
        &self,
        slot: Slot,
        subcommittee_index: u64,
    ) -> Result<SyncCommitteeContribution<E>, RpcError> {
        self.admit()?;
        let beacon_block_root = self.head.head_root().map_err(|e| {
            RpcError::internal(format!("could not retrieve head root: {e}"))
                .with_reason(Reason::CannotRetrieveHeadRoot)
        })?;
        self.pools
            .sync_committee
            .best_contribution(slot, beacon_block_root, subcommittee_index)
            .ok_or_else(|| {
                RpcError::not_found(format!(
                    "no contribution for slot {slot} subcommittee {subcommittee_index}"
                ))
            })
    }

    /// `SubmitSignedContributionAndProof`.
    pub fn submit_signed_contribution_and_proof(
        &self,
        signed: SignedContributionAndProof<E>,
    ) -> Result<(), RpcError> {
        validate_signature(&signed.signature)?;
        validate_signature(&signed.message.selection_proof)?;

        self.operation_notifier
            .send(OperationEvent::ContributionReceived(Box::new(
                signed.clone(),
            )));
        self.broadcaster
            .broadcast(PubsubMessage::SignedContributionAndProof(Box::new(
                signed.clone(),
            )))
            .map_err(|e| {
                RpcError::internal(format!("could not broadcast contribution: {e}"))
                    .with_reason(Reason::BroadcastFailed)
            })?;
        self.pools
            .sync_committee
            .save_contribution(signed.message.contribution)
            .map_err(|e| RpcError::internal(format!("could not save contribution: {e:?}")))?;
        Ok(())
    }
}

fn validate_signature(signature: &SignatureBytes) -> Result<(), RpcError> {
    SignatureBytes::deserialize(signature.as_serialized())
        .map(|_| ())
        .map_err(|_| RpcError::invalid_argument("Incorrect signature"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::StatusCode;
    use crate::test_utils::TestRig;
    use ssz_types::BitVector;
    use types::test_utils::interop_pubkey;
    use types::{AggregateSignature, MinimalEthSpec};

    type E = MinimalEthSpec;

    #[tokio::test]
    async fn sync_message_block_root_is_head_root() {
        let rig = TestRig::<E>::new(32).at_slot(5);
        let root = rig.server().get_sync_message_block_root().unwrap();
        assert_eq!(root, rig.head_root());
    }

    #[tokio::test]
    async fn sync_message_fans_out_to_member_subnets() {
        let rig = TestRig::<E>::new(32).at_slot(5).with_sync_committee_member(3);
        let message = SyncCommitteeMessage {
            slot: Slot::new(5),
            beacon_block_root: rig.head_root(),
            validator_index: 3,
            signature: SignatureBytes::empty(),
        };
        rig.server().submit_sync_message(message).unwrap();
        assert!(!rig.broadcast_sync_messages().is_empty());
    }

    #[tokio::test]
    async fn unknown_validator_index_is_not_found() {
        let rig = TestRig::<E>::new(8).at_slot(5);
        let message = SyncCommitteeMessage {
            slot: Slot::new(5),
            beacon_block_root: rig.head_root(),
            validator_index: 9999,
            signature: SignatureBytes::empty(),
        };
        assert_eq!(
            rig.server().submit_sync_message(message).unwrap_err().code(),
            StatusCode::NotFound
        );
    }

    #[tokio::test]
    async fn subcommittee_index_for_member_and_stranger() {
        let rig = TestRig::<E>::new(32).at_slot(5).with_sync_committee_member(3);
        let positions = rig
            .server()
            .get_sync_subcommittee_index(&interop_pubkey(3), Slot::new(5))
            .unwrap();
        assert!(!positions.is_empty());

        let err = rig
            .server()
            .get_sync_subcommittee_index(&interop_pubkey(1234), Slot::new(5))
            .unwrap_err();
        assert_eq!(err.code(), StatusCode::NotFound);
    }

    #[tokio::test]
    async fn contribution_round_trip_through_pool() {
        let rig = TestRig::<E>::new(32).at_slot(5);
        let mut contribution = SyncCommitteeContribution::<E> {
            slot: Slot::new(5),
            beacon_block_root: rig.head_root(),
            subcommittee_index: 1,
            aggregation_bits: BitVector::new(),
            signature: AggregateSignature::empty(),
        };
        contribution.aggregation_bits.set(2, true).unwrap();

        let signed = SignedContributionAndProof {
            message: types::ContributionAndProof {
                aggregator_index: 3,
                contribution: contribution.clone(),
                selection_proof: SignatureBytes::empty(),
            },
            signature: SignatureBytes::empty(),
        };
        rig.server()
            .submit_signed_contribution_and_proof(signed)
            .unwrap();

        let best = rig
            .server()
            .get_sync_committee_contribution(Slot::new(5), 1)
            .unwrap();
        assert_eq!(best, contribution);
    }

    #[tokio::test]
    async fn missing_contribution_is_not_found() {
        let rig = TestRig::<E>::new(32).at_slot(5);
        assert_eq!(
            rig.server()
                .get_sync_committee_contribution(Slot::new(5), 0)
                .unwrap_err()
                .code(),
            StatusCode::NotFound
        );
    }
}
