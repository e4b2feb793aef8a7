//! The enshrined-PBS surface: payload bids ("headers"), payload-reveal
//! envelopes and payload-timeliness attestations. Every entry point is
//! fenced on the ePBS fork being active; requests under any other fork are
//! failed preconditions, not internal errors.

use crate::ValidatorServer;
use crate::chain::PubsubMessage;
use crate::errors::{Reason, RpcError};
use crate::events::OperationEvent;
use slot_clock::SlotClock;
use tracing::{debug, info};
use types::{
    BUILDER_INDEX_SELF_BUILD, BlobsBundle, EthSpec, ExecutionPayload, ExecutionPayloadBid,
    Hash256, PayloadAttestationData, PayloadAttestationMessage, SignatureBytes,
    SignedExecutionPayloadBid, SignedExecutionPayloadEnvelope, Slot,
};

/// The orchestrator's per-slot proposal scratch: the local blobs bundle,
/// the signed bid this node committed to, and the revealed envelope.
///
/// A single value behind one mutex, replaced wholesale when a new slot's
/// proposal begins; the unblinding and ePBS read paths observe either the
/// previous slot's state or the new one, never a half-written mix.
#[derive(Default)]
pub struct ProposalSlotState<E: EthSpec> {
    pub slot: Option<Slot>,
    pub blobs_bundle: Option<BlobsBundle<E>>,
    pub signed_execution_payload_header: Option<SignedExecutionPayloadBid<E>>,
    pub payload_envelope: Option<SignedExecutionPayloadEnvelope<E>>,
}

impl<E: EthSpec, S: SlotClock> ValidatorServer<E, S> {
    fn require_epbs(&self, slot: Slot) -> Result<(), RpcError> {
        if !self
            .spec
            .is_epbs_enabled_at(slot.epoch(E::slots_per_epoch()))
        {
            return Err(RpcError::failed_precondition(
                "payload separation is not active at this slot",
            ));
        }
        Ok(())
    }

    /// `SubmitSignedExecutionPayloadEnvelope`.
    pub fn submit_signed_execution_payload_envelope(
        &self,
        envelope: SignedExecutionPayloadEnvelope<E>,
    ) -> Result<(), RpcError> {
        self.require_epbs(envelope.slot())?;
        validate_signature(&envelope.signature)?;

        self.broadcaster
            .broadcast(PubsubMessage::ExecutionPayloadEnvelope(Box::new(
                envelope.clone(),
            )))
            .map_err(|e| {
                RpcError::internal(format!("could not broadcast envelope: {e}"))
                    .with_reason(Reason::BroadcastFailed)
            })?;
        self.envelope_receiver
            .receive_envelope(envelope.clone())
            .map_err(|e| RpcError::internal(format!("could not process envelope: {e}")))?;

        let mut proposal = self.proposal_state.lock();
        if proposal.slot == Some(envelope.slot()) {
            proposal.payload_envelope = Some(envelope);
        } else {
            *proposal = ProposalSlotState {
                slot: Some(envelope.slot()),
                payload_envelope: Some(envelope),
                ..ProposalSlotState::default()
            };
        }
        Ok(())
    }

    /// `GetExecutionPayloadEnvelope(slot)`.
    pub fn get_execution_payload_envelope(
        &self,
        slot: Slot,
    ) -> Result<SignedExecutionPayloadEnvelope<E>, RpcError> {
        self.require_epbs(slot)?;
        let proposal = self.proposal_state.lock();
        if proposal.slot != Some(slot) {
            return Err(RpcError::not_found(format!(
                "no payload envelope for slot {slot}"
            )));
        }
        proposal
            .payload_envelope
            .clone()
            .ok_or_else(|| RpcError::not_found(format!("no payload envelope for slot {slot}")))
    }

    /// `SubmitSignedExecutionPayloadHeader`: record the bid this proposer
    /// committed to and hand it to gossip.
    pub fn submit_signed_execution_payload_header(
        &self,
        signed_bid: SignedExecutionPayloadBid<E>,
    ) -> Result<(), RpcError> {
        self.require_epbs(signed_bid.message.slot)?;
        validate_signature(&signed_bid.signature)?;

        self.broadcaster
            .broadcast(PubsubMessage::ExecutionPayloadBid(Box::new(
                signed_bid.clone(),
            )))
            .map_err(|e| {
                RpcError::internal(format!("could not broadcast bid: {e}"))
                    .with_reason(Reason::BroadcastFailed)
            })?;

        let slot = signed_bid.message.slot;
        let mut proposal = self.proposal_state.lock();
        if proposal.slot == Some(slot) {
            proposal.signed_execution_payload_header = Some(signed_bid);
        } else {
            *proposal = ProposalSlotState {
                slot: Some(slot),
                signed_execution_payload_header: Some(signed_bid),
                ..ProposalSlotState::default()
            };
        }
        info!(slot = slot.as_u64(), "Accepted signed payload bid");
        Ok(())
    }

    /// `GetLocalHeader(slot, proposer_index)`: a self-build bid from the
    /// local execution engine.
    pub async fn get_local_header(
        &self,
        slot: Slot,
        proposer_index: u64,
    ) -> Result<ExecutionPayloadBid<E>, RpcError> {
        self.require_epbs(slot)?;
        self.admit()?;

        let state = self
            .head
            .head_state_read_only()
            .map_err(|e| RpcError::internal(format!("head state: {e}")))?;
        let parent_block_root = self
            .head
            .head_root()
            .map_err(|e| RpcError::internal(format!("head root: {e}")))?;
        let parent_block_hash = state.latest_execution_block_hash;

        let response = self
            .execution_engine
            .get_payload(parent_block_hash, slot, proposer_index, Hash256::ZERO)
            .await
            .map_err(|e| {
                RpcError::unavailable(format!("engine could not build payload: {e}"))
                    .with_reason(Reason::EngineUnavailable)
            })?;

        let (block_hash, gas_limit) = match &response.payload {
            ExecutionPayload::Bellatrix(payload) => (payload.block_hash, payload.gas_limit),
            ExecutionPayload::Capella(payload) => (payload.block_hash, payload.gas_limit),
            ExecutionPayload::Deneb(payload) => (payload.block_hash, payload.gas_limit),
        };
        let bid = ExecutionPayloadBid {
            parent_block_hash,
            parent_block_root,
            block_hash,
            prev_randao: state.get_randao_mix(state.current_epoch()),
            fee_recipient: Default::default(),
            gas_limit,
            builder_index: BUILDER_INDEX_SELF_BUILD,
            slot,
            value: 0,
            blob_kzg_commitments: response
                .blobs_bundle
                .as_ref()
                .map(|bundle| bundle.commitments.clone())
                .unwrap_or_default(),
        };

        *self.proposal_state.lock() = ProposalSlotState {
            slot: Some(slot),
            blobs_bundle: response.blobs_bundle,
            ..ProposalSlotState::default()
        };
        debug!(slot = slot.as_u64(), proposer_index, "Built local payload bid");
        Ok(bid)
    }

    /// `GetPayloadAttestationData(slot)`.
    pub fn get_payload_attestation_data(
        &self,
        slot: Slot,
    ) -> Result<PayloadAttestationData, RpcError> {
        self.require_epbs(slot)?;
        let (highest_slot, beacon_block_root) = self.forkchoice.highest_received_block_slot_root();
        if highest_slot != slot {
            return Err(RpcError::not_found(format!(
                "no block received for slot {slot}"
            )));
        }

        let proposal = self.proposal_state.lock();
        let payload_present =
            proposal.slot == Some(slot) && proposal.payload_envelope.is_some();
        let blob_data_available = payload_present
            && proposal
                .payload_envelope
                .as_ref()
                .is_some_and(|envelope| {
                    envelope.message.blob_kzg_commitments.is_empty()
                        || proposal.blobs_bundle.is_some()
                });

        Ok(PayloadAttestationData {
            beacon_block_root,
            slot,
            payload_present,
            blob_data_available,
        })
    }

    /// `SubmitPayloadAttestation`.
    pub fn submit_payload_attestation(
        &self,
        message: PayloadAttestationMessage,
    ) -> Result<(), RpcError> {
        self.require_epbs(message.data.slot)?;
        validate_signature(&message.signature)?;

        self.operation_notifier
            .send(OperationEvent::PayloadAttestationReceived(Box::new(
                message.clone(),
            )));
        self.broadcaster
            .broadcast(PubsubMessage::PayloadAttestationMessage(Box::new(message)))
            .map_err(|e| {
                RpcError::internal(format!("could not broadcast payload attestation: {e}"))
                    .with_reason(Reason::BroadcastFailed)
            })?;
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
    use types::{ExecutionPayloadDeneb, ExecutionPayloadEnvelope, ForkName, MinimalEthSpec};

    type E = MinimalEthSpec;

    fn envelope(slot: u64) -> SignedExecutionPayloadEnvelope<E> {
        SignedExecutionPayloadEnvelope {
            message: ExecutionPayloadEnvelope {
                payload: ExecutionPayloadDeneb::default(),
                execution_requests: Default::default(),
                builder_index: 7,
                beacon_block_root: Hash256::repeat_byte(0x11),
                slot: Slot::new(slot),
                blob_kzg_commitments: Default::default(),
                state_root: Hash256::repeat_byte(0x22),
            },
            signature: SignatureBytes::empty(),
        }
    }

    #[tokio::test]
    async fn epbs_ops_require_the_fork() {
        let rig = TestRig::<E>::new(8).at_slot(5);
        let err = rig
            .server()
            .submit_signed_execution_payload_envelope(envelope(5))
            .unwrap_err();
        assert_eq!(err.code(), StatusCode::FailedPrecondition);

        let err = rig
            .server()
            .get_payload_attestation_data(Slot::new(5))
            .unwrap_err();
        assert_eq!(err.code(), StatusCode::FailedPrecondition);
    }

    #[tokio::test]
    async fn envelope_round_trip() {
        let rig = TestRig::<E>::new(8).at_slot(5).with_epbs();
        rig.server()
            .submit_signed_execution_payload_envelope(envelope(5))
            .unwrap();

        let fetched = rig
            .server()
            .get_execution_payload_envelope(Slot::new(5))
            .unwrap();
        assert_eq!(fetched.message.builder_index, 7);
        assert_eq!(rig.received_envelopes(), 1);

        // Other slots have nothing.
        assert_eq!(
            rig.server()
                .get_execution_payload_envelope(Slot::new(4))
                .unwrap_err()
                .code(),
            StatusCode::NotFound
        );
    }

    #[tokio::test]
    async fn payload_attestation_data_reports_presence() {
        let rig = TestRig::<E>::new(8).at_slot(5).with_epbs();
        rig.set_highest_received(Slot::new(5), Hash256::repeat_byte(0x11));

        let before = rig
            .server()
            .get_payload_attestation_data(Slot::new(5))
            .unwrap();
        assert!(!before.payload_present);

        rig.server()
            .submit_signed_execution_payload_envelope(envelope(5))
            .unwrap();
        let after = rig
            .server()
            .get_payload_attestation_data(Slot::new(5))
            .unwrap();
        assert!(after.payload_present);
        assert!(after.blob_data_available);
        assert_eq!(after.beacon_block_root, Hash256::repeat_byte(0x11));
    }

    #[tokio::test]
    async fn local_header_is_a_self_build() {
        let rig = TestRig::<E>::new(8)
            .at_fork(ForkName::Deneb)
            .at_slot(5)
            .with_epbs();
        let bid = rig.server().get_local_header(Slot::new(5), 3).await.unwrap();
        assert_eq!(bid.builder_index, BUILDER_INDEX_SELF_BUILD);
        assert_eq!(bid.value, 0);
        assert_eq!(bid.slot, Slot::new(5));
    }

    #[tokio::test]
    async fn header_submission_is_stored_per_slot() {
        let rig = TestRig::<E>::new(8).at_slot(5).with_epbs();
        let signed = SignedExecutionPayloadBid {
            message: ExecutionPayloadBid::<E> {
                slot: Slot::new(5),
                builder_index: 1,
                value: 42,
                ..Default::default()
            },
            signature: SignatureBytes::empty(),
        };
        rig.server()
            .submit_signed_execution_payload_header(signed)
            .unwrap();
        let proposal = rig.server().proposal_state.lock();
        assert_eq!(proposal.slot, Some(Slot::new(5)));
        assert_eq!(
            proposal
                .signed_execution_payload_header
                .as_ref()
                .unwrap()
                .message
                .value,
            42
        );
    }
}
