//! Pool-backed operation endpoints: aggregate read-back and the
//! submission paths for slashings, exits and BLS-to-execution changes.
//! Submissions are validated against the head state, announced on the
//! operation feed, broadcast, and saved to the pool the block assembler
//! drains.

use crate::ValidatorServer;
use crate::chain::PubsubMessage;
use crate::errors::{Reason, RpcError};
use crate::events::OperationEvent;
use crate::validation::{check_attester_slashing, check_proposer_slashing, check_voluntary_exit};
use slot_clock::SlotClock;
use tracing::info;
use types::{
    Attestation, AttesterSlashing, EthSpec, Hash256, ProposerSlashing,
    SignedBlsToExecutionChange, SignedVoluntaryExit, Slot,
};

impl<E: EthSpec, S: SlotClock> ValidatorServer<E, S> {
    /// `GetAggregateAttestation(slot, data_root)`: the strongest aggregate
    /// the pool holds for the data. Electra callers pin a committee index.
    pub fn get_aggregate_attestation(
        &self,
        slot: Slot,
        data_root: Hash256,
        committee_index: Option<u64>,
    ) -> Result<Attestation<E>, RpcError> {
        self.pools
            .attestations
            .get_aggregate(slot, data_root, committee_index)
            .ok_or_else(|| RpcError::not_found("no matching aggregate found"))
    }

    /// `SubmitProposerSlashing`.
    pub fn submit_proposer_slashing(&self, slashing: ProposerSlashing) -> Result<(), RpcError> {
        let state = self
            .head
            .head_state_read_only()
            .map_err(|e| RpcError::internal(format!("head state: {e}")))?;
        check_proposer_slashing(&state, &slashing)
            .map_err(|e| RpcError::invalid_argument(format!("invalid proposer slashing: {e:?}")))?;

        self.broadcaster
            .broadcast(PubsubMessage::ProposerSlashing(Box::new(slashing.clone())))
            .map_err(|e| {
                RpcError::internal(format!("could not broadcast slashing: {e}"))
                    .with_reason(Reason::BroadcastFailed)
            })?;
        self.pools
            .slashings
            .save_proposer_slashing(slashing.clone())
            .map_err(|e| RpcError::internal(format!("could not save slashing: {e:?}")))?;
        info!(
            proposer_index = slashing.proposer_index(),
            "Accepted proposer slashing"
        );
        Ok(())
    }

    /// `SubmitAttesterSlashing`.
    pub fn submit_attester_slashing(
        &self,
        slashing: AttesterSlashing<E>,
    ) -> Result<(), RpcError> {
        let state = self
            .head
            .head_state_read_only()
            .map_err(|e| RpcError::internal(format!("head state: {e}")))?;
        check_attester_slashing(&state, &slashing)
            .map_err(|e| RpcError::invalid_argument(format!("invalid attester slashing: {e:?}")))?;

        self.broadcaster
            .broadcast(PubsubMessage::AttesterSlashing(Box::new(slashing.clone())))
            .map_err(|e| {
                RpcError::internal(format!("could not broadcast slashing: {e}"))
                    .with_reason(Reason::BroadcastFailed)
            })?;
        self.pools
            .slashings
            .save_attester_slashing(slashing)
            .map_err(|e| RpcError::internal(format!("could not save slashing: {e:?}")))?;
        Ok(())
    }

    /// `SubmitVoluntaryExit`.
    pub fn submit_voluntary_exit(&self, exit: SignedVoluntaryExit) -> Result<(), RpcError> {
        let state = self
            .head
            .head_state_read_only()
            .map_err(|e| RpcError::internal(format!("head state: {e}")))?;
        check_voluntary_exit(&state, &exit, &self.spec)
            .map_err(|e| RpcError::invalid_argument(format!("invalid voluntary exit: {e:?}")))?;

        self.operation_notifier
            .send(OperationEvent::ExitReceived(Box::new(exit.clone())));
        self.broadcaster
            .broadcast(PubsubMessage::VoluntaryExit(Box::new(exit.clone())))
            .map_err(|e| {
                RpcError::internal(format!("could not broadcast exit: {e}"))
                    .with_reason(Reason::BroadcastFailed)
            })?;
        self.pools
            .voluntary_exits
            .save(exit)
            .map_err(|e| RpcError::internal(format!("could not save exit: {e:?}")))?;
        Ok(())
    }

    /// `SubmitBlsToExecutionChange` (post-Capella).
    pub fn submit_bls_to_execution_change(
        &self,
        change: SignedBlsToExecutionChange,
    ) -> Result<(), RpcError> {
        let current_epoch = self.current_epoch()?;
        if !self.spec.fork_name_at_epoch(current_epoch).capella_enabled() {
            return Err(RpcError::failed_precondition(
                "BLS-to-execution changes are not accepted before the Capella fork",
            ));
        }

        self.operation_notifier
            .send(OperationEvent::BlsToExecutionChangeReceived(Box::new(
                change.clone(),
            )));
        self.broadcaster
            .broadcast(PubsubMessage::BlsToExecutionChange(Box::new(change.clone())))
            .map_err(|e| {
                RpcError::internal(format!("could not broadcast change: {e}"))
                    .with_reason(Reason::BroadcastFailed)
            })?;
        self.pools
            .bls_changes
            .save(change)
            .map_err(|e| RpcError::internal(format!("could not save change: {e:?}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::StatusCode;
    use crate::test_utils::TestRig;
    use ssz_types::BitList;
    use tree_hash::TreeHash;
    use types::{
        AttestationBase, AttestationData, BeaconBlockHeader, Checkpoint, Epoch, ForkName,
        MinimalEthSpec, SignatureBytes, SignedBeaconBlockHeader, VoluntaryExit,
    };

    type E = MinimalEthSpec;

    fn attestation(slot: u64, bits: usize) -> Attestation<E> {
        let mut aggregation_bits = BitList::with_capacity(8).unwrap();
        for i in 0..bits {
            aggregation_bits.set(i, true).unwrap();
        }
        Attestation::Base(AttestationBase {
            aggregation_bits,
            data: AttestationData {
                slot: Slot::new(slot),
                index: 0,
                beacon_block_root: Hash256::repeat_byte(0xaa),
                source: Checkpoint::default(),
                target: Checkpoint {
                    epoch: Epoch::new(0),
                    root: Hash256::repeat_byte(0xbb),
                },
            },
            signature: SignatureBytes::empty(),
        })
    }

    #[tokio::test]
    async fn strongest_aggregate_is_served() {
        let rig = TestRig::<E>::new(8).at_slot(5);
        let weak = attestation(5, 1);
        let strong = attestation(5, 4);
        let data_root = weak.data().tree_hash_root();
        rig.server().pools.attestations.save(weak).unwrap();
        rig.server().pools.attestations.save(strong.clone()).unwrap();

        let aggregate = rig
            .server()
            .get_aggregate_attestation(Slot::new(5), data_root, None)
            .unwrap();
        assert_eq!(aggregate, strong);
    }

    #[tokio::test]
    async fn unknown_aggregate_is_not_found() {
        let rig = TestRig::<E>::new(8).at_slot(5);
        assert_eq!(
            rig.server()
                .get_aggregate_attestation(Slot::new(5), Hash256::ZERO, None)
                .unwrap_err()
                .code(),
            StatusCode::NotFound
        );
    }

    #[tokio::test]
    async fn invalid_proposer_slashing_is_rejected() {
        let rig = TestRig::<E>::new(8).at_slot(5);
        let header = SignedBeaconBlockHeader {
            message: BeaconBlockHeader {
                slot: Slot::new(1),
                proposer_index: 2,
                parent_root: Hash256::repeat_byte(0xaa),
                state_root: Hash256::ZERO,
                body_root: Hash256::ZERO,
            },
            signature: SignatureBytes::empty(),
        };
        // Identical headers are not a slashing.
        let err = rig
            .server()
            .submit_proposer_slashing(ProposerSlashing {
                signed_header_1: header.clone(),
                signed_header_2: header,
            })
            .unwrap_err();
        assert_eq!(err.code(), StatusCode::InvalidArgument);
    }

    #[tokio::test]
    async fn premature_exit_is_rejected() {
        let rig = TestRig::<E>::new(8).at_slot(5);
        let err = rig
            .server()
            .submit_voluntary_exit(SignedVoluntaryExit {
                message: VoluntaryExit {
                    epoch: Epoch::new(0),
                    validator_index: 1,
                },
                signature: SignatureBytes::empty(),
            })
            .unwrap_err();
        assert_eq!(err.code(), StatusCode::InvalidArgument);
    }

    #[tokio::test]
    async fn bls_change_requires_capella() {
        let rig = TestRig::<E>::new(8).at_slot(5);
        let change = SignedBlsToExecutionChange {
            message: types::BlsToExecutionChange {
                validator_index: 1,
                from_bls_pubkey: types::test_utils::interop_pubkey(1),
                to_execution_address: Default::default(),
            },
            signature: SignatureBytes::empty(),
        };
        // The default rig sits at Altair.
        assert_eq!(
            rig.server()
                .submit_bls_to_execution_change(change.clone())
                .unwrap_err()
                .code(),
            StatusCode::FailedPrecondition
        );

        let rig = TestRig::<E>::new(8).at_fork(ForkName::Capella).at_slot(5);
        rig.server().submit_bls_to_execution_change(change).unwrap();
    }
}
