//! Accepts signed attestations and aggregates from validators: structural
//! checks, event-feed publication, subnet broadcast, then a detached pool
//! save. The event publish happens before the broadcast, the broadcast
//! before the pool save; none of it verifies signatures against state
//! (gossip does that downstream).

use crate::ValidatorServer;
use crate::chain::{AttestationPool, PubsubMessage};
use crate::errors::{Reason, RpcError};
use crate::events::OperationEvent;
use crate::metrics;
use slot_clock::SlotClock;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error};
use tree_hash::TreeHash;
use types::{
    Attestation, AttestationBase, AttestationElectra, EthSpec, Hash256, SignatureBytes,
    SignedAggregateAndProof, Slot, SubnetId, compute_committees_per_slot,
    compute_subnet_for_attestation,
};

/// Fire-and-forget attestation persistence. The RPC path enqueues; a
/// single worker drains into the pool. A full queue drops the save and
/// bumps a counter rather than blocking the submitter.
pub(crate) struct PoolSaveQueue<E: EthSpec> {
    sender: mpsc::Sender<Attestation<E>>,
}

impl<E: EthSpec> PoolSaveQueue<E> {
    pub fn spawn(pool: Arc<dyn AttestationPool<E>>, capacity: usize) -> Self {
        let (sender, mut receiver) = mpsc::channel::<Attestation<E>>(capacity);
        tokio::spawn(async move {
            while let Some(attestation) = receiver.recv().await {
                if let Err(e) = pool.save(attestation) {
                    error!(error = ?e, "Failed to save attestation to pool");
                }
            }
        });
        Self { sender }
    }

    pub fn enqueue(&self, attestation: Attestation<E>) {
        if self.sender.try_send(attestation).is_err() {
            metrics::inc_counter(&metrics::POOL_SAVE_QUEUE_DROPS);
            error!("Pool save queue full; dropping attestation");
        }
    }
}

impl<E: EthSpec, S: SlotClock> ValidatorServer<E, S> {
    /// `ProposeAttestation(attestation)`, the pre-Electra shape. Returns
    /// the attestation data root.
    pub fn propose_attestation(
        &self,
        attestation: AttestationBase<E>,
    ) -> Result<Hash256, RpcError> {
        validate_signature_structure(&attestation.signature)?;
        let committee_index = attestation.data.index;
        self.accept_attestation(Attestation::Base(attestation), committee_index)
    }

    /// `ProposeAttestationElectra(attestation)`. The committee index lives
    /// in `committee_bits`, of which exactly one must be set, and
    /// `data.index` must be zero.
    pub fn propose_attestation_electra(
        &self,
        attestation: AttestationElectra<E>,
    ) -> Result<Hash256, RpcError> {
        validate_signature_structure(&attestation.signature)?;
        attestation.verify_committee_bits().map_err(|e| {
            RpcError::invalid_argument(format!("invalid committee bits: {e:?}"))
        })?;
        let committee_index = attestation
            .committee_index()
            .ok_or_else(|| RpcError::invalid_argument("exactly one committee bit must be set"))?;
        self.accept_attestation(Attestation::Electra(attestation), committee_index)
    }

    fn accept_attestation(
        &self,
        attestation: Attestation<E>,
        committee_index: u64,
    ) -> Result<Hash256, RpcError> {
        let data_root = attestation.data().tree_hash_root();

        self.operation_notifier
            .send(OperationEvent::UnaggregatedAttReceived(Box::new(
                attestation.clone(),
            )));

        let subnet = self.attestation_subnet(attestation.data().slot, committee_index)?;
        self.broadcaster
            .broadcast_attestation(subnet, attestation.clone())
            .map_err(|e| {
                RpcError::internal(format!("could not broadcast attestation: {e}"))
                    .with_reason(Reason::BroadcastFailed)
            })?;

        metrics::inc_counter(&metrics::ATTESTATIONS_PUBLISHED);
        debug!(
            slot = attestation.data().slot.as_u64(),
            committee_index,
            subnet = subnet.as_u64(),
            "Broadcast unaggregated attestation"
        );

        // Persisted after the response is underway; failures are logged by
        // the queue worker and never surfaced.
        self.pool_save_queue.enqueue(attestation);

        Ok(data_root)
    }

    /// `SubmitSignedAggregateAndProof`.
    pub fn submit_signed_aggregate_and_proof(
        &self,
        aggregate: SignedAggregateAndProof<E>,
    ) -> Result<(), RpcError> {
        validate_signature_structure(&aggregate.signature)?;
        validate_signature_structure(&aggregate.message.selection_proof)?;
        if aggregate.message.aggregate.is_aggregation_bits_zero() {
            return Err(RpcError::invalid_argument(
                "aggregate attestation has no participants",
            ));
        }

        self.operation_notifier
            .send(OperationEvent::AggregatedAttReceived(Box::new(
                aggregate.clone(),
            )));

        self.broadcaster
            .broadcast(PubsubMessage::AggregateAndProof(Box::new(aggregate.clone())))
            .map_err(|e| {
                RpcError::internal(format!("could not broadcast aggregate: {e}"))
                    .with_reason(Reason::BroadcastFailed)
            })?;

        self.pool_save_queue.enqueue(aggregate.message.aggregate);
        Ok(())
    }

    fn attestation_subnet(&self, slot: Slot, committee_index: u64) -> Result<SubnetId, RpcError> {
        let epoch = slot.epoch(E::slots_per_epoch());
        let active = self
            .head
            .head_validators_indices(epoch)
            .map_err(|e| RpcError::internal(format!("active validator count: {e}")))?
            .len() as u64;
        let committees_per_slot = compute_committees_per_slot::<E>(active, &self.spec);
        Ok(compute_subnet_for_attestation::<E>(
            committees_per_slot,
            slot,
            committee_index,
            &self.spec,
        ))
    }
}

/// The signature bytes must parse as a compressed point. Verification
/// against state is the gossip pipeline's job.
fn validate_signature_structure(signature: &SignatureBytes) -> Result<(), RpcError> {
    SignatureBytes::deserialize(signature.as_serialized())
        .map(|_| ())
        .map_err(|_| RpcError::invalid_argument("Incorrect attestation signature"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::StatusCode;
    use crate::test_utils::TestRig;
    use ssz_types::{BitList, BitVector};
    use std::time::Duration;
    use types::{AttestationData, Checkpoint, Epoch, MinimalEthSpec};

    type E = MinimalEthSpec;

    fn attestation_data(slot: u64, committee_index: u64) -> AttestationData {
        AttestationData {
            slot: Slot::new(slot),
            index: committee_index,
            beacon_block_root: Hash256::repeat_byte(0xaa),
            source: Checkpoint::default(),
            target: Checkpoint {
                epoch: Epoch::new(slot / E::slots_per_epoch()),
                root: Hash256::repeat_byte(0xbb),
            },
        }
    }

    fn base_attestation(slot: u64, committee_index: u64) -> AttestationBase<E> {
        let mut aggregation_bits = BitList::with_capacity(4).unwrap();
        aggregation_bits.set(0, true).unwrap();
        AttestationBase {
            aggregation_bits,
            data: attestation_data(slot, committee_index),
            signature: SignatureBytes::empty(),
        }
    }

    fn electra_attestation(slot: u64, committee_bit: usize) -> AttestationElectra<E> {
        let mut committee_bits = BitVector::new();
        committee_bits.set(committee_bit, true).unwrap();
        let mut aggregation_bits = BitList::with_capacity(4).unwrap();
        aggregation_bits.set(0, true).unwrap();
        AttestationElectra {
            aggregation_bits,
            data: attestation_data(slot, 0),
            committee_bits,
            signature: SignatureBytes::empty(),
        }
    }

    #[tokio::test]
    async fn accepted_attestation_returns_data_root_and_broadcasts() {
        let rig = TestRig::<E>::new(64).at_slot(5);
        let attestation = base_attestation(5, 1);
        let expected_root = attestation.data.tree_hash_root();

        let root = rig.server().propose_attestation(attestation).unwrap();
        assert_eq!(root, expected_root);

        let broadcasts = rig.broadcast_attestations();
        assert_eq!(broadcasts.len(), 1);
        let (subnet, _) = &broadcasts[0];
        assert!(subnet.as_u64() < rig.spec().attestation_subnet_count);
    }

    #[tokio::test]
    async fn event_is_published_before_broadcast() {
        let rig = TestRig::<E>::new(64).at_slot(5);
        let mut events = rig.server().operation_notifier.subscribe();

        rig.server().propose_attestation(base_attestation(5, 0)).unwrap();

        match events.try_recv().unwrap() {
            OperationEvent::UnaggregatedAttReceived(att) => {
                assert_eq!(att.data().slot, Slot::new(5));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn attestation_lands_in_pool_via_detached_save() {
        let rig = TestRig::<E>::new(64).at_slot(5);
        rig.server().propose_attestation(base_attestation(5, 0)).unwrap();

        // The save is asynchronous; poll briefly.
        for _ in 0..50 {
            if rig.pool_attestation_count() == 1 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("attestation never reached the pool");
    }

    #[tokio::test]
    async fn duplicate_submission_inserts_once() {
        let rig = TestRig::<E>::new(64).at_slot(5);
        let attestation = base_attestation(5, 0);
        rig.server().propose_attestation(attestation.clone()).unwrap();
        rig.server().propose_attestation(attestation).unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(rig.pool_attestation_count(), 1);
    }

    #[tokio::test]
    async fn malformed_signature_is_rejected() {
        let rig = TestRig::<E>::new(64).at_slot(5);
        let mut attestation = base_attestation(5, 0);
        // Compression flag cleared: structurally invalid.
        attestation.signature = SignatureBytes::from_raw_unchecked([0u8; 96]);

        let err = rig.server().propose_attestation(attestation).unwrap_err();
        assert_eq!(err.code(), StatusCode::InvalidArgument);
        assert_eq!(err.message(), "Incorrect attestation signature");
        assert!(rig.broadcast_attestations().is_empty());
    }

    #[tokio::test]
    async fn electra_requires_exactly_one_committee_bit() {
        let rig = TestRig::<E>::new(64).at_slot(5);

        let mut no_bits = electra_attestation(5, 0);
        no_bits.committee_bits = BitVector::new();
        assert_eq!(
            rig.server()
                .propose_attestation_electra(no_bits)
                .unwrap_err()
                .code(),
            StatusCode::InvalidArgument
        );

        let mut two_bits = electra_attestation(5, 0);
        two_bits.committee_bits.set(1, true).unwrap();
        assert_eq!(
            rig.server()
                .propose_attestation_electra(two_bits)
                .unwrap_err()
                .code(),
            StatusCode::InvalidArgument
        );
    }

    #[tokio::test]
    async fn electra_requires_zero_data_index() {
        let rig = TestRig::<E>::new(64).at_slot(5);
        let mut attestation = electra_attestation(5, 1);
        attestation.data.index = 2;
        assert_eq!(
            rig.server()
                .propose_attestation_electra(attestation)
                .unwrap_err()
                .code(),
            StatusCode::InvalidArgument
        );
    }

    #[tokio::test]
    async fn electra_effective_index_comes_from_committee_bits() {
        let rig = TestRig::<E>::new(64).at_slot(5);
        let via_bit_two = rig
            .server()
            .propose_attestation_electra(electra_attestation(5, 2))
            .unwrap();
        assert_ne!(via_bit_two, Hash256::ZERO);

        let broadcasts = rig.broadcast_attestations();
        assert_eq!(broadcasts.len(), 1);
    }

    #[tokio::test]
    async fn empty_aggregate_is_rejected() {
        let rig = TestRig::<E>::new(64).at_slot(5);
        let aggregate = SignedAggregateAndProof {
            message: types::AggregateAndProof {
                aggregator_index: 0,
                aggregate: Attestation::Base(AttestationBase {
                    aggregation_bits: BitList::with_capacity(4).unwrap(),
                    data: attestation_data(5, 0),
                    signature: SignatureBytes::empty(),
                }),
                selection_proof: SignatureBytes::empty(),
            },
            signature: SignatureBytes::empty(),
        };
        assert_eq!(
            rig.server()
                .submit_signed_aggregate_and_proof(aggregate)
                .unwrap_err()
                .code(),
            StatusCode::InvalidArgument
        );
    }
}
