//! Accepts signed proposals: unblinds builder blocks, synthesizes blob
//! sidecars, broadcasts, and hands everything to the chain's receivers.

use crate::ValidatorServer;
use crate::chain::PubsubMessage;
use crate::errors::{Reason, RpcError};
use crate::events::BlockEvent;
use slot_clock::SlotClock;
use ssz_types::FixedVector;
use std::sync::Arc;
use tracing::{info, warn};
use tree_hash::TreeHash;
use types::{
    BlobSidecar, BlobsBundle, EthSpec, ExecutionPayloadHeader, Hash256, SignedBeaconBlock,
    SignedBlindedBeaconBlock,
};

/// A signed proposal as submitted by the validator client.
#[derive(Debug, Clone)]
pub enum PublishBlockRequest<E: EthSpec> {
    Full {
        block: SignedBeaconBlock<E>,
        /// Blobs for the block's commitments; when absent, the bundle
        /// retained from this node's own payload build is used.
        blobs_bundle: Option<BlobsBundle<E>>,
    },
    Blinded(SignedBlindedBeaconBlock<E>),
}

impl<E: EthSpec, S: SlotClock> ValidatorServer<E, S> {
    /// `ProposeBlock(signed_block)`. Returns the block root.
    pub async fn propose_block(
        &self,
        request: PublishBlockRequest<E>,
    ) -> Result<Hash256, RpcError> {
        match request {
            PublishBlockRequest::Blinded(signed_blinded) => {
                let (block, bundle) = self.unblind(signed_blinded).await?;
                self.import_block(block, bundle)
            }
            PublishBlockRequest::Full {
                block,
                blobs_bundle,
            } => self.import_block(block, blobs_bundle),
        }
    }

    /// Exchange a signed blinded block for the full payload at the builder.
    ///
    /// The builder's payload must hash to exactly the header the proposer
    /// signed over; anything else is a protocol violation, not a retryable
    /// fault.
    async fn unblind(
        &self,
        signed_blinded: SignedBlindedBeaconBlock<E>,
    ) -> Result<(SignedBeaconBlock<E>, Option<BlobsBundle<E>>), RpcError> {
        let builder = self.builder.as_ref().ok_or_else(|| {
            RpcError::failed_precondition(
                "received a blinded block but no builder is configured",
            )
        })?;

        let (payload, builder_bundle) = builder
            .submit_blinded_block(signed_blinded.clone())
            .await
            .map_err(|e| {
                warn!(
                    slot = signed_blinded.slot().as_u64(),
                    error = %e,
                    "Builder failed to reveal payload"
                );
                RpcError::unavailable(format!("builder could not unblind block: {e}"))
                    .with_reason(Reason::BuilderUnavailable)
            })?;

        let signed_header = signed_blinded.message.execution_payload_header();
        let revealed_header = ExecutionPayloadHeader::from(&payload);
        let expected_root = signed_header.tree_hash_root();
        let revealed_root = revealed_header.tree_hash_root();
        if expected_root != revealed_root {
            warn!(
                slot = signed_blinded.slot().as_u64(),
                expected = %expected_root,
                revealed = %revealed_root,
                "Builder payload does not match the signed header"
            );
            return Err(RpcError::internal(
                "builder payload does not match the signed header",
            ));
        }

        let signature = signed_blinded.signature;
        let block = signed_blinded
            .message
            .into_full_block(payload)
            .ok_or_else(|| {
                RpcError::internal("builder payload fork does not match the block")
            })?;

        Ok((
            SignedBeaconBlock::from_block(block, signature),
            builder_bundle,
        ))
    }

    fn import_block(
        &self,
        block: SignedBeaconBlock<E>,
        blobs_bundle: Option<BlobsBundle<E>>,
    ) -> Result<Hash256, RpcError> {
        let slot = block.slot();
        let root = block.canonical_root();

        // Fall back to the bundle kept from this node's own payload build.
        let blobs_bundle = blobs_bundle.or_else(|| {
            let proposal = self.proposal_state.lock();
            (proposal.slot == Some(slot))
                .then(|| proposal.blobs_bundle.clone())
                .flatten()
        });
        let sidecars = self.build_blob_sidecars(&block, blobs_bundle)?;

        let block = Arc::new(block);
        self.broadcaster
            .broadcast(PubsubMessage::BeaconBlock(block.clone()))
            .map_err(|e| {
                RpcError::internal(format!("could not broadcast block: {e}"))
                    .with_reason(Reason::BroadcastFailed)
            })?;
        for sidecar in &sidecars {
            self.broadcaster
                .broadcast(PubsubMessage::BlobSidecar(sidecar.clone()))
                .map_err(|e| {
                    RpcError::internal(format!("could not broadcast blob sidecar: {e}"))
                        .with_reason(Reason::BroadcastFailed)
                })?;
        }

        self.block_receiver
            .receive_block((*block).clone())
            .map_err(|e| RpcError::internal(format!("could not import block: {e}")))?;
        if !sidecars.is_empty() {
            self.blob_receiver
                .receive_blobs(sidecars.iter().map(|s| (**s).clone()).collect())
                .map_err(|e| RpcError::internal(format!("could not import blobs: {e}")))?;
        }

        self.block_notifier.send(BlockEvent::ReceivedBlock {
            root,
            slot,
            verified: true,
            block,
        });
        info!(slot = slot.as_u64(), root = %root, "Accepted proposed block");
        Ok(root)
    }

    /// One sidecar per commitment. The bundle must agree element-wise with
    /// the block body's commitments; each sidecar carries a merkle proof of
    /// its commitment under the body root.
    fn build_blob_sidecars(
        &self,
        block: &SignedBeaconBlock<E>,
        blobs_bundle: Option<BlobsBundle<E>>,
    ) -> Result<Vec<Arc<BlobSidecar<E>>>, RpcError> {
        let commitments = match block.blob_kzg_commitments() {
            Some(commitments) if !commitments.is_empty() => commitments.clone(),
            _ => return Ok(Vec::new()),
        };
        let bundle = blobs_bundle.ok_or_else(|| {
            RpcError::internal("block commits to blobs but no blobs bundle is available")
        })?;

        if !bundle.is_consistent() || bundle.commitments.len() != commitments.len() {
            return Err(RpcError::internal(
                "blobs bundle does not match the block's commitments",
            ));
        }
        for (bundle_commitment, block_commitment) in
            bundle.commitments.iter().zip(commitments.iter())
        {
            if bundle_commitment != block_commitment {
                return Err(RpcError::internal(
                    "blobs bundle does not match the block's commitments",
                ));
            }
        }

        let signed_block_header = block.signed_block_header();
        let body = block.message.body();
        let mut sidecars = Vec::with_capacity(commitments.len());
        for (index, commitment) in commitments.iter().enumerate() {
            let proof = body.kzg_commitment_merkle_proof(index).map_err(|e| {
                RpcError::internal(format!("could not build inclusion proof: {e:?}"))
            })?;
            sidecars.push(Arc::new(BlobSidecar {
                index: index as u64,
                blob: bundle.blobs[index].clone(),
                kzg_commitment: *commitment,
                kzg_proof: bundle.proofs[index],
                signed_block_header: signed_block_header.clone(),
                kzg_commitment_inclusion_proof: FixedVector::new(proof).map_err(|e| {
                    RpcError::internal(format!("inclusion proof has the wrong depth: {e:?}"))
                })?,
            }));
        }
        Ok(sidecars)
    }
}
