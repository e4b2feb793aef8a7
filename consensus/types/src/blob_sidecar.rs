use crate::{
    Blob, EthSpec, Hash256, KzgCommitment, KzgCommitments, KzgProof, SignedBeaconBlockHeader,
    Slot, beacon_block_body::BLOB_KZG_COMMITMENTS_INDEX,
};
use merkle_proof::verify_merkle_proof;
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use ssz_types::{FixedVector, VariableList};
use std::sync::Arc;
use tree_hash::TreeHash;
use tree_hash_derive::TreeHash;

pub type KzgProofs<E> = VariableList<KzgProof, <E as EthSpec>::MaxBlobCommitmentsPerBlock>;
pub type BlobSidecarList<E> =
    VariableList<Arc<BlobSidecar<E>>, <E as EthSpec>::MaxBlobCommitmentsPerBlock>;

/// The payload + commitments + proofs triple handed back by the execution
/// engine (or the builder on unblinding) alongside a payload.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, Encode, Decode)]
#[serde(bound = "E: EthSpec")]
pub struct BlobsBundle<E: EthSpec> {
    pub commitments: KzgCommitments<E>,
    pub proofs: KzgProofs<E>,
    pub blobs: VariableList<Blob<E>, E::MaxBlobCommitmentsPerBlock>,
}

impl<E: EthSpec> BlobsBundle<E> {
    /// The structural invariant: one proof and one blob per commitment.
    pub fn is_consistent(&self) -> bool {
        self.commitments.len() == self.proofs.len() && self.commitments.len() == self.blobs.len()
    }
}

/// The data-availability object accompanying a post-Deneb block, one per
/// KZG commitment in the block body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode, TreeHash)]
#[serde(bound = "E: EthSpec")]
pub struct BlobSidecar<E: EthSpec> {
    #[serde(with = "serde_utils::quoted_u64")]
    pub index: u64,
    pub blob: Blob<E>,
    pub kzg_commitment: KzgCommitment,
    pub kzg_proof: KzgProof,
    pub signed_block_header: SignedBeaconBlockHeader,
    pub kzg_commitment_inclusion_proof: FixedVector<Hash256, E::KzgCommitmentInclusionProofDepth>,
}

impl<E: EthSpec> BlobSidecar<E> {
    pub fn slot(&self) -> Slot {
        self.signed_block_header.message.slot
    }

    pub fn block_root(&self) -> Hash256 {
        self.signed_block_header.message.tree_hash_root()
    }

    /// The leaf position `index` resolves to at the inclusion-proof depth,
    /// under the block body root.
    pub fn proof_leaf_index(index: usize) -> usize {
        let leaf_depth = (E::max_blobs_per_block() as u64).ilog2() as usize;
        (BLOB_KZG_COMMITMENTS_INDEX << (leaf_depth + 1)) | index
    }

    /// Check the commitment is included in the block body this sidecar's
    /// header commits to.
    pub fn verify_blob_sidecar_inclusion_proof(&self) -> bool {
        verify_merkle_proof(
            self.kzg_commitment.tree_hash_root(),
            &self.kzg_commitment_inclusion_proof,
            E::kzg_commitment_inclusion_proof_depth(),
            Self::proof_leaf_index(self.index as usize),
            self.signed_block_header.message.body_root,
        )
    }
}
