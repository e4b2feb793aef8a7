use crate::{
    Attestation, AttesterSlashing, BlsToExecutionChange, Deposit, Eth1Data, EthSpec,
    ExecutionPayload, ExecutionPayloadBellatrix, ExecutionPayloadCapella, ExecutionPayloadDeneb,
    ExecutionRequests, ForkName, Graffiti, Hash256, KzgCommitments, ProposerSlashing,
    SignedBlsToExecutionChange, SignedVoluntaryExit, SyncAggregate,
};
use bls::SignatureBytes;
use merkle_proof::MerkleTree;
use serde::{Deserialize, Serialize};
use ssz_derive::Encode;
use ssz_types::VariableList;
use superstruct::superstruct;
use tree_hash::TreeHash;
use tree_hash_derive::TreeHash;

/// The index of the `blob_kzg_commitments` field in the Deneb and Electra
/// block bodies, used for sidecar inclusion proofs.
pub const BLOB_KZG_COMMITMENTS_INDEX: usize = 11;

/// The number of leaves in the merkleization of a post-Deneb block body
/// (twelve fields padded to sixteen).
const BODY_TREE_DEPTH: usize = 4;

/// The contents of a beacon block, by fork.
///
/// Each fork appends fields: Altair the sync aggregate, Bellatrix the
/// execution payload, Capella BLS-to-execution changes, Deneb the blob KZG
/// commitments and Electra the execution requests (while shrinking the
/// attestation lists to their aggregated-committee forms).
#[superstruct(
    variants(Base, Altair, Bellatrix, Capella, Deneb, Electra),
    variant_attributes(
        derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, TreeHash),
        serde(bound = "E: EthSpec", deny_unknown_fields),
    ),
    ref_attributes(derive(Debug))
)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, TreeHash)]
#[serde(untagged, bound = "E: EthSpec")]
#[ssz(enum_behaviour = "transparent")]
#[tree_hash(enum_behaviour = "transparent")]
pub struct BeaconBlockBody<E: EthSpec> {
    pub randao_reveal: SignatureBytes,
    pub eth1_data: Eth1Data,
    pub graffiti: Graffiti,
    pub proposer_slashings: VariableList<ProposerSlashing, E::MaxProposerSlashings>,
    #[superstruct(
        only(Base, Altair, Bellatrix, Capella, Deneb),
        partial_getter(rename = "attester_slashings_base")
    )]
    pub attester_slashings: VariableList<AttesterSlashing<E>, E::MaxAttesterSlashings>,
    #[superstruct(only(Electra), partial_getter(rename = "attester_slashings_electra"))]
    pub attester_slashings: VariableList<AttesterSlashing<E>, E::MaxAttesterSlashingsElectra>,
    #[superstruct(
        only(Base, Altair, Bellatrix, Capella, Deneb),
        partial_getter(rename = "attestations_base")
    )]
    pub attestations: VariableList<Attestation<E>, E::MaxAttestations>,
    #[superstruct(only(Electra), partial_getter(rename = "attestations_electra"))]
    pub attestations: VariableList<Attestation<E>, E::MaxAttestationsElectra>,
    pub deposits: VariableList<Deposit, E::MaxDeposits>,
    pub voluntary_exits: VariableList<SignedVoluntaryExit, E::MaxVoluntaryExits>,
    #[superstruct(only(Altair, Bellatrix, Capella, Deneb, Electra))]
    pub sync_aggregate: SyncAggregate<E>,
    #[superstruct(only(Bellatrix), partial_getter(rename = "execution_payload_bellatrix"))]
    pub execution_payload: ExecutionPayloadBellatrix<E>,
    #[superstruct(only(Capella), partial_getter(rename = "execution_payload_capella"))]
    pub execution_payload: ExecutionPayloadCapella<E>,
    #[superstruct(
        only(Deneb, Electra),
        partial_getter(rename = "execution_payload_deneb")
    )]
    pub execution_payload: ExecutionPayloadDeneb<E>,
    #[superstruct(only(Capella, Deneb, Electra))]
    pub bls_to_execution_changes:
        VariableList<SignedBlsToExecutionChange, E::MaxBlsToExecutionChanges>,
    #[superstruct(
        only(Deneb, Electra),
        partial_getter(rename = "blob_kzg_commitments_raw")
    )]
    pub blob_kzg_commitments: KzgCommitments<E>,
    #[superstruct(only(Electra))]
    pub execution_requests: ExecutionRequests,
}

impl<E: EthSpec> BeaconBlockBody<E> {
    pub fn fork_name(&self) -> ForkName {
        match self {
            BeaconBlockBody::Base(_) => ForkName::Base,
            BeaconBlockBody::Altair(_) => ForkName::Altair,
            BeaconBlockBody::Bellatrix(_) => ForkName::Bellatrix,
            BeaconBlockBody::Capella(_) => ForkName::Capella,
            BeaconBlockBody::Deneb(_) => ForkName::Deneb,
            BeaconBlockBody::Electra(_) => ForkName::Electra,
        }
    }

    pub fn attestations(&self) -> &[Attestation<E>] {
        match self {
            BeaconBlockBody::Base(body) => &body.attestations,
            BeaconBlockBody::Altair(body) => &body.attestations,
            BeaconBlockBody::Bellatrix(body) => &body.attestations,
            BeaconBlockBody::Capella(body) => &body.attestations,
            BeaconBlockBody::Deneb(body) => &body.attestations,
            BeaconBlockBody::Electra(body) => &body.attestations,
        }
    }

    pub fn attester_slashings(&self) -> &[AttesterSlashing<E>] {
        match self {
            BeaconBlockBody::Base(body) => &body.attester_slashings,
            BeaconBlockBody::Altair(body) => &body.attester_slashings,
            BeaconBlockBody::Bellatrix(body) => &body.attester_slashings,
            BeaconBlockBody::Capella(body) => &body.attester_slashings,
            BeaconBlockBody::Deneb(body) => &body.attester_slashings,
            BeaconBlockBody::Electra(body) => &body.attester_slashings,
        }
    }

    pub fn execution_payload(&self) -> Option<ExecutionPayload<E>> {
        match self {
            BeaconBlockBody::Base(_) | BeaconBlockBody::Altair(_) => None,
            BeaconBlockBody::Bellatrix(body) => {
                Some(ExecutionPayload::Bellatrix(body.execution_payload.clone()))
            }
            BeaconBlockBody::Capella(body) => {
                Some(ExecutionPayload::Capella(body.execution_payload.clone()))
            }
            BeaconBlockBody::Deneb(body) => {
                Some(ExecutionPayload::Deneb(body.execution_payload.clone()))
            }
            BeaconBlockBody::Electra(body) => {
                Some(ExecutionPayload::Deneb(body.execution_payload.clone()))
            }
        }
    }

    pub fn blob_kzg_commitments(&self) -> Option<&KzgCommitments<E>> {
        match self {
            BeaconBlockBody::Deneb(body) => Some(&body.blob_kzg_commitments),
            BeaconBlockBody::Electra(body) => Some(&body.blob_kzg_commitments),
            _ => None,
        }
    }

    /// The merkle branch proving `blob_kzg_commitments[index]` against this
    /// body's tree-hash root, carried by the matching blob sidecar.
    ///
    /// The branch is the commitment's path inside the commitments list
    /// (including the length mixin) followed by the list's path among the
    /// body fields.
    pub fn kzg_commitment_merkle_proof(&self, index: usize) -> Result<Vec<Hash256>, Error> {
        let (field_leaves, commitments) = match self {
            BeaconBlockBody::Deneb(body) => (body.body_field_leaves(), &body.blob_kzg_commitments),
            BeaconBlockBody::Electra(body) => {
                (body.body_field_leaves(), &body.blob_kzg_commitments)
            }
            _ => return Err(Error::PriorForkHasNoBlobs),
        };
        if index >= commitments.len() {
            return Err(Error::CommitmentIndexOutOfBounds(index));
        }

        // Branch inside the commitments list, a depth-log2(max) tree with a
        // length mixin on top.
        let leaf_depth = (E::max_blobs_per_block() as u64).ilog2() as usize;
        let commitment_leaves: Vec<Hash256> =
            commitments.iter().map(|c| c.tree_hash_root()).collect();
        let commitments_tree = MerkleTree::create(&commitment_leaves, leaf_depth);
        let (_, mut proof) = commitments_tree
            .generate_proof(index, leaf_depth)
            .map_err(Error::MerkleTree)?;
        proof.push(commitments_length_mixin(commitments.len()));

        // Branch of the commitments field through the body fields.
        let body_tree = MerkleTree::create(&field_leaves, BODY_TREE_DEPTH);
        let (_, body_branch) = body_tree
            .generate_proof(BLOB_KZG_COMMITMENTS_INDEX, BODY_TREE_DEPTH)
            .map_err(Error::MerkleTree)?;
        proof.extend(body_branch);

        debug_assert_eq!(proof.len(), E::kzg_commitment_inclusion_proof_depth());
        Ok(proof)
    }
}

fn commitments_length_mixin(len: usize) -> Hash256 {
    let mut length_bytes = [0; 32];
    length_bytes[..8].copy_from_slice(&(len as u64).to_le_bytes());
    Hash256::from_slice(&length_bytes)
}

impl<E: EthSpec> BeaconBlockBodyDeneb<E> {
    /// Tree-hash roots of every body field, in container order.
    fn body_field_leaves(&self) -> Vec<Hash256> {
        vec![
            self.randao_reveal.tree_hash_root(),
            self.eth1_data.tree_hash_root(),
            self.graffiti.tree_hash_root(),
            self.proposer_slashings.tree_hash_root(),
            self.attester_slashings.tree_hash_root(),
            self.attestations.tree_hash_root(),
            self.deposits.tree_hash_root(),
            self.voluntary_exits.tree_hash_root(),
            self.sync_aggregate.tree_hash_root(),
            self.execution_payload.tree_hash_root(),
            self.bls_to_execution_changes.tree_hash_root(),
            self.blob_kzg_commitments.tree_hash_root(),
        ]
    }
}

impl<E: EthSpec> BeaconBlockBodyElectra<E> {
    fn body_field_leaves(&self) -> Vec<Hash256> {
        vec![
            self.randao_reveal.tree_hash_root(),
            self.eth1_data.tree_hash_root(),
            self.graffiti.tree_hash_root(),
            self.proposer_slashings.tree_hash_root(),
            self.attester_slashings.tree_hash_root(),
            self.attestations.tree_hash_root(),
            self.deposits.tree_hash_root(),
            self.voluntary_exits.tree_hash_root(),
            self.sync_aggregate.tree_hash_root(),
            self.execution_payload.tree_hash_root(),
            self.bls_to_execution_changes.tree_hash_root(),
            self.blob_kzg_commitments.tree_hash_root(),
            self.execution_requests.tree_hash_root(),
        ]
    }
}

#[derive(Debug, PartialEq, Clone)]
pub enum Error {
    PriorForkHasNoBlobs,
    CommitmentIndexOutOfBounds(usize),
    MerkleTree(merkle_proof::MerkleTreeError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{KzgCommitment, MainnetEthSpec};
    use merkle_proof::verify_merkle_proof;

    type E = MainnetEthSpec;

    fn deneb_body_with_commitments(n: usize) -> BeaconBlockBodyDeneb<E> {
        let commitments: Vec<KzgCommitment> =
            (0..n).map(|i| KzgCommitment([i as u8; 48])).collect();
        BeaconBlockBodyDeneb {
            randao_reveal: SignatureBytes::empty(),
            eth1_data: Eth1Data::default(),
            graffiti: Graffiti::ZERO,
            proposer_slashings: VariableList::empty(),
            attester_slashings: VariableList::empty(),
            attestations: VariableList::empty(),
            deposits: VariableList::empty(),
            voluntary_exits: VariableList::empty(),
            sync_aggregate: SyncAggregate::new(),
            execution_payload: ExecutionPayloadDeneb::default(),
            bls_to_execution_changes: VariableList::empty(),
            blob_kzg_commitments: VariableList::new(commitments).unwrap(),
        }
    }

    #[test]
    fn commitment_inclusion_proofs_verify() {
        let body = BeaconBlockBody::Deneb(deneb_body_with_commitments(3));
        let root = body.tree_hash_root();
        let commitments = body.blob_kzg_commitments().unwrap().clone();

        for (index, commitment) in commitments.iter().enumerate() {
            let proof = body.kzg_commitment_merkle_proof(index).unwrap();
            assert_eq!(proof.len(), E::kzg_commitment_inclusion_proof_depth());
            assert!(verify_merkle_proof(
                commitment.tree_hash_root(),
                &proof,
                E::kzg_commitment_inclusion_proof_depth(),
                blob_sidecar_proof_gindex::<E>(index),
                root,
            ));
        }
    }

    #[test]
    fn proof_fails_against_wrong_commitment() {
        let body = BeaconBlockBody::Deneb(deneb_body_with_commitments(2));
        let root = body.tree_hash_root();
        let proof = body.kzg_commitment_merkle_proof(0).unwrap();
        assert!(!verify_merkle_proof(
            KzgCommitment([0xff; 48]).tree_hash_root(),
            &proof,
            E::kzg_commitment_inclusion_proof_depth(),
            blob_sidecar_proof_gindex::<E>(0),
            root,
        ));
    }

    #[test]
    fn out_of_bounds_commitment_index_rejected() {
        let body = BeaconBlockBody::Deneb(deneb_body_with_commitments(1));
        assert_eq!(
            body.kzg_commitment_merkle_proof(1),
            Err(Error::CommitmentIndexOutOfBounds(1))
        );
    }

    /// The generalized position of commitment `index` under the body root,
    /// interpreted by `verify_merkle_proof` as a plain leaf index at the
    /// proof's depth.
    fn blob_sidecar_proof_gindex<E2: crate::EthSpec>(index: usize) -> usize {
        let leaf_depth = (E2::max_blobs_per_block() as u64).ilog2() as usize;
        // Within the list subtree the commitment sits at `index`; the list
        // subtree (including mixin) hangs off body field 11.
        (BLOB_KZG_COMMITMENTS_INDEX << (leaf_depth + 1)) | index
    }
}
