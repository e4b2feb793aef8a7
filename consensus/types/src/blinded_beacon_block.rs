use crate::{
    Attestation, AttesterSlashing, BeaconBlock, BeaconBlockBellatrix, BeaconBlockBodyBellatrix,
    BeaconBlockBodyCapella, BeaconBlockBodyDeneb, BeaconBlockBodyElectra, BeaconBlockCapella,
    BeaconBlockDeneb, BeaconBlockElectra, BeaconBlockHeader, Deposit, Eth1Data, EthSpec,
    ExecutionPayload, ExecutionPayloadHeader, ExecutionPayloadHeaderBellatrix,
    ExecutionPayloadHeaderCapella, ExecutionPayloadHeaderDeneb, ExecutionRequests, ForkName,
    Graffiti, Hash256, KzgCommitments, ProposerSlashing, SignedBlsToExecutionChange,
    SignedRoot, SignedVoluntaryExit, Slot, SyncAggregate,
};
use bls::SignatureBytes;
use serde::{Deserialize, Serialize};
use ssz_derive::Encode;
use ssz_types::VariableList;
use superstruct::superstruct;
use tree_hash::TreeHash;
use tree_hash_derive::TreeHash;

/// The body of a blinded block: identical to the full body except the
/// execution payload is replaced by its header. Blinded blocks only exist
/// from Bellatrix onwards.
#[superstruct(
    variants(Bellatrix, Capella, Deneb, Electra),
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
pub struct BlindedBeaconBlockBody<E: EthSpec> {
    pub randao_reveal: SignatureBytes,
    pub eth1_data: Eth1Data,
    pub graffiti: Graffiti,
    pub proposer_slashings: VariableList<ProposerSlashing, E::MaxProposerSlashings>,
    #[superstruct(
        only(Bellatrix, Capella, Deneb),
        partial_getter(rename = "attester_slashings_base")
    )]
    pub attester_slashings: VariableList<AttesterSlashing<E>, E::MaxAttesterSlashings>,
    #[superstruct(only(Electra), partial_getter(rename = "attester_slashings_electra"))]
    pub attester_slashings: VariableList<AttesterSlashing<E>, E::MaxAttesterSlashingsElectra>,
    #[superstruct(
        only(Bellatrix, Capella, Deneb),
        partial_getter(rename = "attestations_base")
    )]
    pub attestations: VariableList<Attestation<E>, E::MaxAttestations>,
    #[superstruct(only(Electra), partial_getter(rename = "attestations_electra"))]
    pub attestations: VariableList<Attestation<E>, E::MaxAttestationsElectra>,
    pub deposits: VariableList<Deposit, E::MaxDeposits>,
    pub voluntary_exits: VariableList<SignedVoluntaryExit, E::MaxVoluntaryExits>,
    pub sync_aggregate: SyncAggregate<E>,
    #[superstruct(
        only(Bellatrix),
        partial_getter(rename = "execution_payload_header_bellatrix")
    )]
    pub execution_payload_header: ExecutionPayloadHeaderBellatrix<E>,
    #[superstruct(
        only(Capella),
        partial_getter(rename = "execution_payload_header_capella")
    )]
    pub execution_payload_header: ExecutionPayloadHeaderCapella<E>,
    #[superstruct(
        only(Deneb, Electra),
        partial_getter(rename = "execution_payload_header_deneb")
    )]
    pub execution_payload_header: ExecutionPayloadHeaderDeneb<E>,
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

/// A block carrying an execution-payload header in place of the payload,
/// produced when construction is outsourced to a builder.
#[superstruct(
    variants(Bellatrix, Capella, Deneb, Electra),
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
pub struct BlindedBeaconBlock<E: EthSpec> {
    #[superstruct(getter(copy))]
    pub slot: Slot,
    #[superstruct(getter(copy))]
    #[serde(with = "serde_utils::quoted_u64")]
    pub proposer_index: u64,
    #[superstruct(getter(copy))]
    pub parent_root: Hash256,
    #[superstruct(getter(copy))]
    pub state_root: Hash256,
    #[superstruct(only(Bellatrix), partial_getter(rename = "body_bellatrix"))]
    pub body: BlindedBeaconBlockBodyBellatrix<E>,
    #[superstruct(only(Capella), partial_getter(rename = "body_capella"))]
    pub body: BlindedBeaconBlockBodyCapella<E>,
    #[superstruct(only(Deneb), partial_getter(rename = "body_deneb"))]
    pub body: BlindedBeaconBlockBodyDeneb<E>,
    #[superstruct(only(Electra), partial_getter(rename = "body_electra"))]
    pub body: BlindedBeaconBlockBodyElectra<E>,
}

impl<E: EthSpec> SignedRoot for BlindedBeaconBlock<E> {}

impl<E: EthSpec> BlindedBeaconBlock<E> {
    pub fn fork_name(&self) -> ForkName {
        match self {
            BlindedBeaconBlock::Bellatrix(_) => ForkName::Bellatrix,
            BlindedBeaconBlock::Capella(_) => ForkName::Capella,
            BlindedBeaconBlock::Deneb(_) => ForkName::Deneb,
            BlindedBeaconBlock::Electra(_) => ForkName::Electra,
        }
    }

    pub fn canonical_root(&self) -> Hash256 {
        self.tree_hash_root()
    }

    pub fn body_root(&self) -> Hash256 {
        match self {
            BlindedBeaconBlock::Bellatrix(block) => block.body.tree_hash_root(),
            BlindedBeaconBlock::Capella(block) => block.body.tree_hash_root(),
            BlindedBeaconBlock::Deneb(block) => block.body.tree_hash_root(),
            BlindedBeaconBlock::Electra(block) => block.body.tree_hash_root(),
        }
    }

    pub fn block_header(&self) -> BeaconBlockHeader {
        BeaconBlockHeader {
            slot: self.slot(),
            proposer_index: self.proposer_index(),
            parent_root: self.parent_root(),
            state_root: self.state_root(),
            body_root: self.body_root(),
        }
    }

    /// The payload header committed to by this block.
    pub fn execution_payload_header(&self) -> ExecutionPayloadHeader<E> {
        match self {
            BlindedBeaconBlock::Bellatrix(block) => ExecutionPayloadHeader::Bellatrix(
                block.body.execution_payload_header.clone(),
            ),
            BlindedBeaconBlock::Capella(block) => {
                ExecutionPayloadHeader::Capella(block.body.execution_payload_header.clone())
            }
            BlindedBeaconBlock::Deneb(block) => {
                ExecutionPayloadHeader::Deneb(block.body.execution_payload_header.clone())
            }
            BlindedBeaconBlock::Electra(block) => {
                ExecutionPayloadHeader::Deneb(block.body.execution_payload_header.clone())
            }
        }
    }

    pub fn blob_kzg_commitments(&self) -> Option<&KzgCommitments<E>> {
        match self {
            BlindedBeaconBlock::Deneb(block) => Some(&block.body.blob_kzg_commitments),
            BlindedBeaconBlock::Electra(block) => Some(&block.body.blob_kzg_commitments),
            _ => None,
        }
    }

    /// Rebuild the full block by substituting `payload` for the header.
    ///
    /// Returns `None` when the payload's fork shape does not match the
    /// block's; the caller separately checks the header roots agree.
    pub fn into_full_block(self, payload: ExecutionPayload<E>) -> Option<BeaconBlock<E>> {
        let block = match (self, payload) {
            (BlindedBeaconBlock::Bellatrix(block), ExecutionPayload::Bellatrix(payload)) => {
                let body = block.body;
                BeaconBlock::Bellatrix(BeaconBlockBellatrix {
                    slot: block.slot,
                    proposer_index: block.proposer_index,
                    parent_root: block.parent_root,
                    state_root: block.state_root,
                    body: BeaconBlockBodyBellatrix {
                        randao_reveal: body.randao_reveal,
                        eth1_data: body.eth1_data,
                        graffiti: body.graffiti,
                        proposer_slashings: body.proposer_slashings,
                        attester_slashings: body.attester_slashings,
                        attestations: body.attestations,
                        deposits: body.deposits,
                        voluntary_exits: body.voluntary_exits,
                        sync_aggregate: body.sync_aggregate,
                        execution_payload: payload,
                    },
                })
            }
            (BlindedBeaconBlock::Capella(block), ExecutionPayload::Capella(payload)) => {
                let body = block.body;
                BeaconBlock::Capella(BeaconBlockCapella {
                    slot: block.slot,
                    proposer_index: block.proposer_index,
                    parent_root: block.parent_root,
                    state_root: block.state_root,
                    body: BeaconBlockBodyCapella {
                        randao_reveal: body.randao_reveal,
                        eth1_data: body.eth1_data,
                        graffiti: body.graffiti,
                        proposer_slashings: body.proposer_slashings,
                        attester_slashings: body.attester_slashings,
                        attestations: body.attestations,
                        deposits: body.deposits,
                        voluntary_exits: body.voluntary_exits,
                        sync_aggregate: body.sync_aggregate,
                        execution_payload: payload,
                        bls_to_execution_changes: body.bls_to_execution_changes,
                    },
                })
            }
            (BlindedBeaconBlock::Deneb(block), ExecutionPayload::Deneb(payload)) => {
                let body = block.body;
                BeaconBlock::Deneb(BeaconBlockDeneb {
                    slot: block.slot,
                    proposer_index: block.proposer_index,
                    parent_root: block.parent_root,
                    state_root: block.state_root,
                    body: BeaconBlockBodyDeneb {
                        randao_reveal: body.randao_reveal,
                        eth1_data: body.eth1_data,
                        graffiti: body.graffiti,
                        proposer_slashings: body.proposer_slashings,
                        attester_slashings: body.attester_slashings,
                        attestations: body.attestations,
                        deposits: body.deposits,
                        voluntary_exits: body.voluntary_exits,
                        sync_aggregate: body.sync_aggregate,
                        execution_payload: payload,
                        bls_to_execution_changes: body.bls_to_execution_changes,
                        blob_kzg_commitments: body.blob_kzg_commitments,
                    },
                })
            }
            (BlindedBeaconBlock::Electra(block), ExecutionPayload::Deneb(payload)) => {
                let body = block.body;
                BeaconBlock::Electra(BeaconBlockElectra {
                    slot: block.slot,
                    proposer_index: block.proposer_index,
                    parent_root: block.parent_root,
                    state_root: block.state_root,
                    body: BeaconBlockBodyElectra {
                        randao_reveal: body.randao_reveal,
                        eth1_data: body.eth1_data,
                        graffiti: body.graffiti,
                        proposer_slashings: body.proposer_slashings,
                        attester_slashings: body.attester_slashings,
                        attestations: body.attestations,
                        deposits: body.deposits,
                        voluntary_exits: body.voluntary_exits,
                        sync_aggregate: body.sync_aggregate,
                        execution_payload: payload,
                        bls_to_execution_changes: body.bls_to_execution_changes,
                        blob_kzg_commitments: body.blob_kzg_commitments,
                        execution_requests: body.execution_requests,
                    },
                })
            }
            _ => return None,
        };
        Some(block)
    }
}

/// A signed blinded block, awaiting unblinding by the builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, TreeHash)]
#[serde(bound = "E: EthSpec")]
pub struct SignedBlindedBeaconBlock<E: EthSpec> {
    pub message: BlindedBeaconBlock<E>,
    pub signature: SignatureBytes,
}

impl<E: EthSpec> SignedBlindedBeaconBlock<E> {
    pub fn slot(&self) -> Slot {
        self.message.slot()
    }

    pub fn fork_name(&self) -> ForkName {
        self.message.fork_name()
    }

    pub fn canonical_root(&self) -> Hash256 {
        self.message.canonical_root()
    }
}
