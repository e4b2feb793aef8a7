use crate::{
    BeaconBlockBody, BeaconBlockBodyAltair, BeaconBlockBodyBase, BeaconBlockBodyBellatrix,
    BeaconBlockBodyCapella, BeaconBlockBodyDeneb, BeaconBlockBodyElectra, BeaconBlockHeader,
    EthSpec, ForkName, Hash256, KzgCommitments, SignedRoot, Slot,
};
use bls::SignatureBytes;
use serde::{Deserialize, Serialize};
use ssz_derive::Encode;
use superstruct::superstruct;
use tree_hash::TreeHash;
use tree_hash_derive::TreeHash;

/// A block with a full execution payload (or none, pre-Bellatrix).
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
pub struct BeaconBlock<E: EthSpec> {
    #[superstruct(getter(copy))]
    pub slot: Slot,
    #[superstruct(getter(copy))]
    #[serde(with = "serde_utils::quoted_u64")]
    pub proposer_index: u64,
    #[superstruct(getter(copy))]
    pub parent_root: Hash256,
    #[superstruct(getter(copy))]
    pub state_root: Hash256,
    #[superstruct(only(Base), partial_getter(rename = "body_base"))]
    pub body: BeaconBlockBodyBase<E>,
    #[superstruct(only(Altair), partial_getter(rename = "body_altair"))]
    pub body: BeaconBlockBodyAltair<E>,
    #[superstruct(only(Bellatrix), partial_getter(rename = "body_bellatrix"))]
    pub body: BeaconBlockBodyBellatrix<E>,
    #[superstruct(only(Capella), partial_getter(rename = "body_capella"))]
    pub body: BeaconBlockBodyCapella<E>,
    #[superstruct(only(Deneb), partial_getter(rename = "body_deneb"))]
    pub body: BeaconBlockBodyDeneb<E>,
    #[superstruct(only(Electra), partial_getter(rename = "body_electra"))]
    pub body: BeaconBlockBodyElectra<E>,
}

impl<E: EthSpec> SignedRoot for BeaconBlock<E> {}

impl<E: EthSpec> BeaconBlock<E> {
    pub fn fork_name(&self) -> ForkName {
        match self {
            BeaconBlock::Base(_) => ForkName::Base,
            BeaconBlock::Altair(_) => ForkName::Altair,
            BeaconBlock::Bellatrix(_) => ForkName::Bellatrix,
            BeaconBlock::Capella(_) => ForkName::Capella,
            BeaconBlock::Deneb(_) => ForkName::Deneb,
            BeaconBlock::Electra(_) => ForkName::Electra,
        }
    }

    /// The root used to identify this block on the chain.
    pub fn canonical_root(&self) -> Hash256 {
        self.tree_hash_root()
    }

    pub fn body_root(&self) -> Hash256 {
        match self {
            BeaconBlock::Base(block) => block.body.tree_hash_root(),
            BeaconBlock::Altair(block) => block.body.tree_hash_root(),
            BeaconBlock::Bellatrix(block) => block.body.tree_hash_root(),
            BeaconBlock::Capella(block) => block.body.tree_hash_root(),
            BeaconBlock::Deneb(block) => block.body.tree_hash_root(),
            BeaconBlock::Electra(block) => block.body.tree_hash_root(),
        }
    }

    /// A by-value view of the body, for callers that work across forks.
    pub fn body(&self) -> BeaconBlockBody<E> {
        match self {
            BeaconBlock::Base(block) => BeaconBlockBody::Base(block.body.clone()),
            BeaconBlock::Altair(block) => BeaconBlockBody::Altair(block.body.clone()),
            BeaconBlock::Bellatrix(block) => BeaconBlockBody::Bellatrix(block.body.clone()),
            BeaconBlock::Capella(block) => BeaconBlockBody::Capella(block.body.clone()),
            BeaconBlock::Deneb(block) => BeaconBlockBody::Deneb(block.body.clone()),
            BeaconBlock::Electra(block) => BeaconBlockBody::Electra(block.body.clone()),
        }
    }

    pub fn blob_kzg_commitments(&self) -> Option<&KzgCommitments<E>> {
        match self {
            BeaconBlock::Deneb(block) => Some(&block.body.blob_kzg_commitments),
            BeaconBlock::Electra(block) => Some(&block.body.blob_kzg_commitments),
            _ => None,
        }
    }

    /// Reduce to a header with the body replaced by its root.
    pub fn block_header(&self) -> BeaconBlockHeader {
        BeaconBlockHeader {
            slot: self.slot(),
            proposer_index: self.proposer_index(),
            parent_root: self.parent_root(),
            state_root: self.state_root(),
            body_root: self.body_root(),
        }
    }
}

/// A signed block as received from a proposing validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, TreeHash)]
#[serde(bound = "E: EthSpec")]
pub struct SignedBeaconBlock<E: EthSpec> {
    pub message: BeaconBlock<E>,
    pub signature: SignatureBytes,
}

impl<E: EthSpec> SignedBeaconBlock<E> {
    pub fn from_block(block: BeaconBlock<E>, signature: SignatureBytes) -> Self {
        Self {
            message: block,
            signature,
        }
    }

    pub fn slot(&self) -> Slot {
        self.message.slot()
    }

    pub fn fork_name(&self) -> ForkName {
        self.message.fork_name()
    }

    pub fn canonical_root(&self) -> Hash256 {
        self.message.canonical_root()
    }

    pub fn blob_kzg_commitments(&self) -> Option<&KzgCommitments<E>> {
        self.message.blob_kzg_commitments()
    }

    pub fn signed_block_header(&self) -> crate::SignedBeaconBlockHeader {
        crate::SignedBeaconBlockHeader {
            message: self.message.block_header(),
            signature: self.signature,
        }
    }
}
