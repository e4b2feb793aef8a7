use crate::{EthSpec, ExecutionPayloadHeader, KzgCommitments, SignedRoot, Uint256};
use bls::{PublicKeyBytes, SignatureBytes};
use serde::{Deserialize, Serialize};
use ssz_derive::Encode;
use tree_hash_derive::TreeHash;

/// A builder's offer: a payload header plus the Wei it pays the proposer.
///
/// `blob_kzg_commitments` is empty before Deneb.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, TreeHash)]
#[serde(bound = "E: EthSpec")]
pub struct BuilderBid<E: EthSpec> {
    pub header: ExecutionPayloadHeader<E>,
    pub blob_kzg_commitments: KzgCommitments<E>,
    #[serde(with = "serde_utils::quoted_u256")]
    pub value: Uint256,
    pub pubkey: PublicKeyBytes,
}

impl<E: EthSpec> SignedRoot for BuilderBid<E> {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, TreeHash)]
#[serde(bound = "E: EthSpec")]
pub struct SignedBuilderBid<E: EthSpec> {
    pub message: BuilderBid<E>,
    pub signature: SignatureBytes,
}
