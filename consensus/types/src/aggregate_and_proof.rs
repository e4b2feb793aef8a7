use crate::{Attestation, EthSpec, SignedRoot};
use bls::{AggregateSignature, SignatureBytes};
use serde::{Deserialize, Serialize};
use ssz_derive::Encode;
use tree_hash_derive::TreeHash;

/// An aggregate attestation plus the proof that its sender was selected to
/// aggregate for the subnet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, TreeHash)]
#[serde(bound = "E: EthSpec")]
pub struct AggregateAndProof<E: EthSpec> {
    #[serde(with = "serde_utils::quoted_u64")]
    pub aggregator_index: u64,
    pub aggregate: Attestation<E>,
    pub selection_proof: SignatureBytes,
}

impl<E: EthSpec> SignedRoot for AggregateAndProof<E> {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, TreeHash)]
#[serde(bound = "E: EthSpec")]
pub struct SignedAggregateAndProof<E: EthSpec> {
    pub message: AggregateAndProof<E>,
    pub signature: AggregateSignature,
}
