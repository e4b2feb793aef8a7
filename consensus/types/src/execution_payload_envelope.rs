use crate::{
    EthSpec, ExecutionPayloadDeneb, ExecutionRequests, Hash256, KzgCommitments, SignedRoot, Slot,
};
use bls::SignatureBytes;
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use tree_hash_derive::TreeHash;

/// The payload reveal under enshrined PBS: the full execution payload a
/// builder publishes after its bid won.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode, TreeHash)]
#[serde(bound = "E: EthSpec")]
pub struct ExecutionPayloadEnvelope<E: EthSpec> {
    pub payload: ExecutionPayloadDeneb<E>,
    pub execution_requests: ExecutionRequests,
    #[serde(with = "serde_utils::quoted_u64")]
    pub builder_index: u64,
    /// The beacon block this payload fulfils.
    pub beacon_block_root: Hash256,
    pub slot: Slot,
    pub blob_kzg_commitments: KzgCommitments<E>,
    /// The post-payload beacon state root.
    pub state_root: Hash256,
}

impl<E: EthSpec> SignedRoot for ExecutionPayloadEnvelope<E> {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode, TreeHash)]
#[serde(bound = "E: EthSpec")]
pub struct SignedExecutionPayloadEnvelope<E: EthSpec> {
    pub message: ExecutionPayloadEnvelope<E>,
    pub signature: SignatureBytes,
}

impl<E: EthSpec> SignedExecutionPayloadEnvelope<E> {
    pub fn slot(&self) -> Slot {
        self.message.slot
    }

    pub fn block_hash(&self) -> crate::ExecutionBlockHash {
        self.message.payload.block_hash
    }
}
