use crate::{Address, EthSpec, ExecutionBlockHash, Hash256, KzgCommitments, SignedRoot, Slot};
use bls::SignatureBytes;
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use tree_hash_derive::TreeHash;

/// The sentinel builder index a proposer uses when self-building.
pub const BUILDER_INDEX_SELF_BUILD: u64 = u64::MAX;

/// A builder's committed payload header under enshrined PBS.
///
/// The bid commits to the payload content via `block_hash` and the blob
/// commitments; the payload itself is revealed later in a
/// `SignedExecutionPayloadEnvelope`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, Encode, Decode, TreeHash)]
#[serde(bound = "E: EthSpec")]
pub struct ExecutionPayloadBid<E: EthSpec> {
    pub parent_block_hash: ExecutionBlockHash,
    pub parent_block_root: Hash256,
    pub block_hash: ExecutionBlockHash,
    pub prev_randao: Hash256,
    #[serde(with = "serde_utils::address_hex")]
    pub fee_recipient: Address,
    #[serde(with = "serde_utils::quoted_u64")]
    pub gas_limit: u64,
    #[serde(with = "serde_utils::quoted_u64")]
    pub builder_index: u64,
    pub slot: Slot,
    /// Amount the builder pays the proposer, in Gwei.
    #[serde(with = "serde_utils::quoted_u64")]
    pub value: u64,
    pub blob_kzg_commitments: KzgCommitments<E>,
}

impl<E: EthSpec> SignedRoot for ExecutionPayloadBid<E> {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode, TreeHash)]
#[serde(bound = "E: EthSpec")]
pub struct SignedExecutionPayloadBid<E: EthSpec> {
    pub message: ExecutionPayloadBid<E>,
    pub signature: SignatureBytes,
}
