use crate::{EthSpec, Hash256, SignedRoot, Slot};
use bls::{AggregateSignature, SignatureBytes};
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use ssz_types::BitVector;
use tree_hash_derive::TreeHash;

/// Data for a payload-timeliness attestation under enshrined PBS.
///
/// PTC members attest to whether the execution payload was revealed on time
/// and its blob data is available.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Encode, Decode, TreeHash,
)]
pub struct PayloadAttestationData {
    pub beacon_block_root: Hash256,
    pub slot: Slot,
    pub payload_present: bool,
    pub blob_data_available: bool,
}

impl SignedRoot for PayloadAttestationData {}

/// An aggregated payload attestation as carried in a block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode, TreeHash)]
#[serde(bound = "E: EthSpec")]
pub struct PayloadAttestation<E: EthSpec> {
    pub aggregation_bits: BitVector<E::PtcSize>,
    pub data: PayloadAttestationData,
    pub signature: AggregateSignature,
}

/// A single PTC member's attestation as sent over the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode, TreeHash)]
pub struct PayloadAttestationMessage {
    #[serde(with = "serde_utils::quoted_u64")]
    pub validator_index: u64,
    pub data: PayloadAttestationData,
    pub signature: SignatureBytes,
}
