//! Types for the consensus side of a beacon node: chain time, attestations,
//! blocks across forks, payloads, sidecars and the state view the validator
//! RPC surface reads.

pub mod test_utils;

mod aggregate_and_proof;
mod attestation;
mod attestation_data;
mod attester_slashing;
mod beacon_block;
mod beacon_block_body;
mod beacon_block_header;
mod beacon_state;
mod blinded_beacon_block;
mod blob_sidecar;
mod bls_to_execution_change;
mod builder_bid;
mod chain_spec;
mod checkpoint;
mod deposit;
mod deposit_data;
mod eth1_data;
mod eth_spec;
mod execution_block_hash;
mod execution_payload;
mod execution_payload_bid;
mod execution_payload_envelope;
mod execution_payload_header;
mod execution_requests;
mod fork;
mod fork_name;
mod indexed_attestation;
mod kzg;
mod payload_attestation;
mod proposer_slashing;
mod relative_epoch;
mod signing_data;
mod slot_epoch;
mod subnet_id;
mod sync_aggregate;
mod sync_committee;
mod sync_committee_contribution;
mod sync_committee_message;
mod validator;
mod voluntary_exit;
mod withdrawal;

pub use aggregate_and_proof::{AggregateAndProof, SignedAggregateAndProof};
pub use attestation::{
    Attestation, AttestationBase, AttestationElectra, AttestationRef,
    Error as AttestationError,
};
pub use attestation_data::AttestationData;
pub use attester_slashing::AttesterSlashing;
pub use beacon_block::{
    BeaconBlock, BeaconBlockAltair, BeaconBlockBase, BeaconBlockBellatrix, BeaconBlockCapella,
    BeaconBlockDeneb, BeaconBlockElectra, SignedBeaconBlock,
};
pub use beacon_block_body::{
    BLOB_KZG_COMMITMENTS_INDEX, BeaconBlockBody, BeaconBlockBodyAltair, BeaconBlockBodyBase,
    BeaconBlockBodyBellatrix, BeaconBlockBodyCapella, BeaconBlockBodyDeneb,
    BeaconBlockBodyElectra, Error as BlockBodyError,
};
pub use beacon_block_header::{BeaconBlockHeader, SignedBeaconBlockHeader};
pub use beacon_state::{
    BeaconCommittee, BeaconState, CommitteeAssignment, CommitteeCache,
    Error as BeaconStateError,
};
pub use blinded_beacon_block::{
    BlindedBeaconBlock, BlindedBeaconBlockBellatrix, BlindedBeaconBlockBody,
    BlindedBeaconBlockBodyBellatrix, BlindedBeaconBlockBodyCapella, BlindedBeaconBlockBodyDeneb,
    BlindedBeaconBlockBodyElectra, BlindedBeaconBlockCapella, BlindedBeaconBlockDeneb,
    BlindedBeaconBlockElectra, SignedBlindedBeaconBlock,
};
pub use blob_sidecar::{BlobSidecar, BlobSidecarList, BlobsBundle, KzgProofs};
pub use bls_to_execution_change::{BlsToExecutionChange, SignedBlsToExecutionChange};
pub use builder_bid::{BuilderBid, SignedBuilderBid};
pub use chain_spec::{ChainSpec, Domain};
pub use checkpoint::Checkpoint;
pub use deposit::{DEPOSIT_TREE_DEPTH, Deposit};
pub use deposit_data::DepositData;
pub use eth1_data::Eth1Data;
pub use eth_spec::{EthSpec, MainnetEthSpec, MinimalEthSpec};
pub use execution_block_hash::ExecutionBlockHash;
pub use execution_payload::{
    ExecutionPayload, ExecutionPayloadBellatrix, ExecutionPayloadCapella, ExecutionPayloadDeneb,
    Transaction, Transactions, Withdrawals,
};
pub use execution_payload_bid::{
    BUILDER_INDEX_SELF_BUILD, ExecutionPayloadBid, SignedExecutionPayloadBid,
};
pub use execution_payload_envelope::{ExecutionPayloadEnvelope, SignedExecutionPayloadEnvelope};
pub use execution_payload_header::{
    ExecutionPayloadHeader, ExecutionPayloadHeaderBellatrix, ExecutionPayloadHeaderCapella,
    ExecutionPayloadHeaderDeneb,
};
pub use execution_requests::{
    ConsolidationRequest, DepositRequest, ExecutionRequests, WithdrawalRequest,
};
pub use fork::{Fork, ForkData};
pub use fork_name::ForkName;
pub use indexed_attestation::{
    IndexedAttestation, IndexedAttestationBase, IndexedAttestationElectra,
};
pub use kzg::{
    BYTES_PER_COMMITMENT, BYTES_PER_PROOF, Blob, KzgCommitment, KzgCommitments, KzgProof,
};
pub use payload_attestation::{
    PayloadAttestation, PayloadAttestationData, PayloadAttestationMessage,
};
pub use proposer_slashing::ProposerSlashing;
pub use relative_epoch::RelativeEpoch;
pub use signing_data::{SignedRoot, SigningData};
pub use slot_epoch::{Epoch, Slot};
pub use subnet_id::{
    SubnetId, SyncSubnetId, compute_committees_per_slot, compute_subnet_for_attestation,
};
pub use sync_aggregate::SyncAggregate;
pub use sync_committee::SyncCommittee;
pub use sync_committee_contribution::{
    ContributionAndProof, SignedContributionAndProof, SyncCommitteeContribution,
};
pub use sync_committee_message::SyncCommitteeMessage;
pub use validator::Validator;
pub use voluntary_exit::{SignedVoluntaryExit, VoluntaryExit};
pub use withdrawal::Withdrawal;

pub use bls::{AggregateSignature, PublicKeyBytes, Signature, SignatureBytes};

/// A 32-byte beacon-chain root or digest.
pub type Hash256 = alloy_primitives::B256;
/// A 256-bit unsigned integer, e.g. a Wei amount.
pub type Uint256 = alloy_primitives::U256;
/// A 20-byte execution-layer address.
pub type Address = alloy_primitives::Address;
/// The 32 bytes of free-form data a proposer stamps on its block.
pub type Graffiti = Hash256;
/// An index into the validator registry.
pub type ValidatorIndex = u64;
/// A committee's position within its slot.
pub type CommitteeIndex = u64;

/// Extensions `alloy` does not provide on fixed byte arrays.
pub trait FixedBytesExtended {
    fn from_low_u64_be(value: u64) -> Self;
    fn zero() -> Self;
}

impl FixedBytesExtended for Hash256 {
    fn from_low_u64_be(value: u64) -> Self {
        let mut bytes = [0u8; 32];
        bytes[24..].copy_from_slice(&value.to_be_bytes());
        Self::from(bytes)
    }

    fn zero() -> Self {
        Self::ZERO
    }
}
