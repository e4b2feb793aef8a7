use crate::{
    Address, EthSpec, ExecutionBlockHash, ExecutionPayload, ExecutionPayloadBellatrix,
    ExecutionPayloadCapella, ExecutionPayloadDeneb, ForkName, Hash256, Uint256,
};
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use ssz_types::{FixedVector, VariableList};
use superstruct::superstruct;
use tree_hash::TreeHash;
use tree_hash_derive::TreeHash;

/// An execution payload with its variable-length interiors reduced to
/// roots: what blinded blocks and builder bids carry.
#[superstruct(
    variants(Bellatrix, Capella, Deneb),
    variant_attributes(
        derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, Encode, Decode, TreeHash),
        serde(bound = "E: EthSpec", deny_unknown_fields),
    ),
    ref_attributes(derive(Debug))
)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, TreeHash)]
#[serde(untagged, bound = "E: EthSpec")]
#[ssz(enum_behaviour = "transparent")]
#[tree_hash(enum_behaviour = "transparent")]
pub struct ExecutionPayloadHeader<E: EthSpec> {
    pub parent_hash: ExecutionBlockHash,
    #[serde(with = "serde_utils::address_hex")]
    pub fee_recipient: Address,
    pub state_root: Hash256,
    pub receipts_root: Hash256,
    #[serde(with = "ssz_types::serde_utils::hex_fixed_vec")]
    pub logs_bloom: FixedVector<u8, E::BytesPerLogsBloom>,
    pub prev_randao: Hash256,
    #[serde(with = "serde_utils::quoted_u64")]
    pub block_number: u64,
    #[serde(with = "serde_utils::quoted_u64")]
    pub gas_limit: u64,
    #[serde(with = "serde_utils::quoted_u64")]
    pub gas_used: u64,
    #[serde(with = "serde_utils::quoted_u64")]
    pub timestamp: u64,
    #[serde(with = "ssz_types::serde_utils::hex_var_list")]
    pub extra_data: VariableList<u8, E::MaxExtraDataBytes>,
    #[serde(with = "serde_utils::quoted_u256")]
    pub base_fee_per_gas: Uint256,
    pub block_hash: ExecutionBlockHash,
    pub transactions_root: Hash256,
    #[superstruct(only(Capella, Deneb))]
    pub withdrawals_root: Hash256,
    #[superstruct(only(Deneb))]
    #[serde(with = "serde_utils::quoted_u64")]
    pub blob_gas_used: u64,
    #[superstruct(only(Deneb))]
    #[serde(with = "serde_utils::quoted_u64")]
    pub excess_blob_gas: u64,
}

impl<E: EthSpec> ExecutionPayloadHeader<E> {
    pub fn fork_name(&self) -> ForkName {
        match self {
            ExecutionPayloadHeader::Bellatrix(_) => ForkName::Bellatrix,
            ExecutionPayloadHeader::Capella(_) => ForkName::Capella,
            ExecutionPayloadHeader::Deneb(_) => ForkName::Deneb,
        }
    }

    pub fn default_at_fork(fork_name: ForkName) -> Option<Self> {
        match fork_name {
            ForkName::Base | ForkName::Altair => None,
            ForkName::Bellatrix => {
                Some(Self::Bellatrix(ExecutionPayloadHeaderBellatrix::default()))
            }
            ForkName::Capella => Some(Self::Capella(ExecutionPayloadHeaderCapella::default())),
            ForkName::Deneb | ForkName::Electra => {
                Some(Self::Deneb(ExecutionPayloadHeaderDeneb::default()))
            }
        }
    }
}

impl<E: EthSpec> From<&ExecutionPayloadBellatrix<E>> for ExecutionPayloadHeaderBellatrix<E> {
    fn from(payload: &ExecutionPayloadBellatrix<E>) -> Self {
        Self {
            parent_hash: payload.parent_hash,
            fee_recipient: payload.fee_recipient,
            state_root: payload.state_root,
            receipts_root: payload.receipts_root,
            logs_bloom: payload.logs_bloom.clone(),
            prev_randao: payload.prev_randao,
            block_number: payload.block_number,
            gas_limit: payload.gas_limit,
            gas_used: payload.gas_used,
            timestamp: payload.timestamp,
            extra_data: payload.extra_data.clone(),
            base_fee_per_gas: payload.base_fee_per_gas,
            block_hash: payload.block_hash,
            transactions_root: payload.transactions.tree_hash_root(),
        }
    }
}

impl<E: EthSpec> From<&ExecutionPayloadCapella<E>> for ExecutionPayloadHeaderCapella<E> {
    fn from(payload: &ExecutionPayloadCapella<E>) -> Self {
        Self {
            parent_hash: payload.parent_hash,
            fee_recipient: payload.fee_recipient,
            state_root: payload.state_root,
            receipts_root: payload.receipts_root,
            logs_bloom: payload.logs_bloom.clone(),
            prev_randao: payload.prev_randao,
            block_number: payload.block_number,
            gas_limit: payload.gas_limit,
            gas_used: payload.gas_used,
            timestamp: payload.timestamp,
            extra_data: payload.extra_data.clone(),
            base_fee_per_gas: payload.base_fee_per_gas,
            block_hash: payload.block_hash,
            transactions_root: payload.transactions.tree_hash_root(),
            withdrawals_root: payload.withdrawals.tree_hash_root(),
        }
    }
}

impl<E: EthSpec> From<&ExecutionPayloadDeneb<E>> for ExecutionPayloadHeaderDeneb<E> {
    fn from(payload: &ExecutionPayloadDeneb<E>) -> Self {
        Self {
            parent_hash: payload.parent_hash,
            fee_recipient: payload.fee_recipient,
            state_root: payload.state_root,
            receipts_root: payload.receipts_root,
            logs_bloom: payload.logs_bloom.clone(),
            prev_randao: payload.prev_randao,
            block_number: payload.block_number,
            gas_limit: payload.gas_limit,
            gas_used: payload.gas_used,
            timestamp: payload.timestamp,
            extra_data: payload.extra_data.clone(),
            base_fee_per_gas: payload.base_fee_per_gas,
            block_hash: payload.block_hash,
            transactions_root: payload.transactions.tree_hash_root(),
            withdrawals_root: payload.withdrawals.tree_hash_root(),
            blob_gas_used: payload.blob_gas_used,
            excess_blob_gas: payload.excess_blob_gas,
        }
    }
}

impl<E: EthSpec> From<&ExecutionPayload<E>> for ExecutionPayloadHeader<E> {
    fn from(payload: &ExecutionPayload<E>) -> Self {
        match payload {
            ExecutionPayload::Bellatrix(payload) => {
                Self::Bellatrix(ExecutionPayloadHeaderBellatrix::from(payload))
            }
            ExecutionPayload::Capella(payload) => {
                Self::Capella(ExecutionPayloadHeaderCapella::from(payload))
            }
            ExecutionPayload::Deneb(payload) => {
                Self::Deneb(ExecutionPayloadHeaderDeneb::from(payload))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MainnetEthSpec;

    type E = MainnetEthSpec;

    #[test]
    fn header_root_tracks_payload_content() {
        let payload = ExecutionPayloadDeneb::<E> {
            block_number: 7,
            ..Default::default()
        };
        let header = ExecutionPayloadHeaderDeneb::from(&payload);
        assert_eq!(header.block_number, 7);

        let changed = ExecutionPayloadDeneb::<E> {
            block_number: 8,
            ..Default::default()
        };
        assert_ne!(
            header.tree_hash_root(),
            ExecutionPayloadHeaderDeneb::from(&changed).tree_hash_root()
        );
    }

    #[test]
    fn round_trip_header_root_is_stable() {
        let payload = ExecutionPayload::<E>::Deneb(ExecutionPayloadDeneb::default());
        let header_a = ExecutionPayloadHeader::from(&payload);
        let header_b = ExecutionPayloadHeader::from(&payload);
        assert_eq!(header_a.tree_hash_root(), header_b.tree_hash_root());
    }
}
