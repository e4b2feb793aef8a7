use crate::{Address, EthSpec, ExecutionBlockHash, ForkName, Hash256, Uint256, Withdrawal};
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use ssz_types::{FixedVector, VariableList};
use superstruct::superstruct;
use tree_hash_derive::TreeHash;

pub type Transaction<E> = VariableList<u8, <E as EthSpec>::MaxBytesPerTransaction>;
pub type Transactions<E> =
    VariableList<Transaction<E>, <E as EthSpec>::MaxTransactionsPerPayload>;
pub type Withdrawals<E> = VariableList<Withdrawal, <E as EthSpec>::MaxWithdrawalsPerPayload>;

/// The execution-layer block carried in a beacon block (post-Bellatrix).
///
/// Capella adds withdrawals; Deneb adds the blob-gas accounting fields.
/// Electra blocks reuse the Deneb payload shape.
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
pub struct ExecutionPayload<E: EthSpec> {
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
    pub transactions: Transactions<E>,
    #[superstruct(only(Capella, Deneb))]
    pub withdrawals: Withdrawals<E>,
    #[superstruct(only(Deneb))]
    #[serde(with = "serde_utils::quoted_u64")]
    pub blob_gas_used: u64,
    #[superstruct(only(Deneb))]
    #[serde(with = "serde_utils::quoted_u64")]
    pub excess_blob_gas: u64,
}

impl<E: EthSpec> ExecutionPayload<E> {
    /// The fork this payload shape belongs to; Electra payloads report
    /// `Deneb` here since the container did not change.
    pub fn fork_name(&self) -> ForkName {
        match self {
            ExecutionPayload::Bellatrix(_) => ForkName::Bellatrix,
            ExecutionPayload::Capella(_) => ForkName::Capella,
            ExecutionPayload::Deneb(_) => ForkName::Deneb,
        }
    }

    /// An all-default payload of the shape matching `fork_name`.
    pub fn default_at_fork(fork_name: ForkName) -> Option<Self> {
        match fork_name {
            ForkName::Base | ForkName::Altair => None,
            ForkName::Bellatrix => Some(Self::Bellatrix(ExecutionPayloadBellatrix::default())),
            ForkName::Capella => Some(Self::Capella(ExecutionPayloadCapella::default())),
            ForkName::Deneb | ForkName::Electra => {
                Some(Self::Deneb(ExecutionPayloadDeneb::default()))
            }
        }
    }
}
