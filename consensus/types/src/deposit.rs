use crate::{DepositData, Hash256};
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use ssz_types::FixedVector;
use ssz_types::typenum::U33;
use tree_hash_derive::TreeHash;

/// The merkle proof depth into the deposit tree, plus the length mixin.
pub const DEPOSIT_TREE_DEPTH: usize = 32;

/// A deposit included in a block, proven against the deposit-contract root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode, TreeHash)]
pub struct Deposit {
    pub proof: FixedVector<Hash256, U33>,
    pub data: DepositData,
}
