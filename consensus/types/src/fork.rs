use crate::{Epoch, Hash256};
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use tree_hash_derive::TreeHash;

/// Specifies a fork of the beacon chain, as carried inside the state and
/// mixed into signature domains.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Encode, Decode, TreeHash,
)]
pub struct Fork {
    #[serde(with = "serde_utils::bytes_4_hex")]
    pub previous_version: [u8; 4],
    #[serde(with = "serde_utils::bytes_4_hex")]
    pub current_version: [u8; 4],
    pub epoch: Epoch,
}

impl Fork {
    /// The fork version active at `epoch`.
    pub fn get_fork_version(&self, epoch: Epoch) -> [u8; 4] {
        if epoch < self.epoch {
            return self.previous_version;
        }
        self.current_version
    }
}

/// Hashed into domains so signatures never validate across chains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode, TreeHash)]
pub struct ForkData {
    pub current_version: [u8; 4],
    pub genesis_validators_root: Hash256,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_selection_around_boundary() {
        let fork = Fork {
            previous_version: [0, 0, 0, 0],
            current_version: [1, 0, 0, 0],
            epoch: Epoch::new(10),
        };
        assert_eq!(fork.get_fork_version(Epoch::new(9)), [0, 0, 0, 0]);
        assert_eq!(fork.get_fork_version(Epoch::new(10)), [1, 0, 0, 0]);
        assert_eq!(fork.get_fork_version(Epoch::new(11)), [1, 0, 0, 0]);
    }
}
