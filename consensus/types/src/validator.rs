use crate::{Epoch, Hash256};
use bls::PublicKeyBytes;
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use tree_hash_derive::TreeHash;

/// A validator record from the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode, TreeHash)]
pub struct Validator {
    pub pubkey: PublicKeyBytes,
    pub withdrawal_credentials: Hash256,
    #[serde(with = "serde_utils::quoted_u64")]
    pub effective_balance: u64,
    pub slashed: bool,
    pub activation_eligibility_epoch: Epoch,
    pub activation_epoch: Epoch,
    pub exit_epoch: Epoch,
    pub withdrawable_epoch: Epoch,
}

impl Validator {
    /// Returns `true` if the validator is considered active at some epoch.
    pub fn is_active_at(&self, epoch: Epoch) -> bool {
        self.activation_epoch <= epoch && epoch < self.exit_epoch
    }

    /// Returns `true` if the validator is able to withdraw at some epoch.
    pub fn is_withdrawable_at(&self, epoch: Epoch) -> bool {
        epoch >= self.withdrawable_epoch
    }

    /// Returns `true` if the validator is eligible to be slashed at `epoch`.
    pub fn is_slashable_at(&self, epoch: Epoch) -> bool {
        !self.slashed && self.activation_epoch <= epoch && epoch < self.withdrawable_epoch
    }

    /// Returns `true` if the validator has initiated (or completed) exit.
    pub fn has_initiated_exit(&self) -> bool {
        self.exit_epoch != Epoch::max_value()
    }
}

impl Default for Validator {
    /// A validator that has deposited but not yet been processed: every
    /// epoch field is the far-future sentinel.
    fn default() -> Self {
        Self {
            pubkey: PublicKeyBytes::empty(),
            withdrawal_credentials: Hash256::ZERO,
            effective_balance: 0,
            slashed: false,
            activation_eligibility_epoch: Epoch::max_value(),
            activation_epoch: Epoch::max_value(),
            exit_epoch: Epoch::max_value(),
            withdrawable_epoch: Epoch::max_value(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn active_validator(activation: u64, exit: u64) -> Validator {
        Validator {
            activation_epoch: Epoch::new(activation),
            exit_epoch: Epoch::new(exit),
            ..Validator::default()
        }
    }

    #[test]
    fn activity_window() {
        let v = active_validator(2, 10);
        assert!(!v.is_active_at(Epoch::new(1)));
        assert!(v.is_active_at(Epoch::new(2)));
        assert!(v.is_active_at(Epoch::new(9)));
        assert!(!v.is_active_at(Epoch::new(10)));
    }

    #[test]
    fn default_is_never_active() {
        let v = Validator::default();
        assert!(!v.is_active_at(Epoch::new(0)));
        assert!(!v.is_active_at(Epoch::max_value() - 1));
        assert!(!v.has_initiated_exit());
    }

    #[test]
    fn slashed_validator_not_slashable() {
        let mut v = active_validator(0, 100);
        v.withdrawable_epoch = Epoch::new(200);
        assert!(v.is_slashable_at(Epoch::new(50)));
        v.slashed = true;
        assert!(!v.is_slashable_at(Epoch::new(50)));
    }
}
