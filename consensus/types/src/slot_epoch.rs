//! The `Slot` and `Epoch` types are defined as new types to enforce
//! type-safety between the two units of chain time.
//!
//! Subtraction saturates at zero: chain-time arithmetic near genesis
//! routinely underflows and every call site wants the clamped value. Use
//! `safe_arith` on the raw `u64` where overflow must be an error.

use crate::{ChainSpec, Hash256};
use safe_arith::{ArithError, SafeArith};
use serde::de::Error;
use std::fmt;

#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Slot(u64);

#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Epoch(u64);

macro_rules! impl_common {
    ($main:ident) => {
        impl $main {
            pub const fn new(x: u64) -> $main {
                $main(x)
            }

            pub const fn as_u64(&self) -> u64 {
                self.0
            }

            pub const fn as_usize(&self) -> usize {
                self.0 as usize
            }

            pub fn saturating_sub<T: Into<$main>>(&self, other: T) -> $main {
                $main(self.0.saturating_sub(other.into().0))
            }

            pub fn saturating_add<T: Into<$main>>(&self, other: T) -> $main {
                $main(self.0.saturating_add(other.into().0))
            }

            pub fn checked_sub<T: Into<$main>>(&self, other: T) -> Option<$main> {
                self.0.checked_sub(other.into().0).map($main)
            }

            pub fn safe_add<T: Into<$main>>(&self, other: T) -> Result<$main, ArithError> {
                self.0.safe_add(other.into().0).map($main)
            }

            pub fn safe_sub<T: Into<$main>>(&self, other: T) -> Result<$main, ArithError> {
                self.0.safe_sub(other.into().0).map($main)
            }
        }

        impl From<u64> for $main {
            fn from(x: u64) -> Self {
                $main(x)
            }
        }

        impl From<u32> for $main {
            fn from(x: u32) -> Self {
                $main(x as u64)
            }
        }

        impl From<usize> for $main {
            fn from(x: usize) -> Self {
                $main(x as u64)
            }
        }

        impl From<$main> for u64 {
            fn from(x: $main) -> u64 {
                x.0
            }
        }

        impl std::ops::Add<u64> for $main {
            type Output = $main;

            fn add(self, other: u64) -> $main {
                $main(self.0.saturating_add(other))
            }
        }

        impl std::ops::Add<$main> for $main {
            type Output = $main;

            fn add(self, other: $main) -> $main {
                self + other.0
            }
        }

        impl std::ops::AddAssign<u64> for $main {
            fn add_assign(&mut self, other: u64) {
                self.0 = self.0.saturating_add(other);
            }
        }

        impl std::ops::Sub<u64> for $main {
            type Output = $main;

            fn sub(self, other: u64) -> $main {
                $main(self.0.saturating_sub(other))
            }
        }

        impl std::ops::Sub<$main> for $main {
            type Output = $main;

            fn sub(self, other: $main) -> $main {
                self - other.0
            }
        }

        impl std::ops::Rem<u64> for $main {
            type Output = u64;

            fn rem(self, modulus: u64) -> u64 {
                self.0 % modulus
            }
        }

        impl fmt::Display for $main {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl fmt::Debug for $main {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($main), self.0)
            }
        }

        impl serde::Serialize for $main {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.0.to_string())
            }
        }

        impl<'de> serde::Deserialize<'de> for $main {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse::<u64>()
                    .map($main)
                    .map_err(|e| D::Error::custom(format!("invalid {}: {e}", stringify!($main))))
            }
        }

        impl ssz::Encode for $main {
            fn is_ssz_fixed_len() -> bool {
                <u64 as ssz::Encode>::is_ssz_fixed_len()
            }

            fn ssz_fixed_len() -> usize {
                <u64 as ssz::Encode>::ssz_fixed_len()
            }

            fn ssz_bytes_len(&self) -> usize {
                self.0.ssz_bytes_len()
            }

            fn ssz_append(&self, buf: &mut Vec<u8>) {
                self.0.ssz_append(buf)
            }
        }

        impl ssz::Decode for $main {
            fn is_ssz_fixed_len() -> bool {
                <u64 as ssz::Decode>::is_ssz_fixed_len()
            }

            fn ssz_fixed_len() -> usize {
                <u64 as ssz::Decode>::ssz_fixed_len()
            }

            fn from_ssz_bytes(bytes: &[u8]) -> Result<Self, ssz::DecodeError> {
                u64::from_ssz_bytes(bytes).map($main)
            }
        }

        impl tree_hash::TreeHash for $main {
            fn tree_hash_type() -> tree_hash::TreeHashType {
                <u64 as tree_hash::TreeHash>::tree_hash_type()
            }

            fn tree_hash_packed_encoding(&self) -> tree_hash::PackedEncoding {
                self.0.tree_hash_packed_encoding()
            }

            fn tree_hash_packing_factor() -> usize {
                <u64 as tree_hash::TreeHash>::tree_hash_packing_factor()
            }

            fn tree_hash_root(&self) -> tree_hash::Hash256 {
                self.0.tree_hash_root()
            }
        }
    };
}

impl_common!(Slot);
impl_common!(Epoch);

impl Slot {
    /// The epoch this slot belongs to (floor division).
    pub fn epoch(self, slots_per_epoch: u64) -> Epoch {
        Epoch::new(self.0 / slots_per_epoch)
    }

    pub fn max_value() -> Slot {
        Slot(u64::MAX)
    }
}

impl Epoch {
    pub fn max_value() -> Epoch {
        Epoch(u64::MAX)
    }

    /// The first slot of this epoch.
    pub fn start_slot(self, slots_per_epoch: u64) -> Slot {
        Slot(self.0.saturating_mul(slots_per_epoch))
    }

    /// The last slot of this epoch.
    pub fn end_slot(self, slots_per_epoch: u64) -> Slot {
        Slot(
            self.0
                .saturating_add(1)
                .saturating_mul(slots_per_epoch)
                .saturating_sub(1),
        )
    }

    /// The sync-committee period this epoch falls in.
    pub fn sync_committee_period(self, spec: &ChainSpec) -> Result<u64, ArithError> {
        self.0.safe_div(spec.epochs_per_sync_committee_period)
    }

    /// Iterate the slots of this epoch, in order.
    pub fn slot_iter(self, slots_per_epoch: u64) -> SlotIter {
        SlotIter {
            current_iteration: 0,
            epoch: self,
            slots_per_epoch,
        }
    }

    /// The root to sign over when a plain epoch number is the message, e.g.
    /// for RANDAO reveals and sync-committee selection.
    pub fn signing_root(self) -> Hash256 {
        use tree_hash::TreeHash;
        self.tree_hash_root()
    }
}

pub struct SlotIter {
    current_iteration: u64,
    epoch: Epoch,
    slots_per_epoch: u64,
}

impl Iterator for SlotIter {
    type Item = Slot;

    fn next(&mut self) -> Option<Slot> {
        if self.current_iteration >= self.slots_per_epoch {
            None
        } else {
            let start_slot = self.epoch.start_slot(self.slots_per_epoch);
            let previous = self.current_iteration;
            self.current_iteration += 1;
            Some(start_slot + previous)
        }
    }
}
