use serde::de::Error as _;
use std::fmt;
use std::str::FromStr;

/// The compression flag required on every serialized point.
const COMPRESSION_FLAG: u8 = 0x80;
/// The flag marking the point at infinity.
const INFINITY_FLAG: u8 = 0x40;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    InvalidByteLength { got: usize, expected: usize },
    /// The compression flag was not set, or reserved flag bits were abused.
    InvalidFlags,
    /// The infinity flag was set but the remaining bits were not all zero.
    InvalidInfinityEncoding,
    InvalidHex,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidByteLength { got, expected } => {
                write!(f, "invalid byte length {got}, expected {expected}")
            }
            Error::InvalidFlags => write!(f, "compression flag not set"),
            Error::InvalidInfinityEncoding => {
                write!(f, "non-canonical infinity encoding")
            }
            Error::InvalidHex => write!(f, "invalid hex string"),
        }
    }
}

impl std::error::Error for Error {}

/// Validates the structural encoding rules shared by G1 and G2 points.
pub(crate) fn check_structure(bytes: &[u8], expected: usize) -> Result<(), Error> {
    if bytes.len() != expected {
        return Err(Error::InvalidByteLength {
            got: bytes.len(),
            expected,
        });
    }
    if bytes[0] & COMPRESSION_FLAG == 0 {
        return Err(Error::InvalidFlags);
    }
    if bytes[0] & INFINITY_FLAG != 0 {
        let canonical_prefix = COMPRESSION_FLAG | INFINITY_FLAG;
        if bytes[0] != canonical_prefix || bytes[1..].iter().any(|b| *b != 0) {
            return Err(Error::InvalidInfinityEncoding);
        }
    }
    Ok(())
}

macro_rules! bytes_type {
    ($(#[$doc:meta])* $name:ident, $len:expr) => {
        $(#[$doc])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name {
            bytes: [u8; $len],
        }

        impl $name {
            /// The canonical encoding of the point at infinity.
            pub fn empty() -> Self {
                let mut bytes = [0; $len];
                bytes[0] = 0xc0;
                Self { bytes }
            }

            /// Parse from compressed bytes, validating structure only.
            pub fn deserialize(bytes: &[u8]) -> Result<Self, $crate::Error> {
                $crate::generic_bytes::check_structure(bytes, $len)?;
                let mut array = [0; $len];
                array.copy_from_slice(bytes);
                Ok(Self { bytes: array })
            }

            /// Construct without structural validation. Intended for fixtures
            /// and for values whose validity was established elsewhere.
            pub fn from_raw_unchecked(bytes: [u8; $len]) -> Self {
                Self { bytes }
            }

            pub fn serialize(&self) -> [u8; $len] {
                self.bytes
            }

            pub fn as_serialized(&self) -> &[u8] {
                &self.bytes
            }

            pub fn is_infinity(&self) -> bool {
                self.bytes[0] == 0xc0 && self.bytes[1..].iter().all(|b| *b == 0)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "0x{}", hex::encode(self.bytes))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{self}")
            }
        }

        impl FromStr for $name {
            type Err = $crate::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let stripped = s.strip_prefix("0x").ok_or($crate::Error::InvalidHex)?;
                let bytes = hex::decode(stripped).map_err(|_| $crate::Error::InvalidHex)?;
                Self::deserialize(&bytes)
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_string())
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                Self::from_str(&s).map_err(|e| D::Error::custom(format!("{e}")))
            }
        }

        impl ssz::Encode for $name {
            fn is_ssz_fixed_len() -> bool {
                true
            }

            fn ssz_fixed_len() -> usize {
                $len
            }

            fn ssz_bytes_len(&self) -> usize {
                $len
            }

            fn ssz_append(&self, buf: &mut Vec<u8>) {
                buf.extend_from_slice(&self.bytes)
            }
        }

        impl ssz::Decode for $name {
            fn is_ssz_fixed_len() -> bool {
                true
            }

            fn ssz_fixed_len() -> usize {
                $len
            }

            fn from_ssz_bytes(bytes: &[u8]) -> Result<Self, ssz::DecodeError> {
                if bytes.len() != $len {
                    return Err(ssz::DecodeError::InvalidByteLength {
                        len: bytes.len(),
                        expected: $len,
                    });
                }
                let mut array = [0; $len];
                array.copy_from_slice(bytes);
                // SSZ containers round-trip without structural checks; the
                // submit paths that care call `deserialize` explicitly.
                Ok(Self { bytes: array })
            }
        }

        impl tree_hash::TreeHash for $name {
            fn tree_hash_type() -> tree_hash::TreeHashType {
                tree_hash::TreeHashType::Vector
            }

            fn tree_hash_packed_encoding(&self) -> tree_hash::PackedEncoding {
                unreachable!("Vector should never be packed.")
            }

            fn tree_hash_packing_factor() -> usize {
                unreachable!("Vector should never be packed.")
            }

            fn tree_hash_root(&self) -> tree_hash::Hash256 {
                tree_hash::merkle_root(&self.bytes, 0)
            }
        }
    };
}
