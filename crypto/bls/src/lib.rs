//! Byte-level BLS containers.
//!
//! This crate stores public keys and signatures in their compressed wire
//! representation and validates *structure* only: length, the compression
//! flag, and the canonical point-at-infinity encoding. Pairing-level
//! verification (subgroup checks, on-curve checks against a message) is the
//! responsibility of the signature backend wired in by the process that
//! embeds this workspace; nothing in the RPC core verifies signatures
//! against state.

#[macro_use]
mod generic_bytes;

pub use generic_bytes::Error;

use serde::de::Error as _;
use std::fmt;
use std::str::FromStr;

pub const PUBLIC_KEY_BYTES_LEN: usize = 48;
pub const SIGNATURE_BYTES_LEN: usize = 96;

bytes_type!(
    /// A compressed G1 public key.
    PublicKeyBytes,
    PUBLIC_KEY_BYTES_LEN
);

bytes_type!(
    /// A compressed G2 signature, possibly the result of aggregation.
    SignatureBytes,
    SIGNATURE_BYTES_LEN
);

/// An aggregate of one or more signatures, stored compressed.
///
/// The distinction from `SignatureBytes` is semantic: an
/// `AggregateSignature` is what gossip and blocks carry, and `empty()` (the
/// point at infinity) is a meaningful value for it.
pub type AggregateSignature = SignatureBytes;

/// A single (non-aggregate) signature.
pub type Signature = SignatureBytes;
