//! Deterministic fixtures shared by this crate's tests and by the mock
//! chain in `validator_rpc`.

use crate::{BeaconState, ChainSpec, Epoch, EthSpec, Eth1Data, Hash256, Validator};
use bls::PublicKeyBytes;

/// A structurally-valid, deterministic pubkey for validator `index`.
pub fn interop_pubkey(index: usize) -> PublicKeyBytes {
    let mut bytes = [0u8; bls::PUBLIC_KEY_BYTES_LEN];
    bytes[0] = 0xa1;
    bytes[1..9].copy_from_slice(&(index as u64).to_le_bytes());
    PublicKeyBytes::from_raw_unchecked(bytes)
}

/// A state with `validator_count` interop validators, all active from the
/// genesis epoch at full effective balance, with caches built.
pub fn interop_state<E: EthSpec>(validator_count: usize, spec: &ChainSpec) -> BeaconState<E> {
    let mut state = BeaconState::new(0, Eth1Data::default(), spec);
    state.genesis_validators_root = Hash256::repeat_byte(0x77);

    for index in 0..validator_count {
        state
            .validators
            .push(Validator {
                pubkey: interop_pubkey(index),
                effective_balance: spec.max_effective_balance,
                activation_eligibility_epoch: Epoch::new(0),
                activation_epoch: Epoch::new(0),
                ..Validator::default()
            })
            .expect("validator registry limit is far above test sizes");
        state
            .balances
            .push(spec.max_effective_balance)
            .expect("validator registry limit is far above test sizes");
        state
            .previous_epoch_participation
            .push(0)
            .expect("validator registry limit is far above test sizes");
        state
            .current_epoch_participation
            .push(0)
            .expect("validator registry limit is far above test sizes");
    }

    // Non-zero mixes so shuffling seeds differ between epochs.
    for i in 0..state.randao_mixes.len() {
        state.randao_mixes[i] = Hash256::repeat_byte((i % 251) as u8 + 1);
    }

    state.build_pubkey_cache();
    state
}
