//! Re-validation of pooled operations against the proposal state before
//! block inclusion. Pools accept optimistically; blocks must not carry
//! operations the state transition would reject. Signature verification
//! happens in the signing backend downstream, so these checks are
//! registry-level only.

use types::{
    AttesterSlashing, BeaconState, ChainSpec, Epoch, EthSpec, ProposerSlashing,
    SignedVoluntaryExit,
};

#[derive(Debug, Clone, PartialEq)]
pub enum OpInvalid {
    HeaderSlotMismatch,
    ProposerMismatch,
    HeadersIdentical,
    UnknownValidator(u64),
    NotSlashable,
    NoSlashableIndices,
    NotActive,
    AlreadyExited,
    ExitEpochInFuture { exit_epoch: Epoch },
    TooYoungToExit { active_since: Epoch },
}

/// A proposer slashing must carry two distinct signed headers for the same
/// slot from the same, still-slashable proposer.
pub fn check_proposer_slashing<E: EthSpec>(
    state: &BeaconState<E>,
    slashing: &ProposerSlashing,
) -> Result<(), OpInvalid> {
    let header_1 = &slashing.signed_header_1.message;
    let header_2 = &slashing.signed_header_2.message;

    if header_1.slot != header_2.slot {
        return Err(OpInvalid::HeaderSlotMismatch);
    }
    if header_1.proposer_index != header_2.proposer_index {
        return Err(OpInvalid::ProposerMismatch);
    }
    if header_1 == header_2 {
        return Err(OpInvalid::HeadersIdentical);
    }

    let proposer = state
        .validators
        .get(header_1.proposer_index as usize)
        .ok_or(OpInvalid::UnknownValidator(header_1.proposer_index))?;
    if !proposer.is_slashable_at(state.current_epoch()) {
        return Err(OpInvalid::NotSlashable);
    }
    Ok(())
}

/// An attester slashing must prove the slashing condition and name at
/// least one validator that is still slashable.
pub fn check_attester_slashing<E: EthSpec>(
    state: &BeaconState<E>,
    slashing: &AttesterSlashing<E>,
) -> Result<(), OpInvalid> {
    if !slashing
        .attestation_1
        .is_slashable_with(&slashing.attestation_2)
    {
        return Err(OpInvalid::NotSlashable);
    }

    let current_epoch = state.current_epoch();
    let any_slashable = slashing.intersecting_indices().into_iter().any(|index| {
        state
            .validators
            .get(index as usize)
            .is_some_and(|validator| validator.is_slashable_at(current_epoch))
    });
    if !any_slashable {
        return Err(OpInvalid::NoSlashableIndices);
    }
    Ok(())
}

/// A voluntary exit must come from an active validator that has served the
/// minimum period, has not already initiated exit, and whose exit epoch
/// has arrived.
pub fn check_voluntary_exit<E: EthSpec>(
    state: &BeaconState<E>,
    exit: &SignedVoluntaryExit,
    spec: &ChainSpec,
) -> Result<(), OpInvalid> {
    let message = &exit.message;
    let current_epoch = state.current_epoch();

    let validator = state
        .validators
        .get(message.validator_index as usize)
        .ok_or(OpInvalid::UnknownValidator(message.validator_index))?;

    if !validator.is_active_at(current_epoch) {
        return Err(OpInvalid::NotActive);
    }
    if validator.has_initiated_exit() {
        return Err(OpInvalid::AlreadyExited);
    }
    if current_epoch < message.epoch {
        return Err(OpInvalid::ExitEpochInFuture {
            exit_epoch: message.epoch,
        });
    }
    let eligible_epoch = validator.activation_epoch + spec.shard_committee_period;
    if current_epoch < eligible_epoch {
        return Err(OpInvalid::TooYoungToExit {
            active_since: validator.activation_epoch,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ssz_types::VariableList;
    use types::test_utils::interop_state;
    use types::{
        AttestationData, BeaconBlockHeader, Checkpoint, Hash256, IndexedAttestation,
        IndexedAttestationBase, MinimalEthSpec, SignatureBytes, SignedBeaconBlockHeader, Slot,
        VoluntaryExit,
    };

    type E = MinimalEthSpec;

    fn signed_header(slot: u64, proposer: u64, root: u8) -> SignedBeaconBlockHeader {
        SignedBeaconBlockHeader {
            message: BeaconBlockHeader {
                slot: Slot::new(slot),
                proposer_index: proposer,
                parent_root: Hash256::repeat_byte(root),
                state_root: Hash256::ZERO,
                body_root: Hash256::ZERO,
            },
            signature: SignatureBytes::empty(),
        }
    }

    fn indexed(indices: Vec<u64>, source: u64, target: u64, root: u8) -> IndexedAttestation<E> {
        IndexedAttestation::Base(IndexedAttestationBase {
            attesting_indices: VariableList::new(indices).unwrap(),
            data: AttestationData {
                slot: Epoch::new(target).start_slot(8),
                index: 0,
                beacon_block_root: Hash256::repeat_byte(root),
                source: Checkpoint {
                    epoch: Epoch::new(source),
                    root: Hash256::ZERO,
                },
                target: Checkpoint {
                    epoch: Epoch::new(target),
                    root: Hash256::repeat_byte(root),
                },
            },
            signature: SignatureBytes::empty(),
        })
    }

    #[test]
    fn valid_proposer_slashing_passes() {
        let state = interop_state::<E>(8, &ChainSpec::minimal());
        let slashing = ProposerSlashing {
            signed_header_1: signed_header(1, 2, 0xaa),
            signed_header_2: signed_header(1, 2, 0xbb),
        };
        assert!(check_proposer_slashing(&state, &slashing).is_ok());
    }

    #[test]
    fn identical_headers_rejected() {
        let state = interop_state::<E>(8, &ChainSpec::minimal());
        let slashing = ProposerSlashing {
            signed_header_1: signed_header(1, 2, 0xaa),
            signed_header_2: signed_header(1, 2, 0xaa),
        };
        assert_eq!(
            check_proposer_slashing(&state, &slashing),
            Err(OpInvalid::HeadersIdentical)
        );
    }

    #[test]
    fn already_slashed_proposer_rejected() {
        let mut state = interop_state::<E>(8, &ChainSpec::minimal());
        state.validators[2].slashed = true;
        let slashing = ProposerSlashing {
            signed_header_1: signed_header(1, 2, 0xaa),
            signed_header_2: signed_header(1, 2, 0xbb),
        };
        assert_eq!(
            check_proposer_slashing(&state, &slashing),
            Err(OpInvalid::NotSlashable)
        );
    }

    #[test]
    fn double_vote_attester_slashing_passes() {
        let state = interop_state::<E>(8, &ChainSpec::minimal());
        let slashing = AttesterSlashing {
            attestation_1: indexed(vec![1, 2, 3], 0, 2, 0xaa),
            attestation_2: indexed(vec![2, 3, 4], 0, 2, 0xbb),
        };
        assert!(check_attester_slashing(&state, &slashing).is_ok());
    }

    #[test]
    fn non_overlapping_attester_slashing_rejected() {
        let state = interop_state::<E>(8, &ChainSpec::minimal());
        let slashing = AttesterSlashing {
            attestation_1: indexed(vec![1, 2], 0, 2, 0xaa),
            attestation_2: indexed(vec![3, 4], 0, 2, 0xbb),
        };
        assert_eq!(
            check_attester_slashing(&state, &slashing),
            Err(OpInvalid::NoSlashableIndices)
        );
    }

    #[test]
    fn exit_requires_minimum_service() {
        let spec = ChainSpec::minimal();
        let mut state = interop_state::<E>(8, &spec);
        let exit = SignedVoluntaryExit {
            message: VoluntaryExit {
                epoch: Epoch::new(0),
                validator_index: 1,
            },
            signature: SignatureBytes::empty(),
        };
        // Current epoch 0 is before activation + shard_committee_period.
        assert!(matches!(
            check_voluntary_exit(&state, &exit, &spec),
            Err(OpInvalid::TooYoungToExit { .. })
        ));

        state.slot = Epoch::new(spec.shard_committee_period).start_slot(8);
        assert!(check_voluntary_exit(&state, &exit, &spec).is_ok());
    }

    #[test]
    fn double_exit_rejected() {
        let spec = ChainSpec::minimal();
        let mut state = interop_state::<E>(8, &spec);
        state.slot = Epoch::new(spec.shard_committee_period).start_slot(8);
        state.validators[1].exit_epoch = Epoch::new(1_000_000);
        let exit = SignedVoluntaryExit {
            message: VoluntaryExit {
                epoch: Epoch::new(0),
                validator_index: 1,
            },
            signature: SignatureBytes::empty(),
        };
        assert_eq!(
            check_voluntary_exit(&state, &exit, &spec),
            Err(OpInvalid::AlreadyExited)
        );
    }
}
