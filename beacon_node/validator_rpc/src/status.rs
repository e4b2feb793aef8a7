//! Validator status queries and the long-poll surfaces built on the state
//! notifier: chain-start wait, activation streaming and doppelganger
//! detection.

use crate::ValidatorServer;
use crate::errors::RpcError;
use crate::events::StateEvent;
use slot_clock::SlotClock;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;
use types::{BeaconState, Epoch, EthSpec, Hash256, PublicKeyBytes, Validator};

/// The lifecycle phase of a validator, as seen from the head state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidatorStatus {
    /// Not in the state and no deposit seen.
    Unknown,
    /// A deposit exists but the registry has not processed it.
    Deposited,
    /// In the registry, awaiting activation.
    Pending,
    Active,
    Exiting,
    Slashing,
    Exited,
    /// Exited and past the withdrawable epoch.
    Withdrawable,
}

/// Classify a registry entry at `epoch`.
pub(crate) fn registry_status(validator: &Validator, epoch: Epoch) -> ValidatorStatus {
    let far_future = Epoch::max_value();
    if epoch < validator.activation_epoch {
        if validator.activation_eligibility_epoch == far_future {
            ValidatorStatus::Deposited
        } else {
            ValidatorStatus::Pending
        }
    } else if epoch < validator.exit_epoch {
        if validator.slashed {
            ValidatorStatus::Slashing
        } else if validator.exit_epoch != far_future {
            ValidatorStatus::Exiting
        } else {
            ValidatorStatus::Active
        }
    } else if epoch < validator.withdrawable_epoch {
        if validator.slashed {
            ValidatorStatus::Slashing
        } else {
            ValidatorStatus::Exited
        }
    } else {
        ValidatorStatus::Withdrawable
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidatorStatusResponse {
    pub pubkey: PublicKeyBytes,
    pub status: ValidatorStatus,
    pub validator_index: Option<u64>,
    pub activation_epoch: Option<Epoch>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChainStartResponse {
    pub genesis_time: u64,
    pub genesis_validators_root: Hash256,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DoppelgangerRequest {
    pub pubkey: PublicKeyBytes,
    /// The last epoch the caller's validator signed anything.
    pub last_signed_epoch: Epoch,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DoppelgangerResponse {
    pub pubkey: PublicKeyBytes,
    pub duplicate_exists: bool,
}

impl<E: EthSpec, S: SlotClock + 'static> ValidatorServer<E, S> {
    /// `ValidatorStatus(pubkey)`.
    pub fn validator_status(
        &self,
        pubkey: &PublicKeyBytes,
    ) -> Result<ValidatorStatusResponse, RpcError> {
        let state = self
            .head
            .head_state_read_only()
            .map_err(|e| RpcError::internal(format!("head state: {e}")))?;
        Ok(self.status_from_state(&state, pubkey))
    }

    /// `MultipleValidatorStatus(pubkeys, indices)`: union of both request
    /// forms, in request order (pubkeys first).
    pub fn multiple_validator_status(
        &self,
        pubkeys: &[PublicKeyBytes],
        indices: &[u64],
    ) -> Result<Vec<ValidatorStatusResponse>, RpcError> {
        let state = self
            .head
            .head_state_read_only()
            .map_err(|e| RpcError::internal(format!("head state: {e}")))?;

        let mut responses: Vec<ValidatorStatusResponse> = pubkeys
            .iter()
            .map(|pubkey| self.status_from_state(&state, pubkey))
            .collect();
        for &index in indices {
            match state.validators.get(index as usize) {
                Some(validator) => {
                    let pubkey = validator.pubkey;
                    if !responses.iter().any(|r| r.pubkey == pubkey) {
                        responses.push(self.status_from_state(&state, &pubkey));
                    }
                }
                None => {
                    return Err(RpcError::not_found(format!(
                        "no validator at index {index}"
                    )));
                }
            }
        }
        Ok(responses)
    }

    fn status_from_state(
        &self,
        state: &BeaconState<E>,
        pubkey: &PublicKeyBytes,
    ) -> ValidatorStatusResponse {
        match state.get_validator_index(pubkey) {
            Some(index) => {
                let validator = &state.validators[index];
                ValidatorStatusResponse {
                    pubkey: *pubkey,
                    status: registry_status(validator, state.current_epoch()),
                    validator_index: Some(index as u64),
                    activation_epoch: (validator.activation_epoch != Epoch::max_value())
                        .then_some(validator.activation_epoch),
                }
            }
            None => ValidatorStatusResponse {
                pubkey: *pubkey,
                status: if self.deposits.deposit_by_pubkey(pubkey).is_some() {
                    ValidatorStatus::Deposited
                } else {
                    ValidatorStatus::Unknown
                },
                validator_index: None,
                activation_epoch: None,
            },
        }
    }

    /// `WaitForChainStart()`: resolves immediately once genesis has
    /// occurred, otherwise parks on the state notifier.
    pub async fn wait_for_chain_start(&self) -> Result<ChainStartResponse, RpcError> {
        if self.slot_clock.is_prior_to_genesis() == Some(false) {
            let genesis_validators_root = self
                .head
                .head_genesis_validators_root()
                .map_err(|e| RpcError::internal(format!("genesis validators root: {e}")))?;
            return Ok(ChainStartResponse {
                genesis_time: self.slot_clock.genesis_time(),
                genesis_validators_root,
            });
        }

        let mut events = self.state_notifier.subscribe();
        loop {
            match events.recv().await {
                Ok(StateEvent::ChainStarted {
                    genesis_time,
                    genesis_validators_root,
                }) => {
                    return Ok(ChainStartResponse {
                        genesis_time,
                        genesis_validators_root,
                    });
                }
                Ok(_) => continue,
                // Lagged subscribers re-check the clock rather than giving
                // up; a closed feed means the node is shutting down.
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                    return Err(RpcError::unavailable("node is shutting down"));
                }
            }
        }
    }

    /// `WaitForActivation(pubkeys)`: a stream that emits the statuses of
    /// the requested keys now and again after every epoch transition,
    /// ending once all keys are active.
    pub fn wait_for_activation(
        &self,
        pubkeys: Vec<PublicKeyBytes>,
    ) -> ReceiverStream<Vec<ValidatorStatusResponse>> {
        let (tx, rx) = mpsc::channel(4);
        let server = self.clone();
        tokio::spawn(async move {
            let mut events = server.state_notifier.subscribe();
            loop {
                let statuses: Vec<_> = match server.head.head_state_read_only() {
                    Ok(state) => pubkeys
                        .iter()
                        .map(|pubkey| server.status_from_state(&state, pubkey))
                        .collect(),
                    Err(e) => {
                        debug!(error = %e, "Activation stream could not read head state");
                        Vec::new()
                    }
                };
                let all_active = !statuses.is_empty()
                    && statuses.iter().all(|s| s.status == ValidatorStatus::Active);
                if tx.send(statuses).await.is_err() {
                    return;
                }
                if all_active {
                    return;
                }

                // Wait for the next epoch transition before re-checking.
                loop {
                    match events.recv().await {
                        Ok(StateEvent::HeadUpdated {
                            epoch_transition: true,
                            ..
                        }) => break,
                        Ok(_) => continue,
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => break,
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => return,
                    }
                }
            }
        });
        ReceiverStream::new(rx)
    }

    /// `CheckDoppelGanger(requests)`: reports keys that show attestation
    /// credit in epochs after the caller says they stopped signing.
    pub fn check_doppelganger(
        &self,
        requests: &[DoppelgangerRequest],
    ) -> Result<Vec<DoppelgangerResponse>, RpcError> {
        if self.sync_checker.is_syncing() {
            return Err(RpcError::unavailable("Syncing to latest head"));
        }
        let state = self
            .head
            .head_state_read_only()
            .map_err(|e| RpcError::internal(format!("head state: {e}")))?;
        let current_epoch = state.current_epoch();

        let responses = requests
            .iter()
            .map(|request| {
                // Too recent to tell apart from the caller's own signing.
                if request.last_signed_epoch + 2 >= current_epoch {
                    return DoppelgangerResponse {
                        pubkey: request.pubkey,
                        duplicate_exists: false,
                    };
                }
                let duplicate_exists = state
                    .get_validator_index(&request.pubkey)
                    .map(|index| {
                        let previous = state
                            .previous_epoch_participation
                            .get(index)
                            .copied()
                            .unwrap_or(0);
                        let current = state
                            .current_epoch_participation
                            .get(index)
                            .copied()
                            .unwrap_or(0);
                        previous != 0 || current != 0
                    })
                    .unwrap_or(false);
                DoppelgangerResponse {
                    pubkey: request.pubkey,
                    duplicate_exists,
                }
            })
            .collect();
        Ok(responses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::StatusCode;
    use crate::test_utils::TestRig;
    use tokio_stream::StreamExt;
    use types::MinimalEthSpec;
    use types::test_utils::interop_pubkey;

    type E = MinimalEthSpec;

    #[tokio::test]
    async fn status_for_active_and_unknown_keys() {
        let rig = TestRig::<E>::new(8).at_slot(5);
        let active = rig.server().validator_status(&interop_pubkey(2)).unwrap();
        assert_eq!(active.status, ValidatorStatus::Active);
        assert_eq!(active.validator_index, Some(2));

        let stranger = rig.server().validator_status(&interop_pubkey(99)).unwrap();
        assert_eq!(stranger.status, ValidatorStatus::Unknown);
        assert_eq!(stranger.validator_index, None);

        rig.add_deposit(interop_pubkey(99));
        let deposited = rig.server().validator_status(&interop_pubkey(99)).unwrap();
        assert_eq!(deposited.status, ValidatorStatus::Deposited);
    }

    #[tokio::test]
    async fn multiple_status_merges_keys_and_indices() {
        let rig = TestRig::<E>::new(8).at_slot(5);
        let responses = rig
            .server()
            .multiple_validator_status(&[interop_pubkey(1)], &[1, 3])
            .unwrap();
        // Index 1 duplicates the pubkey request and is not repeated.
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0].validator_index, Some(1));
        assert_eq!(responses[1].validator_index, Some(3));

        let err = rig
            .server()
            .multiple_validator_status(&[], &[1000])
            .unwrap_err();
        assert_eq!(err.code(), StatusCode::NotFound);
    }

    #[tokio::test]
    async fn chain_start_resolves_immediately_after_genesis() {
        let rig = TestRig::<E>::new(8).at_slot(5);
        let response = rig.server().wait_for_chain_start().await.unwrap();
        assert_eq!(response.genesis_time, 0);
        assert_eq!(
            response.genesis_validators_root,
            Hash256::repeat_byte(0x77)
        );
    }

    #[tokio::test]
    async fn activation_stream_ends_once_all_active() {
        let rig = TestRig::<E>::new(8).at_slot(5);
        let mut stream = rig
            .server()
            .wait_for_activation(vec![interop_pubkey(0), interop_pubkey(1)]);
        let statuses = stream.next().await.unwrap();
        assert!(statuses.iter().all(|s| s.status == ValidatorStatus::Active));
        // All keys active on the first emission: the stream completes.
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn doppelganger_flags_unexpected_participation() {
        let rig = TestRig::<E>::new(8).at_slot(40);
        {
            let mut state = rig.mock.head_state.write();
            state.current_epoch_participation[2] = 0b111;
        }

        let responses = rig
            .server()
            .check_doppelganger(&[
                DoppelgangerRequest {
                    pubkey: interop_pubkey(2),
                    last_signed_epoch: Epoch::new(0),
                },
                DoppelgangerRequest {
                    pubkey: interop_pubkey(3),
                    last_signed_epoch: Epoch::new(0),
                },
            ])
            .unwrap();
        assert!(responses[0].duplicate_exists);
        assert!(!responses[1].duplicate_exists);
    }

    #[tokio::test]
    async fn doppelganger_is_inconclusive_for_recent_epochs() {
        let rig = TestRig::<E>::new(8).at_slot(40);
        {
            let mut state = rig.mock.head_state.write();
            state.current_epoch_participation[2] = 0b111;
        }
        // Epoch 4 is within two epochs of the current epoch 5.
        let responses = rig
            .server()
            .check_doppelganger(&[DoppelgangerRequest {
                pubkey: interop_pubkey(2),
                last_signed_epoch: Epoch::new(4),
            }])
            .unwrap();
        assert!(!responses[0].duplicate_exists);
    }

    fn validator(activation: u64, exit: u64) -> Validator {
        Validator {
            activation_eligibility_epoch: Epoch::new(0),
            activation_epoch: Epoch::new(activation),
            exit_epoch: Epoch::new(exit),
            withdrawable_epoch: Epoch::new(exit + 256),
            ..Validator::default()
        }
    }

    #[test]
    fn registry_status_progression() {
        let v = validator(5, 100);
        assert_eq!(registry_status(&v, Epoch::new(0)), ValidatorStatus::Pending);
        assert_eq!(registry_status(&v, Epoch::new(5)), ValidatorStatus::Exiting);

        let mut active = validator(5, 100);
        active.exit_epoch = Epoch::max_value();
        active.withdrawable_epoch = Epoch::max_value();
        assert_eq!(
            registry_status(&active, Epoch::new(5)),
            ValidatorStatus::Active
        );

        assert_eq!(
            registry_status(&v, Epoch::new(100)),
            ValidatorStatus::Exited
        );
        assert_eq!(
            registry_status(&v, Epoch::new(356)),
            ValidatorStatus::Withdrawable
        );
    }

    #[test]
    fn unprocessed_deposit_is_deposited() {
        let v = Validator::default();
        assert_eq!(
            registry_status(&v, Epoch::new(0)),
            ValidatorStatus::Deposited
        );
    }

    #[test]
    fn slashed_overrides_exiting() {
        let mut v = validator(0, 10);
        v.slashed = true;
        assert_eq!(registry_status(&v, Epoch::new(5)), ValidatorStatus::Slashing);
    }
}
