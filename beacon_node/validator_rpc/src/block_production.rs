//! Assembles block proposals: operation packing from the pools, eth1
//! voting, the local-vs-builder payload race with its circuit breaker, and
//! the fork-tagged wrapping of the result.

use crate::ValidatorServer;
use crate::chain::PayloadResponse;
use crate::circuit_breaker::builder_circuit_breaker_active;
use crate::epbs::ProposalSlotState;
use crate::errors::{Reason, RpcError};
use crate::metrics;
use crate::validation::{check_attester_slashing, check_proposer_slashing, check_voluntary_exit};
use itertools::Itertools;
use slot_clock::SlotClock;
use tree_hash::TreeHash;
use ssz_types::VariableList;
use ssz_types::typenum::Unsigned;
use tracing::{debug, info, warn};
use types::{
    Attestation, AttesterSlashing, BeaconBlock, BeaconBlockBase, BeaconBlockBellatrix,
    BeaconBlockBodyBase, BeaconBlockBodyBellatrix, BeaconBlockBodyCapella, BeaconBlockBodyDeneb,
    BeaconBlockBodyElectra, BeaconBlockCapella, BeaconBlockDeneb, BeaconBlockElectra,
    BeaconState, BlindedBeaconBlock, BlindedBeaconBlockBellatrix, BlindedBeaconBlockBodyBellatrix,
    BlindedBeaconBlockBodyCapella, BlindedBeaconBlockBodyDeneb, BlindedBeaconBlockBodyElectra,
    BlindedBeaconBlockCapella, BlindedBeaconBlockDeneb, BlindedBeaconBlockElectra, BlobsBundle,
    Eth1Data, EthSpec, ExecutionPayload, ExecutionPayloadHeader, ExecutionRequests, ForkName,
    Graffiti, Hash256, KzgCommitments, ProposerSlashing, SignatureBytes, SignedBlsToExecutionChange,
    SignedBuilderBid, SignedVoluntaryExit, Slot, SyncAggregate, Uint256,
    BeaconBlockAltair, BeaconBlockBodyAltair,
};

/// A produced proposal, tagged by payload disclosure.
#[derive(Debug, Clone, PartialEq)]
pub enum ProducedBlock<E: EthSpec> {
    Full {
        block: BeaconBlock<E>,
        /// Present post-Deneb when the local payload carried blobs.
        blobs_bundle: Option<BlobsBundle<E>>,
    },
    Blinded(BlindedBeaconBlock<E>),
}

impl<E: EthSpec> ProducedBlock<E> {
    pub fn slot(&self) -> Slot {
        match self {
            ProducedBlock::Full { block, .. } => block.slot(),
            ProducedBlock::Blinded(block) => block.slot(),
        }
    }

    pub fn is_blinded(&self) -> bool {
        matches!(self, ProducedBlock::Blinded(_))
    }
}

/// The pool-sourced parts of a body, validated and capped.
struct Operations<E: EthSpec> {
    eth1_data: Eth1Data,
    attestations: Vec<Attestation<E>>,
    proposer_slashings: Vec<ProposerSlashing>,
    attester_slashings: Vec<AttesterSlashing<E>>,
    voluntary_exits: Vec<SignedVoluntaryExit>,
    bls_changes: Vec<SignedBlsToExecutionChange>,
    sync_aggregate: SyncAggregate<E>,
}

impl<E: EthSpec, S: SlotClock> ValidatorServer<E, S> {
    /// `GetBlock(slot, randao_reveal, graffiti)`.
    pub async fn get_block(
        &self,
        slot: Slot,
        randao_reveal: SignatureBytes,
        graffiti: Graffiti,
    ) -> Result<ProducedBlock<E>, RpcError> {
        self.admit()?;

        let parent_root = self.head.head_root().map_err(|e| {
            RpcError::internal(format!("could not retrieve head root: {e}"))
                .with_reason(Reason::CannotRetrieveHeadRoot)
        })?;
        let mut state = self.head.head_state().map_err(|e| {
            RpcError::internal(format!("could not retrieve head state: {e}"))
                .with_reason(Reason::CannotRetrieveHeadState)
        })?;
        if state.slot > slot {
            return Err(RpcError::invalid_argument(format!(
                "cannot propose at slot {slot}: head is already at slot {}",
                state.slot
            )));
        }
        if state.slot < slot {
            state = self.state_gen.replay_to_slot(state, slot).map_err(|e| {
                RpcError::internal(format!("could not process slots: {e}"))
                    .with_reason(Reason::CannotProcessSlots)
            })?;
        }
        let proposer_index = state
            .get_beacon_proposer_index(slot, &self.spec)
            .map_err(|e| RpcError::internal(format!("proposer shuffle: {e:?}")))?
            as u64;

        let fork_name = self.fork_name_at_slot(slot);
        let operations = self.collect_operations(&state, slot, parent_root, fork_name)?;

        let produced = if fork_name.bellatrix_enabled() {
            self.produce_post_merge_block(
                slot,
                parent_root,
                proposer_index,
                &state,
                randao_reveal,
                graffiti,
                fork_name,
                operations,
            )
            .await?
        } else {
            self.assemble_pre_merge_block(
                slot,
                parent_root,
                proposer_index,
                randao_reveal,
                graffiti,
                fork_name,
                operations,
            )?
        };

        let produced = self.fill_state_root(produced, &state)?;
        metrics::inc_counter(&metrics::BLOCKS_PRODUCED);
        info!(
            slot = slot.as_u64(),
            proposer_index,
            blinded = produced.is_blinded(),
            fork = %fork_name,
            "Produced block proposal"
        );
        Ok(produced)
    }

    /// Builder usability for this proposal: configured, registered, and
    /// the circuit breaker quiet.
    fn can_use_builder(&self, slot: Slot, proposer_index: u64) -> bool {
        let Some(builder) = &self.builder else {
            return false;
        };
        if builder.registration_by_validator_id(proposer_index).is_none() {
            debug!(proposer_index, "Proposer not registered with builder");
            return false;
        }

        let highest_received = self.forkchoice.highest_received_block_slot();
        let received_last_epoch = self
            .forkchoice
            .received_blocks_last_epoch()
            .unwrap_or_default();
        if builder_circuit_breaker_active(
            slot,
            highest_received,
            received_last_epoch,
            E::slots_per_epoch(),
            &self.spec,
        ) {
            metrics::inc_counter(&metrics::CIRCUIT_BREAKER_TRIPS);
            warn!(
                slot = slot.as_u64(),
                highest_received_slot = highest_received.as_u64(),
                received_last_epoch,
                "Builder circuit breaker active; using local payload"
            );
            return false;
        }
        true
    }

    #[allow(clippy::too_many_arguments)]
    async fn produce_post_merge_block(
        &self,
        slot: Slot,
        parent_root: Hash256,
        proposer_index: u64,
        state: &BeaconState<E>,
        randao_reveal: SignatureBytes,
        graffiti: Graffiti,
        fork_name: ForkName,
        operations: Operations<E>,
    ) -> Result<ProducedBlock<E>, RpcError> {
        let parent_hash = state.latest_execution_block_hash;
        let randao_root = randao_reveal.tree_hash_root();
        let local_payload_fut =
            self.execution_engine
                .get_payload(parent_hash, slot, proposer_index, randao_root);

        if !self.can_use_builder(slot, proposer_index) {
            let local_result = local_payload_fut.await;
            return self.finish_local(
                slot,
                parent_root,
                proposer_index,
                randao_reveal,
                graffiti,
                fork_name,
                operations,
                local_result,
            );
        }

        let builder = self.builder.as_ref().expect("can_use_builder checked");
        let pubkey = state
            .validators
            .get(proposer_index as usize)
            .map(|v| v.pubkey)
            .ok_or_else(|| RpcError::internal("proposer missing from state"))?;
        // Race the relay against the local build; both must resolve before
        // the value comparison.
        let (builder_result, local_result) =
            futures::join!(builder.get_header(slot, parent_hash, pubkey), local_payload_fut);

        let bid = match builder_result {
            Ok(bid) => bid,
            Err(e) => {
                metrics::inc_counter(&metrics::BUILDER_FALLBACKS);
                warn!(
                    slot = slot.as_u64(),
                    error = %e,
                    "Builder header unavailable; falling back to local payload"
                );
                return self.finish_local(
                    slot,
                    parent_root,
                    proposer_index,
                    randao_reveal,
                    graffiti,
                    fork_name,
                    operations,
                    local_result,
                );
            }
        };

        let local_value = local_result
            .as_ref()
            .map(|response| response.bid_wei)
            .unwrap_or(Uint256::ZERO);
        // Ties prefer local construction to minimize relay trust.
        if bid.message.value > local_value {
            self.assemble_blinded_block(
                slot,
                parent_root,
                proposer_index,
                randao_reveal,
                graffiti,
                fork_name,
                operations,
                bid,
            )
        } else {
            debug!(
                slot = slot.as_u64(),
                builder_wei = %bid.message.value,
                local_wei = %local_value,
                "Local payload matched or outbid the builder"
            );
            self.finish_local(
                slot,
                parent_root,
                proposer_index,
                randao_reveal,
                graffiti,
                fork_name,
                operations,
                local_result,
            )
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn finish_local(
        &self,
        slot: Slot,
        parent_root: Hash256,
        proposer_index: u64,
        randao_reveal: SignatureBytes,
        graffiti: Graffiti,
        fork_name: ForkName,
        operations: Operations<E>,
        local_result: Result<PayloadResponse<E>, crate::chain::EngineError>,
    ) -> Result<ProducedBlock<E>, RpcError> {
        let response = local_result.map_err(|e| {
            RpcError::unavailable(format!("execution engine could not build payload: {e}"))
                .with_reason(Reason::EngineUnavailable)
        })?;

        // Stash the bundle for sidecar synthesis at proposal time; one
        // swap per slot.
        *self.proposal_state.lock() = ProposalSlotState {
            slot: Some(slot),
            blobs_bundle: response.blobs_bundle.clone(),
            ..ProposalSlotState::default()
        };

        self.assemble_full_block(
            slot,
            parent_root,
            proposer_index,
            randao_reveal,
            graffiti,
            fork_name,
            operations,
            response,
        )
    }

    fn fill_state_root(
        &self,
        produced: ProducedBlock<E>,
        state: &BeaconState<E>,
    ) -> Result<ProducedBlock<E>, RpcError> {
        let state_root = |block: &BeaconBlock<E>| {
            self.state_gen
                .compute_state_root(block, state)
                .map_err(|e| RpcError::internal(format!("could not compute state root: {e}")))
        };
        Ok(match produced {
            ProducedBlock::Full { mut block, blobs_bundle } => {
                let root = state_root(&block)?;
                set_full_state_root(&mut block, root);
                ProducedBlock::Full { block, blobs_bundle }
            }
            ProducedBlock::Blinded(mut block) => {
                let root = self
                    .state_gen
                    .compute_blinded_state_root(&block, state)
                    .map_err(|e| {
                        RpcError::internal(format!("could not compute state root: {e}"))
                    })?;
                set_blinded_state_root(&mut block, root);
                ProducedBlock::Blinded(block)
            }
        })
    }

    /// Drain and re-validate the pools for inclusion at `slot`.
    fn collect_operations(
        &self,
        state: &BeaconState<E>,
        slot: Slot,
        parent_root: Hash256,
        fork_name: ForkName,
    ) -> Result<Operations<E>, RpcError> {
        let eth1_data = eth1_data_majority_vote(state);

        let want_electra = fork_name.electra_enabled();
        let max_attestations = if want_electra {
            E::MaxAttestationsElectra::to_usize()
        } else {
            E::MaxAttestations::to_usize()
        };
        let attestations = self
            .pools
            .attestations
            .pending(slot)
            .into_iter()
            .filter(|attestation| {
                matches!(attestation, Attestation::Electra(_)) == want_electra
            })
            .sorted_by_key(|attestation| {
                std::cmp::Reverse(attestation.num_set_aggregation_bits())
            })
            .take(max_attestations)
            .collect();

        let max_attester_slashings = if want_electra {
            E::MaxAttesterSlashingsElectra::to_usize()
        } else {
            E::MaxAttesterSlashings::to_usize()
        };
        let proposer_slashings = self
            .pools
            .slashings
            .pending_proposer_slashings()
            .into_iter()
            .filter(|slashing| check_proposer_slashing(state, slashing).is_ok())
            .take(E::MaxProposerSlashings::to_usize())
            .collect();
        let attester_slashings = self
            .pools
            .slashings
            .pending_attester_slashings()
            .into_iter()
            .filter(|slashing| check_attester_slashing(state, slashing).is_ok())
            .take(max_attester_slashings)
            .collect();
        let voluntary_exits = self
            .pools
            .voluntary_exits
            .pending()
            .into_iter()
            .filter(|exit| check_voluntary_exit(state, exit, &self.spec).is_ok())
            .take(E::MaxVoluntaryExits::to_usize())
            .collect();
        let bls_changes = if fork_name.capella_enabled() {
            self.pools
                .bls_changes
                .pending()
                .into_iter()
                .take(E::MaxBlsToExecutionChanges::to_usize())
                .collect()
        } else {
            Vec::new()
        };

        let sync_aggregate = if fork_name.altair_enabled() {
            let contributions = self
                .pools
                .sync_committee
                .contributions(slot.saturating_sub(1u64), parent_root);
            SyncAggregate::from_contributions(&contributions)
                .map_err(|e| RpcError::internal(format!("sync aggregate assembly: {e:?}")))?
        } else {
            SyncAggregate::new()
        };

        Ok(Operations {
            eth1_data,
            attestations,
            proposer_slashings,
            attester_slashings,
            voluntary_exits,
            bls_changes,
            sync_aggregate,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn assemble_pre_merge_block(
        &self,
        slot: Slot,
        parent_root: Hash256,
        proposer_index: u64,
        randao_reveal: SignatureBytes,
        graffiti: Graffiti,
        fork_name: ForkName,
        operations: Operations<E>,
    ) -> Result<ProducedBlock<E>, RpcError> {
        let Operations {
            eth1_data,
            attestations,
            proposer_slashings,
            attester_slashings,
            voluntary_exits,
            sync_aggregate,
            ..
        } = operations;

        let block = match fork_name {
            ForkName::Base => BeaconBlock::Base(BeaconBlockBase {
                slot,
                proposer_index,
                parent_root,
                state_root: Hash256::ZERO,
                body: BeaconBlockBodyBase {
                    randao_reveal,
                    eth1_data,
                    graffiti,
                    proposer_slashings: bounded(proposer_slashings),
                    attester_slashings: bounded(attester_slashings),
                    attestations: bounded(attestations),
                    deposits: VariableList::empty(),
                    voluntary_exits: bounded(voluntary_exits),
                },
            }),
            ForkName::Altair => BeaconBlock::Altair(BeaconBlockAltair {
                slot,
                proposer_index,
                parent_root,
                state_root: Hash256::ZERO,
                body: BeaconBlockBodyAltair {
                    randao_reveal,
                    eth1_data,
                    graffiti,
                    proposer_slashings: bounded(proposer_slashings),
                    attester_slashings: bounded(attester_slashings),
                    attestations: bounded(attestations),
                    deposits: VariableList::empty(),
                    voluntary_exits: bounded(voluntary_exits),
                    sync_aggregate,
                },
            }),
            _ => {
                return Err(RpcError::internal(
                    "post-merge fork reached the pre-merge assembler",
                ));
            }
        };
        Ok(ProducedBlock::Full {
            block,
            blobs_bundle: None,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn assemble_full_block(
        &self,
        slot: Slot,
        parent_root: Hash256,
        proposer_index: u64,
        randao_reveal: SignatureBytes,
        graffiti: Graffiti,
        fork_name: ForkName,
        operations: Operations<E>,
        response: PayloadResponse<E>,
    ) -> Result<ProducedBlock<E>, RpcError> {
        let Operations {
            eth1_data,
            attestations,
            proposer_slashings,
            attester_slashings,
            voluntary_exits,
            bls_changes,
            sync_aggregate,
        } = operations;
        let commitments: KzgCommitments<E> = response
            .blobs_bundle
            .as_ref()
            .map(|bundle| bundle.commitments.clone())
            .unwrap_or_default();

        let block = match (fork_name, response.payload) {
            (ForkName::Bellatrix, ExecutionPayload::Bellatrix(execution_payload)) => {
                BeaconBlock::Bellatrix(BeaconBlockBellatrix {
                    slot,
                    proposer_index,
                    parent_root,
                    state_root: Hash256::ZERO,
                    body: BeaconBlockBodyBellatrix {
                        randao_reveal,
                        eth1_data,
                        graffiti,
                        proposer_slashings: bounded(proposer_slashings),
                        attester_slashings: bounded(attester_slashings),
                        attestations: bounded(attestations),
                        deposits: VariableList::empty(),
                        voluntary_exits: bounded(voluntary_exits),
                        sync_aggregate,
                        execution_payload,
                    },
                })
            }
            (ForkName::Capella, ExecutionPayload::Capella(execution_payload)) => {
                BeaconBlock::Capella(BeaconBlockCapella {
                    slot,
                    proposer_index,
                    parent_root,
                    state_root: Hash256::ZERO,
                    body: BeaconBlockBodyCapella {
                        randao_reveal,
                        eth1_data,
                        graffiti,
                        proposer_slashings: bounded(proposer_slashings),
                        attester_slashings: bounded(attester_slashings),
                        attestations: bounded(attestations),
                        deposits: VariableList::empty(),
                        voluntary_exits: bounded(voluntary_exits),
                        sync_aggregate,
                        execution_payload,
                        bls_to_execution_changes: bounded(bls_changes),
                    },
                })
            }
            (ForkName::Deneb, ExecutionPayload::Deneb(execution_payload)) => {
                BeaconBlock::Deneb(BeaconBlockDeneb {
                    slot,
                    proposer_index,
                    parent_root,
                    state_root: Hash256::ZERO,
                    body: BeaconBlockBodyDeneb {
                        randao_reveal,
                        eth1_data,
                        graffiti,
                        proposer_slashings: bounded(proposer_slashings),
                        attester_slashings: bounded(attester_slashings),
                        attestations: bounded(attestations),
                        deposits: VariableList::empty(),
                        voluntary_exits: bounded(voluntary_exits),
                        sync_aggregate,
                        execution_payload,
                        bls_to_execution_changes: bounded(bls_changes),
                        blob_kzg_commitments: commitments,
                    },
                })
            }
            (ForkName::Electra, ExecutionPayload::Deneb(execution_payload)) => {
                BeaconBlock::Electra(BeaconBlockElectra {
                    slot,
                    proposer_index,
                    parent_root,
                    state_root: Hash256::ZERO,
                    body: BeaconBlockBodyElectra {
                        randao_reveal,
                        eth1_data,
                        graffiti,
                        proposer_slashings: bounded(proposer_slashings),
                        attester_slashings: bounded(attester_slashings),
                        attestations: bounded(attestations),
                        deposits: VariableList::empty(),
                        voluntary_exits: bounded(voluntary_exits),
                        sync_aggregate,
                        execution_payload,
                        bls_to_execution_changes: bounded(bls_changes),
                        blob_kzg_commitments: commitments,
                        execution_requests: response.execution_requests.unwrap_or_default(),
                    },
                })
            }
            (fork, payload) => {
                return Err(RpcError::internal(format!(
                    "engine returned a {} payload for a {fork} block",
                    payload.fork_name()
                )));
            }
        };

        Ok(ProducedBlock::Full {
            block,
            blobs_bundle: self.proposal_state.lock().blobs_bundle.clone(),
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn assemble_blinded_block(
        &self,
        slot: Slot,
        parent_root: Hash256,
        proposer_index: u64,
        randao_reveal: SignatureBytes,
        graffiti: Graffiti,
        fork_name: ForkName,
        operations: Operations<E>,
        bid: SignedBuilderBid<E>,
    ) -> Result<ProducedBlock<E>, RpcError> {
        let Operations {
            eth1_data,
            attestations,
            proposer_slashings,
            attester_slashings,
            voluntary_exits,
            bls_changes,
            sync_aggregate,
        } = operations;
        let commitments = bid.message.blob_kzg_commitments.clone();

        let block = match (fork_name, bid.message.header) {
            (ForkName::Bellatrix, ExecutionPayloadHeader::Bellatrix(header)) => {
                BlindedBeaconBlock::Bellatrix(BlindedBeaconBlockBellatrix {
                    slot,
                    proposer_index,
                    parent_root,
                    state_root: Hash256::ZERO,
                    body: BlindedBeaconBlockBodyBellatrix {
                        randao_reveal,
                        eth1_data,
                        graffiti,
                        proposer_slashings: bounded(proposer_slashings),
                        attester_slashings: bounded(attester_slashings),
                        attestations: bounded(attestations),
                        deposits: VariableList::empty(),
                        voluntary_exits: bounded(voluntary_exits),
                        sync_aggregate,
                        execution_payload_header: header,
                    },
                })
            }
            (ForkName::Capella, ExecutionPayloadHeader::Capella(header)) => {
                BlindedBeaconBlock::Capella(BlindedBeaconBlockCapella {
                    slot,
                    proposer_index,
                    parent_root,
                    state_root: Hash256::ZERO,
                    body: BlindedBeaconBlockBodyCapella {
                        randao_reveal,
                        eth1_data,
                        graffiti,
                        proposer_slashings: bounded(proposer_slashings),
                        attester_slashings: bounded(attester_slashings),
                        attestations: bounded(attestations),
                        deposits: VariableList::empty(),
                        voluntary_exits: bounded(voluntary_exits),
                        sync_aggregate,
                        execution_payload_header: header,
                        bls_to_execution_changes: bounded(bls_changes),
                    },
                })
            }
            (ForkName::Deneb, ExecutionPayloadHeader::Deneb(header)) => {
                BlindedBeaconBlock::Deneb(BlindedBeaconBlockDeneb {
                    slot,
                    proposer_index,
                    parent_root,
                    state_root: Hash256::ZERO,
                    body: BlindedBeaconBlockBodyDeneb {
                        randao_reveal,
                        eth1_data,
                        graffiti,
                        proposer_slashings: bounded(proposer_slashings),
                        attester_slashings: bounded(attester_slashings),
                        attestations: bounded(attestations),
                        deposits: VariableList::empty(),
                        voluntary_exits: bounded(voluntary_exits),
                        sync_aggregate,
                        execution_payload_header: header,
                        bls_to_execution_changes: bounded(bls_changes),
                        blob_kzg_commitments: commitments,
                    },
                })
            }
            (ForkName::Electra, ExecutionPayloadHeader::Deneb(header)) => {
                BlindedBeaconBlock::Electra(BlindedBeaconBlockElectra {
                    slot,
                    proposer_index,
                    parent_root,
                    state_root: Hash256::ZERO,
                    body: BlindedBeaconBlockBodyElectra {
                        randao_reveal,
                        eth1_data,
                        graffiti,
                        proposer_slashings: bounded(proposer_slashings),
                        attester_slashings: bounded(attester_slashings),
                        attestations: bounded(attestations),
                        deposits: VariableList::empty(),
                        voluntary_exits: bounded(voluntary_exits),
                        sync_aggregate,
                        execution_payload_header: header,
                        bls_to_execution_changes: bounded(bls_changes),
                        blob_kzg_commitments: commitments,
                        execution_requests: ExecutionRequests::default(),
                    },
                })
            }
            (fork, header) => {
                return Err(RpcError::internal(format!(
                    "builder returned a {} header for a {fork} block",
                    header.fork_name()
                )));
            }
        };

        Ok(ProducedBlock::Blinded(block))
    }
}

/// The eth1 data to include: the most-voted entry of the current voting
/// period, or the state's standing value when there are no votes.
fn eth1_data_majority_vote<E: EthSpec>(state: &BeaconState<E>) -> Eth1Data {
    state
        .eth1_data_votes
        .iter()
        .counts()
        .into_iter()
        .max_by_key(|(_, count)| *count)
        .map(|(vote, _)| *vote)
        .unwrap_or(state.eth1_data)
}

fn bounded<T, N: Unsigned>(mut items: Vec<T>) -> VariableList<T, N> {
    items.truncate(N::to_usize());
    VariableList::new(items).unwrap_or_else(|_| VariableList::empty())
}

fn set_full_state_root<E: EthSpec>(block: &mut BeaconBlock<E>, root: Hash256) {
    match block {
        BeaconBlock::Base(b) => b.state_root = root,
        BeaconBlock::Altair(b) => b.state_root = root,
        BeaconBlock::Bellatrix(b) => b.state_root = root,
        BeaconBlock::Capella(b) => b.state_root = root,
        BeaconBlock::Deneb(b) => b.state_root = root,
        BeaconBlock::Electra(b) => b.state_root = root,
    }
}

fn set_blinded_state_root<E: EthSpec>(block: &mut BlindedBeaconBlock<E>, root: Hash256) {
    match block {
        BlindedBeaconBlock::Bellatrix(b) => b.state_root = root,
        BlindedBeaconBlock::Capella(b) => b.state_root = root,
        BlindedBeaconBlock::Deneb(b) => b.state_root = root,
        BlindedBeaconBlock::Electra(b) => b.state_root = root,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::StatusCode;
    use crate::test_utils::TestRig;
    use ssz_types::BitList;
    use types::{AttestationBase, AttestationData, ChainSpec, Checkpoint, Epoch, MinimalEthSpec};

    type E = MinimalEthSpec;

    fn attestation_with_bits(slot: u64, bits: usize) -> Attestation<E> {
        let mut aggregation_bits = BitList::with_capacity(8).unwrap();
        for i in 0..bits {
            aggregation_bits.set(i, true).unwrap();
        }
        Attestation::Base(AttestationBase {
            aggregation_bits,
            data: AttestationData {
                slot: Slot::new(slot),
                index: 0,
                beacon_block_root: Hash256::repeat_byte(bits as u8),
                source: Checkpoint::default(),
                target: Checkpoint {
                    epoch: Epoch::new(0),
                    root: Hash256::repeat_byte(0xbb),
                },
            },
            signature: SignatureBytes::empty(),
        })
    }

    #[tokio::test]
    async fn pre_merge_block_carries_packed_operations() {
        let rig = TestRig::<E>::new(64).at_slot(5);
        for bits in [1usize, 3, 2] {
            rig.server()
                .pools
                .attestations
                .save(attestation_with_bits(4, bits))
                .unwrap();
        }

        let produced = rig
            .server()
            .get_block(Slot::new(5), SignatureBytes::empty(), Graffiti::ZERO)
            .await
            .unwrap();
        let ProducedBlock::Full { block, .. } = produced else {
            panic!("pre-merge proposals are always full");
        };
        assert_eq!(block.slot(), Slot::new(5));
        assert_eq!(block.fork_name(), ForkName::Altair);

        // Greedy packing: strongest aggregation first.
        let attestations = block.body().attestations().to_vec();
        assert_eq!(attestations.len(), 3);
        assert_eq!(attestations[0].num_set_aggregation_bits(), 3);
        assert_eq!(attestations[1].num_set_aggregation_bits(), 2);
        assert_eq!(attestations[2].num_set_aggregation_bits(), 1);
    }

    #[tokio::test]
    async fn proposing_into_the_past_is_rejected() {
        let rig = TestRig::<E>::new(64).at_slot(9);
        let err = rig
            .server()
            .get_block(Slot::new(5), SignatureBytes::empty(), Graffiti::ZERO)
            .await
            .unwrap_err();
        assert_eq!(err.code(), StatusCode::InvalidArgument);
    }

    #[tokio::test]
    async fn syncing_node_refuses_to_build() {
        let rig = TestRig::<E>::new(64).at_slot(5);
        rig.set_syncing(true);
        let err = rig
            .server()
            .get_block(Slot::new(5), SignatureBytes::empty(), Graffiti::ZERO)
            .await
            .unwrap_err();
        assert_eq!(err.code(), StatusCode::Unavailable);
    }

    #[tokio::test]
    async fn builder_outbidding_local_yields_blinded_block() {
        let rig = TestRig::<E>::new(64)
            .at_fork(ForkName::Bellatrix)
            .at_slot(5)
            .with_builder(Uint256::from(1_000_000u64));
        let produced = rig
            .server()
            .get_block(Slot::new(5), SignatureBytes::empty(), Graffiti::ZERO)
            .await
            .unwrap();
        assert!(produced.is_blinded());
    }

    #[tokio::test]
    async fn equal_bid_prefers_local_payload() {
        // The local engine bids 100 by default; an equal builder bid loses.
        let rig = TestRig::<E>::new(64)
            .at_fork(ForkName::Bellatrix)
            .at_slot(5)
            .with_builder(Uint256::from(100u64));
        let produced = rig
            .server()
            .get_block(Slot::new(5), SignatureBytes::empty(), Graffiti::ZERO)
            .await
            .unwrap();
        assert!(!produced.is_blinded());
    }

    #[tokio::test]
    async fn circuit_breaker_gap_forces_local_payload() {
        let rig = TestRig::<E>::new(64)
            .at_fork(ForkName::Bellatrix)
            .at_slot(10)
            .with_builder(Uint256::from(1_000_000u64));
        // highest received = slot - limit - 1: the consecutive-gap rule
        // trips and the builder is refused.
        let limit = rig.spec().max_builder_consecutive_missed_slots;
        rig.set_highest_received(Slot::new(10 - limit - 1), Hash256::ZERO);

        let produced = rig
            .server()
            .get_block(Slot::new(10), SignatureBytes::empty(), Graffiti::ZERO)
            .await
            .unwrap();
        assert!(!produced.is_blinded());
    }

    #[tokio::test]
    async fn deneb_block_commits_to_engine_blobs() {
        let rig = TestRig::<E>::new(64)
            .at_fork(ForkName::Deneb)
            .at_slot(5)
            .with_blobs(3);
        let produced = rig
            .server()
            .get_block(Slot::new(5), SignatureBytes::empty(), Graffiti::ZERO)
            .await
            .unwrap();
        let ProducedBlock::Full { block, blobs_bundle } = produced else {
            panic!("no builder configured; expected a full block");
        };
        let commitments = block.blob_kzg_commitments().unwrap();
        assert_eq!(commitments.len(), 3);
        let bundle = blobs_bundle.expect("bundle returned with the block");
        assert_eq!(&bundle.commitments, commitments);
    }

    #[test]
    fn eth1_vote_picks_majority() {
        let spec = ChainSpec::minimal();
        let mut state = types::test_utils::interop_state::<E>(8, &spec);
        let winner = Eth1Data {
            deposit_root: Hash256::repeat_byte(1),
            deposit_count: 10,
            block_hash: Hash256::repeat_byte(2),
        };
        let loser = Eth1Data {
            deposit_root: Hash256::repeat_byte(3),
            deposit_count: 9,
            block_hash: Hash256::repeat_byte(4),
        };
        state.eth1_data_votes.push(loser).unwrap();
        state.eth1_data_votes.push(winner).unwrap();
        state.eth1_data_votes.push(winner).unwrap();
        assert_eq!(eth1_data_majority_vote(&state), winner);
    }

    #[test]
    fn eth1_vote_falls_back_to_state_value() {
        let spec = ChainSpec::minimal();
        let mut state = types::test_utils::interop_state::<E>(8, &spec);
        state.eth1_data = Eth1Data {
            deposit_root: Hash256::repeat_byte(9),
            deposit_count: 1,
            block_hash: Hash256::repeat_byte(8),
        };
        assert_eq!(eth1_data_majority_vote(&state), state.eth1_data);
    }
}
