//! Produces `AttestationData` for validators, deduplicated through the
//! single-flight cache.

use crate::ValidatorServer;
use crate::attestation_data_cache::{AlreadyInProgress, AttestationDataCache, AttestationRequestKey};
use crate::errors::{Reason, RpcError};
use crate::metrics;
use slot_clock::SlotClock;
use tracing::warn;
use types::{AttestationData, Checkpoint, EthSpec, FixedBytesExtended, Hash256, Slot};

/// Releases the cache reservation unless the producer published a value.
struct InProgressGuard<'a> {
    cache: &'a AttestationDataCache,
    key: AttestationRequestKey,
    armed: bool,
}

impl<'a> InProgressGuard<'a> {
    fn new(cache: &'a AttestationDataCache, key: AttestationRequestKey) -> Self {
        Self {
            cache,
            key,
            armed: true,
        }
    }

    fn publish(mut self, data: AttestationData) {
        self.cache.put(self.key, data);
        self.armed = false;
    }
}

impl Drop for InProgressGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.cache.mark_not_in_progress(&self.key);
        }
    }
}

impl<E: EthSpec, S: SlotClock> ValidatorServer<E, S> {
    /// `GetAttestationData(slot, committee_index)`.
    ///
    /// Concurrent requests for the same `(slot, committee_index)` execute
    /// the underlying computation at most once; losers of the reservation
    /// race wait for the winner's result.
    pub async fn get_attestation_data(
        &self,
        slot: Slot,
        committee_index: u64,
    ) -> Result<AttestationData, RpcError> {
        self.admit()?;
        self.validate_request_slot(slot)?;

        let key = AttestationRequestKey::new(slot, committee_index);
        if let Some(hit) = self.attestation_data_cache.get(&key) {
            metrics::inc_counter(&metrics::ATTESTATION_DATA_CACHE_HITS);
            return Ok(hit);
        }

        if let Err(AlreadyInProgress) = self.attestation_data_cache.mark_in_progress(key) {
            return self.attestation_data_cache.wait(&key).await.ok_or_else(|| {
                RpcError::data_loss("attestation data was lost while awaiting its production")
                    .with_reason(Reason::CacheEntryLost)
            });
        }

        metrics::inc_counter(&metrics::ATTESTATION_DATA_CACHE_MISSES);
        let guard = InProgressGuard::new(&self.attestation_data_cache, key);
        let data = self.produce_attestation_data(slot, committee_index)?;
        guard.publish(data);

        Ok(data)
    }

    /// The requested slot must sit inside the current wall-clock slot,
    /// within the configured gossip clock disparity.
    fn validate_request_slot(&self, slot: Slot) -> Result<(), RpcError> {
        let now = self
            .slot_clock
            .now_duration()
            .ok_or_else(|| RpcError::unavailable("slot clock unreadable"))?;
        let slot_start = self.slot_clock.start_of(slot).ok_or_else(|| {
            RpcError::invalid_argument(format!("slot {slot} is outside the clock's range"))
        })?;
        let slot_end = slot_start + self.slot_clock.slot_duration();
        let disparity = self.spec.maximum_gossip_clock_disparity();

        let too_early = now + disparity < slot_start;
        let too_late = now > slot_end + disparity;
        if too_early || too_late {
            let current_slot = self.current_slot()?;
            return Err(RpcError::invalid_argument(format!(
                "invalid request: slot {slot} is not the current slot {current_slot}"
            )));
        }
        Ok(())
    }

    /// The cache-miss path: derive attestation data from the head.
    fn produce_attestation_data(
        &self,
        slot: Slot,
        committee_index: u64,
    ) -> Result<AttestationData, RpcError> {
        let mut head_root = self.head.head_root().map_err(|e| {
            RpcError::internal(format!("could not retrieve head root: {e}"))
                .with_reason(Reason::CannotRetrieveHeadRoot)
        })?;
        let mut state = self.head.head_state().map_err(|e| {
            RpcError::internal(format!("could not retrieve head state: {e}"))
                .with_reason(Reason::CannotRetrieveHeadState)
        })?;

        // The head may already sit past the requested slot when a late
        // request races a new block. Walk back to the chain as of `slot`.
        if state.slot > slot {
            warn!(
                head_slot = state.slot.as_u64(),
                request_slot = slot.as_u64(),
                "Attestation request behind head; rewinding"
            );
            head_root = state.get_block_root(slot).map_err(|e| {
                RpcError::internal(format!("could not find block root at slot {slot}: {e:?}"))
                    .with_reason(Reason::StateMismatchSlotTooHigh)
            })?;
            state = self
                .state_gen
                .state_by_root(head_root)
                .map_err(|e| {
                    RpcError::internal(format!("could not retrieve state: {e}"))
                        .with_reason(Reason::CannotRetrieveState)
                })?
                .ok_or_else(|| {
                    RpcError::internal(format!("state for block root {head_root} is missing"))
                        .with_reason(Reason::CannotRetrieveState)
                })?;
        }

        // An outdated head is advanced by empty-slot replay; the replayer's
        // next-slot cache amortizes repeated requests within an epoch.
        if state.current_epoch() < slot.epoch(E::slots_per_epoch()) {
            state = self.state_gen.replay_to_slot(state, slot).map_err(|e| {
                RpcError::internal(format!("could not process slots: {e}"))
                    .with_reason(Reason::CannotProcessSlots)
            })?;
        }

        let target_epoch = state.current_epoch();
        let target_start = target_epoch.start_slot(E::slots_per_epoch());
        let mut target_root = if target_start == state.slot {
            head_root
        } else {
            state.get_block_root(target_start).map_err(|e| {
                RpcError::internal(format!(
                    "could not find target root at slot {target_start}: {e:?}"
                ))
            })?
        };
        // Unfilled historical roots read as the zero hash in the first
        // epoch after genesis; the head stands in for them.
        if target_root == Hash256::zero() {
            target_root = head_root;
        }

        Ok(AttestationData {
            slot,
            index: committee_index,
            beacon_block_root: head_root,
            source: state.current_justified_checkpoint,
            target: Checkpoint {
                epoch: target_epoch,
                root: target_root,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::{Reason, StatusCode};
    use crate::test_utils::TestRig;
    use std::sync::Arc;
    use types::{Epoch, EthSpec, FixedBytesExtended, Hash256, MinimalEthSpec, Slot};

    type E = MinimalEthSpec;

    #[tokio::test]
    async fn genesis_epoch_attestation_uses_head_as_target() {
        let rig = TestRig::<E>::new(64).at_slot(5);
        let data = rig.server().get_attestation_data(Slot::new(5), 0).await.unwrap();

        assert_eq!(data.slot, Slot::new(5));
        assert_eq!(data.index, 0);
        assert_eq!(data.beacon_block_root, rig.head_root());
        assert_eq!(data.source, rig.justified_checkpoint());
        assert_eq!(data.target.epoch, Epoch::new(0));
        assert_eq!(data.target.root, rig.head_root());
    }

    #[tokio::test]
    async fn target_epoch_tracks_request_slot() {
        // Head at slot 10000 with empty historical roots: the target root
        // falls back to the head root and the epoch is the request's.
        let slot = Slot::new(10_000);
        let rig = TestRig::<E>::new(64)
            .at_slot(slot.as_u64())
            .with_justified_epoch(Epoch::new(1500 / E::slots_per_epoch()));
        let data = rig.server().get_attestation_data(slot, 0).await.unwrap();

        assert_eq!(
            data.target.epoch,
            Epoch::new(10_000 / E::slots_per_epoch())
        );
        assert_eq!(data.target.root, rig.head_root());
    }

    #[tokio::test]
    async fn head_rewind_walks_back_to_requested_slot() {
        let rig = TestRig::<E>::new(64).at_slot(12);
        let rewound_root = Hash256::repeat_byte(0x34);
        rig.set_block_root_at(Slot::new(11), rewound_root);
        rig.store_state_for_root(rewound_root, 11);
        rig.set_clock_slot(11);

        let data = rig.server().get_attestation_data(Slot::new(11), 2).await.unwrap();
        assert_eq!(data.beacon_block_root, rewound_root);
        assert_eq!(data.index, 2);
    }

    #[tokio::test]
    async fn head_rewind_with_missing_state_is_internal() {
        let rig = TestRig::<E>::new(64).at_slot(12);
        rig.set_block_root_at(Slot::new(11), Hash256::repeat_byte(0x34));
        rig.set_clock_slot(11);
        // No state stored for the rewound root.
        let err = rig
            .server()
            .get_attestation_data(Slot::new(11), 0)
            .await
            .unwrap_err();
        assert_eq!(err.code(), StatusCode::Internal);
    }

    #[tokio::test]
    async fn outdated_head_is_advanced_through_the_replayer() {
        // Head stuck at slot 6 (epoch 0), request in epoch 1.
        let rig = TestRig::<E>::new(64).at_slot(6);
        rig.set_clock_slot(9);

        let data = rig.server().get_attestation_data(Slot::new(9), 0).await.unwrap();
        assert_eq!(data.target.epoch, Epoch::new(1));
        assert_eq!(rig.replays(), 1);
    }

    #[tokio::test]
    async fn syncing_node_is_unavailable() {
        let rig = TestRig::<E>::new(64).at_slot(5);
        rig.set_syncing(true);
        let err = rig
            .server()
            .get_attestation_data(Slot::new(5), 0)
            .await
            .unwrap_err();
        assert_eq!(err.code(), StatusCode::Unavailable);
        assert_eq!(err.message(), "Syncing to latest head");
    }

    #[tokio::test]
    async fn stale_slot_is_rejected() {
        let rig = TestRig::<E>::new(64).at_slot(20);
        let err = rig
            .server()
            .get_attestation_data(Slot::new(5), 0)
            .await
            .unwrap_err();
        assert_eq!(err.code(), StatusCode::InvalidArgument);
    }

    #[tokio::test]
    async fn future_slot_is_rejected() {
        let rig = TestRig::<E>::new(64).at_slot(5);
        let err = rig
            .server()
            .get_attestation_data(Slot::new(7), 0)
            .await
            .unwrap_err();
        assert_eq!(err.code(), StatusCode::InvalidArgument);
    }

    #[tokio::test]
    async fn identical_requests_share_one_production() {
        let rig = Arc::new(TestRig::<E>::new(64).at_slot(5));

        let mut handles = Vec::new();
        for _ in 0..12 {
            let rig = rig.clone();
            handles.push(tokio::spawn(async move {
                rig.server().get_attestation_data(Slot::new(5), 1).await
            }));
        }
        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap().unwrap());
        }

        assert!(results.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(rig.head_state_fetches(), 1);
    }

    #[tokio::test]
    async fn committee_index_is_stamped_on_cache_hits() {
        let rig = TestRig::<E>::new(64).at_slot(5);
        let first = rig.server().get_attestation_data(Slot::new(5), 0).await.unwrap();
        // A different committee index is a different cache key, but the
        // data only differs in the stamped index.
        let second = rig.server().get_attestation_data(Slot::new(5), 3).await.unwrap();
        assert_eq!(first.index, 0);
        assert_eq!(second.index, 3);
        assert_eq!(first.beacon_block_root, second.beacon_block_root);
        assert_eq!(first.target, second.target);
    }

    #[tokio::test]
    async fn failed_production_releases_the_reservation() {
        let rig = TestRig::<E>::new(64).at_slot(5);
        rig.fail_next_head_state();

        let err = rig
            .server()
            .get_attestation_data(Slot::new(5), 0)
            .await
            .unwrap_err();
        assert_eq!(err.code(), StatusCode::Internal);
        assert_eq!(err.reason(), Some(Reason::CannotRetrieveHeadState));

        // The key was released: a retry succeeds.
        let data = rig.server().get_attestation_data(Slot::new(5), 0).await.unwrap();
        assert_eq!(data.slot, Slot::new(5));
    }

    #[tokio::test]
    async fn zero_target_root_substitutes_head_root() {
        let rig = TestRig::<E>::new(64).at_slot(9);
        // Historical root for slot 8 (epoch 1 start) left as zero.
        rig.set_block_root_at(Slot::new(8), Hash256::zero());
        let data = rig.server().get_attestation_data(Slot::new(9), 0).await.unwrap();
        assert_eq!(data.target.root, rig.head_root());
    }
}
