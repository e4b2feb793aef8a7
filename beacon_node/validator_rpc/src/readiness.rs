//! The gate every validator-facing request passes before any expensive
//! work: a node still syncing, or one whose execution payloads are
//! unverified, must not hand out signable material.

use crate::chain::{OptimisticModeFetcher, SyncChecker};
use crate::errors::RpcError;
use slot_clock::SlotClock;
use std::sync::Arc;
use types::{ChainSpec, EthSpec};

pub struct ReadinessGate<E: EthSpec, S: SlotClock> {
    sync_checker: Arc<dyn SyncChecker>,
    optimistic: Arc<dyn OptimisticModeFetcher>,
    slot_clock: S,
    spec: Arc<ChainSpec>,
    _phantom: std::marker::PhantomData<E>,
}

impl<E: EthSpec, S: SlotClock> ReadinessGate<E, S> {
    pub fn new(
        sync_checker: Arc<dyn SyncChecker>,
        optimistic: Arc<dyn OptimisticModeFetcher>,
        slot_clock: S,
        spec: Arc<ChainSpec>,
    ) -> Self {
        Self {
            sync_checker,
            optimistic,
            slot_clock,
            spec,
            _phantom: std::marker::PhantomData,
        }
    }

    /// Admit the request, or explain why the caller should retry later.
    ///
    /// Optimistic execution only matters once the Bellatrix fork is
    /// reached: before the merge there are no payloads to be optimistic
    /// about. Failures here are always `Unavailable`, never `Internal`.
    pub fn admit(&self) -> Result<(), RpcError> {
        if self.sync_checker.is_syncing() {
            return Err(RpcError::unavailable("Syncing to latest head"));
        }

        let current_slot = self.slot_clock.now_or_genesis().ok_or_else(|| {
            RpcError::unavailable("slot clock unreadable; node may be starting up")
        })?;

        if self.spec.is_merge_transition_complete_at::<E>(current_slot) {
            let optimistic = self
                .optimistic
                .is_optimistic()
                .map_err(|e| RpcError::unavailable(format!("optimistic status unknown: {e}")))?;
            if optimistic {
                return Err(RpcError::unavailable(
                    "head is optimistic; execution payloads not yet verified",
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::StatusCode;
    use parking_lot::Mutex;
    use slot_clock::ManualSlotClock;
    use std::time::Duration;
    use types::{Epoch, ForkName, MinimalEthSpec, Slot};

    type E = MinimalEthSpec;

    struct StaticSync(bool);
    impl SyncChecker for StaticSync {
        fn is_syncing(&self) -> bool {
            self.0
        }
    }

    struct StaticOptimistic(Mutex<bool>);
    impl OptimisticModeFetcher for StaticOptimistic {
        fn is_optimistic(&self) -> Result<bool, crate::chain::ChainError> {
            Ok(*self.0.lock())
        }
    }

    fn gate(
        syncing: bool,
        optimistic: bool,
        spec: ChainSpec,
        slot: u64,
    ) -> ReadinessGate<E, ManualSlotClock> {
        let clock = ManualSlotClock::new(
            Slot::new(0),
            Duration::from_secs(0),
            Duration::from_secs(spec.seconds_per_slot),
        );
        clock.set_slot(slot);
        ReadinessGate::new(
            Arc::new(StaticSync(syncing)),
            Arc::new(StaticOptimistic(Mutex::new(optimistic))),
            clock,
            Arc::new(spec),
        )
    }

    #[test]
    fn syncing_is_unavailable() {
        let spec = ForkName::Bellatrix.make_genesis_spec(ChainSpec::minimal());
        let err = gate(true, false, spec, 5).admit().unwrap_err();
        assert_eq!(err.code(), StatusCode::Unavailable);
        assert_eq!(err.message(), "Syncing to latest head");
    }

    #[test]
    fn optimistic_is_unavailable_post_bellatrix() {
        let spec = ForkName::Bellatrix.make_genesis_spec(ChainSpec::minimal());
        let err = gate(false, true, spec, 5).admit().unwrap_err();
        assert_eq!(err.code(), StatusCode::Unavailable);
    }

    #[test]
    fn optimistic_flag_ignored_before_bellatrix() {
        let mut spec = ForkName::Base.make_genesis_spec(ChainSpec::minimal());
        spec.bellatrix_fork_epoch = Some(Epoch::new(100));
        assert!(gate(false, true, spec, 5).admit().is_ok());
    }

    #[test]
    fn ready_node_admits() {
        let spec = ForkName::Deneb.make_genesis_spec(ChainSpec::minimal());
        assert!(gate(false, false, spec, 5).admit().is_ok());
    }
}
