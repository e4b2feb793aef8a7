//! The builder circuit breaker: refuse outsourced block construction when
//! chain liveness looks degraded, since a faulty relay then compounds the
//! damage.

use types::{ChainSpec, Slot};

/// True when builder use must be refused for a proposal at `slot`.
///
/// Two independent trip conditions:
/// - consecutive gap: no block has been received for
///   `max_builder_consecutive_missed_slots` slots or more;
/// - rolling window: the previous epoch missed at least
///   `max_builder_epoch_missed_slots` of its slots (only evaluated once a
///   full epoch has elapsed).
pub fn builder_circuit_breaker_active(
    slot: Slot,
    highest_received_slot: Slot,
    received_blocks_last_epoch: u64,
    slots_per_epoch: u64,
    spec: &ChainSpec,
) -> bool {
    let consecutive_missed = slot
        .as_u64()
        .saturating_sub(highest_received_slot.as_u64());
    if consecutive_missed >= spec.max_builder_consecutive_missed_slots {
        return true;
    }

    if slot.as_u64() >= slots_per_epoch {
        let missed_last_epoch =
            slots_per_epoch.saturating_sub(received_blocks_last_epoch.min(slots_per_epoch));
        if missed_last_epoch >= spec.max_builder_epoch_missed_slots {
            return true;
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    const SLOTS_PER_EPOCH: u64 = 32;

    fn spec() -> ChainSpec {
        ChainSpec::mainnet()
    }

    #[test]
    fn healthy_chain_does_not_trip() {
        assert!(!builder_circuit_breaker_active(
            Slot::new(100),
            Slot::new(99),
            SLOTS_PER_EPOCH,
            SLOTS_PER_EPOCH,
            &spec(),
        ));
    }

    #[test]
    fn consecutive_gap_trips() {
        let spec = spec();
        let slot = Slot::new(100);
        // Exactly at the limit trips.
        assert!(builder_circuit_breaker_active(
            slot,
            Slot::new(100 - spec.max_builder_consecutive_missed_slots),
            SLOTS_PER_EPOCH,
            SLOTS_PER_EPOCH,
            &spec,
        ));
        // One past the limit trips too.
        assert!(builder_circuit_breaker_active(
            slot,
            Slot::new(100 - spec.max_builder_consecutive_missed_slots - 1),
            SLOTS_PER_EPOCH,
            SLOTS_PER_EPOCH,
            &spec,
        ));
        // One under does not.
        assert!(!builder_circuit_breaker_active(
            slot,
            Slot::new(100 - spec.max_builder_consecutive_missed_slots + 1),
            SLOTS_PER_EPOCH,
            SLOTS_PER_EPOCH,
            &spec,
        ));
    }

    #[test]
    fn rolling_window_trips() {
        let spec = spec();
        let received = SLOTS_PER_EPOCH - spec.max_builder_epoch_missed_slots;
        assert!(builder_circuit_breaker_active(
            Slot::new(100),
            Slot::new(99),
            received,
            SLOTS_PER_EPOCH,
            &spec,
        ));
        assert!(!builder_circuit_breaker_active(
            Slot::new(100),
            Slot::new(99),
            received + 1,
            SLOTS_PER_EPOCH,
            &spec,
        ));
    }

    #[test]
    fn rolling_window_skipped_in_first_epoch() {
        let spec = spec();
        // Slot 10 predates a full epoch of history; only the gap rule runs.
        assert!(!builder_circuit_breaker_active(
            Slot::new(10),
            Slot::new(9),
            0,
            SLOTS_PER_EPOCH,
            &spec,
        ));
    }
}
