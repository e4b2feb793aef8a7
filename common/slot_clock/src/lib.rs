//! Determines the present slot from wall-clock time (or a manually driven
//! test clock). This is the only source of "now" in the workspace: every
//! component that needs the current slot or the genesis time reads it from
//! a `SlotClock`.

mod manual_slot_clock;
mod system_time_slot_clock;

use std::time::Duration;
use types::Slot;

pub use crate::manual_slot_clock::ManualSlotClock;
pub use crate::system_time_slot_clock::SystemTimeSlotClock;

/// A clock that reports the current slot.
///
/// The clock is not required to be monotonic; callers tolerate `None` (clock
/// before genesis, or a system-time read failure).
pub trait SlotClock: Send + Sync + Sized + Clone {
    /// Creates a new slot clock where the first slot is `genesis_slot`,
    /// genesis occurred `genesis_duration` after the `UNIX_EPOCH` and each
    /// slot is `slot_duration` apart.
    fn new(genesis_slot: Slot, genesis_duration: Duration, slot_duration: Duration) -> Self;

    /// Returns the slot at this present time.
    fn now(&self) -> Option<Slot>;

    /// Returns the slot at this present time if genesis has happened,
    /// otherwise returns the genesis slot.
    fn now_or_genesis(&self) -> Option<Slot> {
        if self.is_prior_to_genesis()? {
            Some(self.genesis_slot())
        } else {
            self.now()
        }
    }

    /// Indicates if the current time is prior to genesis time.
    fn is_prior_to_genesis(&self) -> Option<bool>;

    /// Returns the present time as a duration since the `UNIX_EPOCH`.
    fn now_duration(&self) -> Option<Duration>;

    /// Returns the slot of the given duration since the `UNIX_EPOCH`.
    fn slot_of(&self, now: Duration) -> Option<Slot>;

    /// Returns the duration from `UNIX_EPOCH` to the start of `slot`.
    fn start_of(&self, slot: Slot) -> Option<Duration>;

    /// Returns the duration until the next slot.
    fn duration_to_next_slot(&self) -> Option<Duration>;

    /// Returns the duration until the start of `slot`, or `None` if it has
    /// already started.
    fn duration_to_slot(&self, slot: Slot) -> Option<Duration>;

    /// Returns the length of a slot.
    fn slot_duration(&self) -> Duration;

    /// Returns the first slot to be returned at the genesis time.
    fn genesis_slot(&self) -> Slot;

    /// Returns the duration from `UNIX_EPOCH` to the genesis time.
    fn genesis_duration(&self) -> Duration;

    /// The genesis time as unix seconds, as advertised to validators.
    fn genesis_time(&self) -> u64 {
        self.genesis_duration().as_secs()
    }
}
