//! A single-flight cache for produced `AttestationData`.
//!
//! All validators of a committee request identical data at the same
//! moment, so the first request for a `(slot, committee_index)` key
//! reserves the key and computes; everyone else waits on the reservation
//! and is woken by `put`. The stored value carries the producer's
//! committee index only; the requested index is stamped onto the value on
//! every read, which is sound because the data is committee-independent at
//! this layer.
//!
//! One mutex guards the key map; each in-progress key carries its own
//! `Notify` so wakeups never cross keys. Entries never mutate after
//! becoming ready.

use crate::metrics;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Notify;
use types::{AttestationData, Slot};

/// Entries for slots older than this many slots behind the current slot
/// are evicted on `prune`.
pub const EVICTION_HORIZON_SLOTS: u64 = 2;

/// The cache key: requests are equal iff both fields match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttestationRequestKey {
    pub slot: Slot,
    pub committee_index: u64,
}

impl AttestationRequestKey {
    pub fn new(slot: Slot, committee_index: u64) -> Self {
        Self {
            slot,
            committee_index,
        }
    }
}

/// Returned by `mark_in_progress` when another request holds the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlreadyInProgress;

enum CacheEntry {
    /// A producer is computing this key; waiters park on the notify.
    InProgress(Arc<Notify>),
    /// The computed value, immutable from now on.
    Ready(AttestationData),
}

#[derive(Default)]
pub struct AttestationDataCache {
    entries: Mutex<HashMap<AttestationRequestKey, CacheEntry>>,
}

impl AttestationDataCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Non-blocking lookup. A hit is stamped with the requested committee
    /// index.
    pub fn get(&self, key: &AttestationRequestKey) -> Option<AttestationData> {
        let entries = self.entries.lock();
        match entries.get(key) {
            Some(CacheEntry::Ready(data)) => Some(stamp(data, key.committee_index)),
            _ => None,
        }
    }

    /// Reserve `key` for this caller. Exactly one concurrent caller wins.
    pub fn mark_in_progress(&self, key: AttestationRequestKey) -> Result<(), AlreadyInProgress> {
        let mut entries = self.entries.lock();
        match entries.get(&key) {
            Some(_) => Err(AlreadyInProgress),
            None => {
                entries.insert(key, CacheEntry::InProgress(Arc::new(Notify::new())));
                Ok(())
            }
        }
    }

    /// Publish the result and wake all waiters on this key.
    pub fn put(&self, key: AttestationRequestKey, data: AttestationData) {
        let mut entries = self.entries.lock();
        if let Some(CacheEntry::InProgress(notify)) =
            entries.insert(key, CacheEntry::Ready(data))
        {
            notify.notify_waiters();
        }
    }

    /// Release a reservation without publishing, on producer failure.
    /// Waiters are woken and observe the missing entry.
    pub fn mark_not_in_progress(&self, key: &AttestationRequestKey) {
        let mut entries = self.entries.lock();
        if let Some(CacheEntry::InProgress(notify)) = entries.get(key) {
            notify.clone().notify_waiters();
            entries.remove(key);
        }
    }

    /// Wait until the key resolves. Returns the stamped value, or `None`
    /// when the producer released the key without publishing (or the entry
    /// was evicted), which callers surface as data loss.
    pub async fn wait(&self, key: &AttestationRequestKey) -> Option<AttestationData> {
        metrics::inc_counter(&metrics::ATTESTATION_DATA_CACHE_WAITS);
        loop {
            let notify;
            let mut notified;
            {
                let entries = self.entries.lock();
                match entries.get(key) {
                    Some(CacheEntry::Ready(data)) => {
                        return Some(stamp(data, key.committee_index));
                    }
                    Some(CacheEntry::InProgress(n)) => notify = n.clone(),
                    None => return None,
                }
                // Enroll in the waiter list while the map is still locked:
                // `notify_waiters` only wakes already-registered futures, so
                // a `put` racing with the lock release must see us enrolled.
                notified = Box::pin(notify.notified());
                notified.as_mut().enable();
            }
            notified.await;
        }
    }

    /// Evict entries whose slot fell behind the eviction horizon, waking
    /// any stragglers still parked on them.
    pub fn prune(&self, current_slot: Slot) {
        let mut entries = self.entries.lock();
        entries.retain(|key, entry| {
            let keep = key.slot + EVICTION_HORIZON_SLOTS >= current_slot;
            if !keep {
                if let CacheEntry::InProgress(notify) = entry {
                    notify.notify_waiters();
                }
            }
            keep
        });
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

fn stamp(data: &AttestationData, committee_index: u64) -> AttestationData {
    let mut stamped = *data;
    stamped.index = committee_index;
    stamped
}
