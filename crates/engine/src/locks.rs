//! In-process lock table keyed by chunk hash.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OwnedMutexGuard;

type Slot = Arc<tokio::sync::Mutex<()>>;

/// Serializes writers and replica deleters of the same chunk within one process.
///
/// Entries are removed once the last holder or waiter lets go, so the table
/// only ever holds hashes that are being worked on right now.
#[derive(Default)]
pub(crate) struct HashLocks {
    slots: Mutex<HashMap<String, Slot>>,
}

impl HashLocks {
    pub(crate) async fn lock(&self, key: &str) -> HashLockGuard<'_> {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            slots.entry(key.to_string()).or_default().clone()
        };
        let guard = slot.lock_owned().await;
        HashLockGuard {
            locks: self,
            key: key.to_string(),
            guard: Some(guard),
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

pub(crate) struct HashLockGuard<'a> {
    locks: &'a HashLocks,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for HashLockGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        let mut slots = self
            .locks
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // Only the table itself still references the slot: nobody is waiting.
        if slots
            .get(&self.key)
            .is_some_and(|slot| Arc::strong_count(slot) == 1)
        {
            slots.remove(&self.key);
        }
    }
}
