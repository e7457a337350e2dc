//! Registry of known modems.
//!
//! An append-only set of [`ModemId`]s guarded by a single mutex. Discovery
//! merges into it, the producer snapshots it every cycle. Identifiers are
//! never removed: once a modem has been seen it stays known for the life of
//! the process, even if later discovery passes stop reporting it.
//!
//! The guard is a `std::sync::Mutex`; critical sections are short and never
//! span an `.await`.

use std::sync::{Mutex, MutexGuard, PoisonError};

use smsq_core::ModemId;
use tracing::debug;

/// Thread-safe, insertion-ordered set of modem identifiers.
#[derive(Debug, Default)]
pub struct ModemRegistry {
    modems: Mutex<Vec<ModemId>>,
}

impl ModemRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> MutexGuard<'_, Vec<ModemId>> {
        // The protected Vec is always valid, so a poisoned lock is still usable.
        self.modems.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds `id` if it is not already known.
    ///
    /// Returns `true` if the modem was newly added.
    pub fn merge(&self, id: ModemId) -> bool {
        let mut modems = self.guard();
        if modems.contains(&id) {
            return false;
        }
        debug!(modem_id = %id, "New modem registered");
        modems.push(id);
        true
    }

    /// Merges every identifier, returning how many were new.
    pub fn merge_all(&self, ids: impl IntoIterator<Item = ModemId>) -> usize {
        ids.into_iter().filter(|id| self.merge(id.clone())).count()
    }

    /// Returns a copy of the known identifiers in first-seen order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<ModemId> {
        self.guard().clone()
    }

    pub fn contains(&self, id: &ModemId) -> bool {
        self.guard().contains(id)
    }

    pub fn len(&self) -> usize {
        self.guard().len()
    }

    pub fn is_empty(&self) -> bool {
        self.guard().is_empty()
    }
}
