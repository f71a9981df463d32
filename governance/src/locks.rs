//! Per-proposal mutual exclusion.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use agora_types::ProposalId;

/// Hands out one mutex per proposal. Operations on different proposals never
/// contend; operations on the same proposal are serialised.
///
/// An entry lives only while some [`ProposalLock`] for it exists, so the
/// table holds at most one entry per proposal currently being worked on.
#[derive(Default)]
pub(crate) struct ProposalLocks {
    table: Mutex<HashMap<ProposalId, Arc<Mutex<()>>>>,
}

impl ProposalLocks {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Reference the mutex for `id`, creating it if nobody holds one.
    pub(crate) fn get(&self, id: &ProposalId) -> ProposalLock<'_> {
        let mut table = acquire(&self.table);
        let handle = table.entry(*id).or_default().clone();
        ProposalLock {
            locks: self,
            id: *id,
            handle,
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        acquire(&self.table).len()
    }
}

/// A counted reference to one proposal's mutex. Dropping the last reference
/// removes the table entry.
pub(crate) struct ProposalLock<'a> {
    locks: &'a ProposalLocks,
    id: ProposalId,
    handle: Arc<Mutex<()>>,
}

impl ProposalLock<'_> {
    pub(crate) fn mutex(&self) -> &Mutex<()> {
        &self.handle
    }
}

impl Drop for ProposalLock<'_> {
    fn drop(&mut self) {
        let mut table = acquire(&self.locks.table);
        // Release our reference while the table is locked so every count
        // change happens under the table mutex.
        drop(std::mem::take(&mut self.handle));
        if table
            .get(&self.id)
            .is_some_and(|entry| Arc::strong_count(entry) == 1)
        {
            table.remove(&self.id);
        }
    }
}

/// Lock ignoring poison. The guard mutexes protect no data of their own and
/// the table is only ever updated in single, complete steps, so a panic in
/// another holder leaves nothing inconsistent.
pub(crate) fn acquire<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
