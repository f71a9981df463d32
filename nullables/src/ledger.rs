//! Nullable ledger submitter: records every committed delta in memory.

use agora_governance::{CommitReceipt, LedgerError, LedgerSubmitter, StateDelta};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

pub struct NullLedger {
    deltas: Mutex<Vec<StateDelta>>,
    failing: AtomicBool,
}

impl NullLedger {
    pub fn new() -> Self {
        Self {
            deltas: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
        }
    }

    /// Make every following commit fail with [`LedgerError::Unavailable`].
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Every accepted delta, in commit order.
    pub fn deltas(&self) -> Vec<StateDelta> {
        self.deltas.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.deltas.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Names of the accepted deltas, in commit order.
    pub fn delta_names(&self) -> Vec<&'static str> {
        self.deltas.lock().unwrap().iter().map(|d| d.name()).collect()
    }
}

impl Default for NullLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl LedgerSubmitter for NullLedger {
    fn commit(&self, delta: &StateDelta) -> Result<CommitReceipt, LedgerError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(LedgerError::Unavailable("null ledger set to fail".to_string()));
        }
        let mut deltas = self.deltas.lock().unwrap();
        deltas.push(delta.clone());
        Ok(CommitReceipt {
            sequence: deltas.len() as u64,
        })
    }
}
