//! Nullable balance oracle: scripted token holdings.

use agora_governance::{BalanceOracle, OracleError};
use agora_types::{PrincipalId, Timestamp, TokenAmount};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// A balance oracle whose answers are set by the test.
///
/// Each principal has a balance timeline: `balance_of(p, at)` returns the
/// latest entry at or before `at`, zero if there is none. Total supply is
/// the explicit value if one was set, otherwise the sum of balances at `at`.
pub struct NullBalanceOracle {
    balances: Mutex<HashMap<PrincipalId, BTreeMap<Timestamp, TokenAmount>>>,
    supply: Mutex<Option<TokenAmount>>,
    failing: AtomicBool,
    calls: AtomicUsize,
}

impl NullBalanceOracle {
    pub fn new() -> Self {
        Self {
            balances: Mutex::new(HashMap::new()),
            supply: Mutex::new(None),
            failing: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    /// Give `principal` a fixed balance for all time.
    pub fn set_balance(&self, principal: &PrincipalId, amount: u128) {
        let mut timeline = BTreeMap::new();
        timeline.insert(Timestamp::EPOCH, TokenAmount::new(amount));
        self.balances.lock().unwrap().insert(principal.clone(), timeline);
    }

    /// Change `principal`'s balance from `from` onwards.
    pub fn set_balance_from(&self, principal: &PrincipalId, from: Timestamp, amount: u128) {
        self.balances
            .lock()
            .unwrap()
            .entry(principal.clone())
            .or_default()
            .insert(from, TokenAmount::new(amount));
    }

    pub fn set_total_supply(&self, amount: u128) {
        *self.supply.lock().unwrap() = Some(TokenAmount::new(amount));
    }

    /// Make every following call fail with [`OracleError::Unavailable`].
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of calls answered or refused so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(OracleError::Unavailable("null oracle set to fail".to_string()));
        }
        Ok(())
    }

    fn balance_at(timeline: &BTreeMap<Timestamp, TokenAmount>, at: Timestamp) -> TokenAmount {
        timeline
            .range(..=at)
            .next_back()
            .map(|(_, amount)| *amount)
            .unwrap_or(TokenAmount::ZERO)
    }
}

impl Default for NullBalanceOracle {
    fn default() -> Self {
        Self::new()
    }
}

impl BalanceOracle for NullBalanceOracle {
    fn balance_of(&self, principal: &PrincipalId, at: Timestamp) -> Result<TokenAmount, OracleError> {
        self.check()?;
        Ok(self
            .balances
            .lock()
            .unwrap()
            .get(principal)
            .map(|timeline| Self::balance_at(timeline, at))
            .unwrap_or(TokenAmount::ZERO))
    }

    fn total_supply(&self, at: Timestamp) -> Result<TokenAmount, OracleError> {
        self.check()?;
        if let Some(supply) = *self.supply.lock().unwrap() {
            return Ok(supply);
        }
        Ok(self
            .balances
            .lock()
            .unwrap()
            .values()
            .map(|timeline| Self::balance_at(timeline, at))
            .sum())
    }
}
