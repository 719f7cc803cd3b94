/// Collateral Ledger Capability
///
/// Token custody lives outside the settlement engine. The engine only needs
/// two synchronous calls, `debit` and `credit`, made inside the same logical
/// transaction as the state change they back. Either may fail, in which case
/// the engine leaves its own state untouched.
///
/// `InMemoryLedger` is the reference implementation used by the service
/// binary and the tests: balances per account, deposits, and a journal.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

use crate::error::MarketError;

// ============================================================================
// CAPABILITY
// ============================================================================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Insufficient funds: {account} needs {required}, has {available}")]
    InsufficientFunds { account: String, required: u128, available: u128 },

    #[error("Account {0} is frozen")]
    AccountFrozen(String),

    #[error("Balance overflow for {0}")]
    Overflow(String),
}

impl From<LedgerError> for MarketError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientFunds { account, required, available } => {
                MarketError::InsufficientFunds { account, required, available }
            }
            other => MarketError::LedgerUnavailable(other.to_string()),
        }
    }
}

/// Value transfer primitive the engine settles against
pub trait Ledger: Send + Sync {
    /// Take `amount` from `account`
    fn debit(&self, account: &str, amount: u128) -> Result<(), LedgerError>;

    /// Give `amount` to `account`
    fn credit(&self, account: &str, amount: u128) -> Result<(), LedgerError>;
}

// ============================================================================
// IN-MEMORY LEDGER
// ============================================================================

/// Journal entry kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Deposit,
    Debit,
    Credit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub kind: EntryKind,
    pub account: String,
    pub amount: u128,
    pub balance_after: u128,
}

/// Persistable balances
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balances {
    pub accounts: HashMap<String, u128>,
}

#[derive(Debug, Default)]
struct LedgerInner {
    balances: HashMap<String, u128>,
    frozen: HashSet<String>,
    journal: Vec<LedgerEntry>,
}

#[derive(Debug, Default)]
pub struct InMemoryLedger {
    inner: RwLock<LedgerInner>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_balances(balances: Balances) -> Self {
        Self {
            inner: RwLock::new(LedgerInner {
                balances: balances.accounts,
                ..LedgerInner::default()
            }),
        }
    }

    /// Add funds to an account, creating it if needed. Returns the new balance.
    pub fn deposit(&self, account: &str, amount: u128) -> Result<u128, LedgerError> {
        let mut inner = self.inner.write();
        let balance = inner.balances.entry(account.to_string()).or_insert(0);
        *balance = balance
            .checked_add(amount)
            .ok_or_else(|| LedgerError::Overflow(account.to_string()))?;
        let balance_after = *balance;
        inner.journal.push(LedgerEntry {
            kind: EntryKind::Deposit,
            account: account.to_string(),
            amount,
            balance_after,
        });
        tracing::debug!(account, amount, balance_after, "deposit");
        Ok(balance_after)
    }

    pub fn balance(&self, account: &str) -> u128 {
        self.inner.read().balances.get(account).copied().unwrap_or(0)
    }

    /// Block (or unblock) transfers for an account
    pub fn set_frozen(&self, account: &str, frozen: bool) {
        let mut inner = self.inner.write();
        if frozen {
            inner.frozen.insert(account.to_string());
        } else {
            inner.frozen.remove(account);
        }
    }

    /// Sum of every balance
    pub fn total_supply(&self) -> u128 {
        self.inner.read().balances.values().sum()
    }

    pub fn journal(&self) -> Vec<LedgerEntry> {
        self.inner.read().journal.clone()
    }

    pub fn snapshot(&self) -> Balances {
        Balances {
            accounts: self.inner.read().balances.clone(),
        }
    }
}

impl Ledger for InMemoryLedger {
    fn debit(&self, account: &str, amount: u128) -> Result<(), LedgerError> {
        let mut inner = self.inner.write();
        if inner.frozen.contains(account) {
            return Err(LedgerError::AccountFrozen(account.to_string()));
        }

        let available = inner.balances.get(account).copied().unwrap_or(0);
        if available < amount {
            return Err(LedgerError::InsufficientFunds {
                account: account.to_string(),
                required: amount,
                available,
            });
        }

        let balance_after = available - amount;
        inner.balances.insert(account.to_string(), balance_after);
        inner.journal.push(LedgerEntry {
            kind: EntryKind::Debit,
            account: account.to_string(),
            amount,
            balance_after,
        });
        Ok(())
    }

    fn credit(&self, account: &str, amount: u128) -> Result<(), LedgerError> {
        let mut inner = self.inner.write();
        if inner.frozen.contains(account) {
            return Err(LedgerError::AccountFrozen(account.to_string()));
        }

        let current = inner.balances.get(account).copied().unwrap_or(0);
        let balance_after = current
            .checked_add(amount)
            .ok_or_else(|| LedgerError::Overflow(account.to_string()))?;
        inner.balances.insert(account.to_string(), balance_after);
        inner.journal.push(LedgerEntry {
            kind: EntryKind::Credit,
            account: account.to_string(),
            amount,
            balance_after,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deposit_and_debit() {
        let ledger = InMemoryLedger::new();
        assert_eq!(ledger.deposit("alice", 1_000).unwrap(), 1_000);

        ledger.debit("alice", 400).unwrap();
        assert_eq!(ledger.balance("alice"), 600);

        ledger.credit("alice", 50).unwrap();
        assert_eq!(ledger.balance("alice"), 650);
        assert_eq!(ledger.journal().len(), 3);
    }

    #[test]
    fn test_insufficient_funds_leaves_balance() {
        let ledger = InMemoryLedger::new();
        ledger.deposit("bob", 10).unwrap();

        let err = ledger.debit("bob", 11).unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientFunds { account: "bob".into(), required: 11, available: 10 }
        );
        assert_eq!(ledger.balance("bob"), 10);
    }

    #[test]
    fn test_frozen_account_rejects_transfers() {
        let ledger = InMemoryLedger::new();
        ledger.deposit("carol", 10).unwrap();
        ledger.set_frozen("carol", true);

        assert!(matches!(ledger.debit("carol", 1), Err(LedgerError::AccountFrozen(_))));
        assert!(matches!(ledger.credit("carol", 1), Err(LedgerError::AccountFrozen(_))));

        ledger.set_frozen("carol", false);
        assert!(ledger.credit("carol", 1).is_ok());
    }

    #[test]
    fn test_ledger_error_maps_to_market_error() {
        let err: MarketError = LedgerError::AccountFrozen("dave".into()).into();
        assert!(matches!(err, MarketError::LedgerUnavailable(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_snapshot_restores_balances() {
        let ledger = InMemoryLedger::new();
        ledger.deposit("alice", 5).unwrap();
        let restored = InMemoryLedger::from_balances(ledger.snapshot());
        assert_eq!(restored.balance("alice"), 5);
        assert_eq!(restored.total_supply(), 5);
    }
}
