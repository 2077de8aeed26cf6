//! # In-Memory Asset Ledger
//!
//! A minimal token ledger implementing [`AssetTransferPort`]: account
//! balances, allowances granted to the pool, and the pool's own holdings.
//!
//! Serializable so a persistent session can store it next to the pool.

use crate::ports::{AssetTransferPort, TransferError};
use crate::{AccountId, Amount};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Balances and pool allowances for a single asset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryLedger {
    balances: BTreeMap<AccountId, Amount>,
    /// Amount each owner has approved the pool to draw.
    allowances: BTreeMap<AccountId, Amount>,
    /// Units held by the pool (principal plus reward reserve).
    pool_balance: Amount,
}

impl MemoryLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit `amount` to `account` out of thin air (genesis / test seeding).
    pub fn mint(&mut self, account: &AccountId, amount: Amount) -> Result<(), TransferError> {
        let balance = self.balances.entry(account.clone()).or_insert(0);
        *balance = balance.checked_add(amount).ok_or(TransferError::Overflow)?;
        Ok(())
    }

    /// Set the allowance `owner` grants the pool. Replaces any previous value.
    pub fn approve(&mut self, owner: &AccountId, amount: Amount) {
        self.allowances.insert(owner.clone(), amount);
    }

    /// Remaining allowance `owner` granted the pool.
    #[must_use]
    pub fn allowance(&self, owner: &AccountId) -> Amount {
        self.allowances.get(owner).copied().unwrap_or(0)
    }

    /// Units held by the pool.
    #[must_use]
    pub fn pool_balance(&self) -> Amount {
        self.pool_balance
    }

    /// All non-pool balances in account order.
    pub fn balances(&self) -> impl Iterator<Item = (&AccountId, Amount)> {
        self.balances.iter().map(|(k, v)| (k, *v))
    }

    fn require_allowance(&self, owner: &AccountId, required: Amount) -> Result<(), TransferError> {
        let approved = self.allowance(owner);
        if approved < required {
            return Err(TransferError::InsufficientAllowance {
                account: owner.to_string(),
                approved,
                required,
            });
        }
        Ok(())
    }
}

impl AssetTransferPort for MemoryLedger {
    fn authorize_draw(&self, from: &AccountId, requested: Amount) -> Result<(), TransferError> {
        self.require_allowance(from, requested)
    }

    fn transfer_into(&mut self, from: &AccountId, amount: Amount) -> Result<(), TransferError> {
        self.require_allowance(from, amount)?;
        let available = self.balance_of(from);
        if available < amount {
            return Err(TransferError::InsufficientBalance {
                account: from.to_string(),
                available,
                required: amount,
            });
        }
        let pool_after = self
            .pool_balance
            .checked_add(amount)
            .ok_or(TransferError::Overflow)?;

        // All checks passed; apply every leg together.
        self.balances.insert(from.clone(), available - amount);
        let approved = self.allowance(from);
        self.allowances.insert(from.clone(), approved - amount);
        self.pool_balance = pool_after;
        Ok(())
    }

    fn transfer_out_of(&mut self, to: &AccountId, amount: Amount) -> Result<(), TransferError> {
        if self.pool_balance < amount {
            return Err(TransferError::InsufficientBalance {
                account: "pool".to_string(),
                available: self.pool_balance,
                required: amount,
            });
        }
        let credited = self
            .balance_of(to)
            .checked_add(amount)
            .ok_or(TransferError::Overflow)?;

        self.pool_balance -= amount;
        self.balances.insert(to.clone(), credited);
        Ok(())
    }

    fn balance_of(&self, account: &AccountId) -> Amount {
        self.balances.get(account).copied().unwrap_or(0)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn account(id: &str) -> AccountId {
        AccountId::new(id).expect("account id")
    }

    #[test]
    fn transfer_into_consumes_allowance() {
        let alice = account("alice");
        let mut ledger = MemoryLedger::new();
        ledger.mint(&alice, 500).expect("mint");
        ledger.approve(&alice, 300);

        ledger.transfer_into(&alice, 200).expect("transfer");

        assert_eq!(ledger.balance_of(&alice), 300);
        assert_eq!(ledger.allowance(&alice), 100);
        assert_eq!(ledger.pool_balance(), 200);
    }

    #[test]
    fn transfer_into_without_allowance_changes_nothing() {
        let alice = account("alice");
        let mut ledger = MemoryLedger::new();
        ledger.mint(&alice, 500).expect("mint");
        ledger.approve(&alice, 50);
        let before = ledger.clone();

        let result = ledger.transfer_into(&alice, 100);

        assert!(matches!(
            result,
            Err(TransferError::InsufficientAllowance { .. })
        ));
        assert_eq!(ledger, before);
    }

    #[test]
    fn transfer_into_without_balance_changes_nothing() {
        let alice = account("alice");
        let mut ledger = MemoryLedger::new();
        ledger.mint(&alice, 50).expect("mint");
        ledger.approve(&alice, 100);
        let before = ledger.clone();

        let result = ledger.transfer_into(&alice, 100);

        assert!(matches!(
            result,
            Err(TransferError::InsufficientBalance { .. })
        ));
        assert_eq!(ledger, before);
    }

    #[test]
    fn transfer_out_of_requires_pool_funds() {
        let alice = account("alice");
        let mut ledger = MemoryLedger::new();

        assert!(ledger.transfer_out_of(&alice, 1).is_err());

        ledger.mint(&alice, 10).expect("mint");
        ledger.approve(&alice, 10);
        ledger.transfer_into(&alice, 10).expect("into");
        ledger.transfer_out_of(&alice, 4).expect("out");

        assert_eq!(ledger.balance_of(&alice), 4);
        assert_eq!(ledger.pool_balance(), 6);
    }

    #[test]
    fn authorize_draw_checks_full_request() {
        let alice = account("alice");
        let mut ledger = MemoryLedger::new();
        ledger.approve(&alice, 100);

        assert!(ledger.authorize_draw(&alice, 100).is_ok());
        assert!(ledger.authorize_draw(&alice, 101).is_err());
    }
}
