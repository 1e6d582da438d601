//! Native balances held by identities on the host.

use std::collections::HashMap;

use paygate_common::{Amount, Identity, PaygateError, Result};

/// Native balance of every identity. Absent identities hold zero.
#[derive(Debug, Clone, Default)]
pub struct WalletBook {
    balances: HashMap<Identity, Amount>,
}

impl WalletBook {
    /// Create an empty book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Balance of `identity`.
    pub fn balance(&self, identity: &Identity) -> Amount {
        self.balances.get(identity).copied().unwrap_or_default()
    }

    /// Mint `amount` to `identity` at genesis.
    pub fn mint(&mut self, identity: Identity, amount: Amount) -> Result<()> {
        let balance = self.balance(&identity).try_add(amount)?;
        self.balances.insert(identity, balance);
        Ok(())
    }

    /// Sum of all balances.
    pub fn total(&self) -> Amount {
        self.balances.values().copied().sum()
    }

    /// Start staging transfers against the current balances.
    pub fn batch(&self) -> WalletBatch<'_> {
        WalletBatch {
            book: self,
            changes: HashMap::new(),
        }
    }

    /// Apply staged balances.
    pub fn apply(&mut self, changes: WalletChanges) {
        for (identity, balance) in changes.0 {
            self.balances.insert(identity, balance);
        }
    }
}

/// Transfers staged against a [`WalletBook`] without touching it.
pub struct WalletBatch<'a> {
    book: &'a WalletBook,
    changes: HashMap<Identity, Amount>,
}

impl WalletBatch<'_> {
    /// Balance of `identity` including staged transfers.
    pub fn balance(&self, identity: &Identity) -> Amount {
        self.changes
            .get(identity)
            .copied()
            .unwrap_or_else(|| self.book.balance(identity))
    }

    /// Stage a transfer.
    pub fn transfer(&mut self, from: Identity, to: Identity, amount: Amount) -> Result<()> {
        let available = self.balance(&from);
        let debited = available
            .checked_sub(amount)
            .ok_or(PaygateError::InsufficientFunds {
                required: amount,
                available,
            })?;
        self.changes.insert(from, debited);

        let credited = self.balance(&to).try_add(amount)?;
        self.changes.insert(to, credited);
        Ok(())
    }

    /// Finish staging.
    pub fn into_changes(self) -> WalletChanges {
        WalletChanges(self.changes)
    }
}

/// Balances produced by a [`WalletBatch`], ready to apply.
#[derive(Debug, Default)]
pub struct WalletChanges(HashMap<Identity, Amount>);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staged_transfers_apply_together() {
        let alice = Identity::from_seed("alice");
        let bob = Identity::from_seed("bob");
        let mut book = WalletBook::new();
        book.mint(alice, Amount::new(1_000)).unwrap();

        let mut batch = book.batch();
        batch.transfer(alice, bob, Amount::new(300)).unwrap();
        batch.transfer(bob, alice, Amount::new(100)).unwrap();
        assert_eq!(batch.balance(&alice), Amount::new(800));
        let changes = batch.into_changes();

        // Nothing moves until applied.
        assert_eq!(book.balance(&alice), Amount::new(1_000));

        book.apply(changes);
        assert_eq!(book.balance(&alice), Amount::new(800));
        assert_eq!(book.balance(&bob), Amount::new(200));
        assert_eq!(book.total(), Amount::new(1_000));
    }

    #[test]
    fn test_transfer_beyond_balance_fails() {
        let alice = Identity::from_seed("alice");
        let bob = Identity::from_seed("bob");
        let mut book = WalletBook::new();
        book.mint(alice, Amount::new(10)).unwrap();

        let mut batch = book.batch();
        let err = batch.transfer(alice, bob, Amount::new(11)).unwrap_err();
        assert_eq!(
            err,
            PaygateError::InsufficientFunds {
                required: Amount::new(11),
                available: Amount::new(10),
            }
        );
    }

    #[test]
    fn test_self_transfer_is_neutral() {
        let alice = Identity::from_seed("alice");
        let mut book = WalletBook::new();
        book.mint(alice, Amount::new(10)).unwrap();

        let mut batch = book.batch();
        batch.transfer(alice, alice, Amount::new(10)).unwrap();
        let changes = batch.into_changes();
        book.apply(changes);

        assert_eq!(book.balance(&alice), Amount::new(10));
    }
}
