//! Treasury balance tracking.

use paygate_common::Amount;
use serde::{Deserialize, Serialize};

/// The ledger's withdrawable balance.
///
/// `balance == total_received - total_withdrawn` holds after every commit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Treasury {
    /// Current withdrawable balance.
    pub balance: Amount,
    /// Sum of every accepted payment.
    pub total_received: Amount,
    /// Sum of every withdrawal.
    pub total_withdrawn: Amount,
}

impl Treasury {
    /// Treasury after receiving `amount`.
    pub fn received(&self, amount: Amount) -> Option<Self> {
        Some(Self {
            balance: self.balance.checked_add(amount)?,
            total_received: self.total_received.checked_add(amount)?,
            total_withdrawn: self.total_withdrawn,
        })
    }

    /// Treasury after withdrawing everything, with the amount paid out.
    pub fn drained(&self) -> Option<(Self, Amount)> {
        let payout = self.balance;
        let next = Self {
            balance: Amount::ZERO,
            total_received: self.total_received,
            total_withdrawn: self.total_withdrawn.checked_add(payout)?,
        };
        Some((next, payout))
    }

    /// Check the accounting identity.
    pub fn is_consistent(&self) -> bool {
        self.total_received.checked_sub(self.total_withdrawn) == Some(self.balance)
    }
}
