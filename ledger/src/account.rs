//! Per-identity payment records.

use paygate_common::Amount;
use serde::{Deserialize, Serialize};

/// Access status of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountStatus {
    /// No qualifying payment yet.
    Locked,
    /// Access granted. Never reverts to `Locked`.
    Unlocked,
}

/// Payment record for one identity.
///
/// Records are created lazily on the first accepted payment. An identity
/// with no record reads as [`AccountRecord::default`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    /// Sum of every accepted payment from this identity.
    pub total_paid: Amount,
    /// Whether access has been granted.
    pub has_access: bool,
}

impl AccountRecord {
    /// Current status.
    pub fn status(&self) -> AccountStatus {
        if self.has_access {
            AccountStatus::Unlocked
        } else {
            AccountStatus::Locked
        }
    }

    /// Check if the account is unlocked.
    pub fn is_unlocked(&self) -> bool {
        self.has_access
    }

    /// Record after crediting `amount`. Access is never revoked here.
    pub(crate) fn credited(&self, amount: Amount, grant_access: bool) -> Option<Self> {
        Some(Self {
            total_paid: self.total_paid.checked_add(amount)?,
            has_access: self.has_access || grant_access,
        })
    }
}
