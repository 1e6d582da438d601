//! Ledger configuration.

use paygate_common::{Amount, Identity};
use serde::{Deserialize, Serialize};

/// Creation-time configuration. Immutable for the life of the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// The single privileged identity.
    pub owner: Identity,
    /// Minimum first payment, in the smallest native unit.
    pub price: Amount,
}

impl LedgerConfig {
    /// Create a configuration.
    pub fn new(owner: Identity, price: Amount) -> Self {
        Self { owner, price }
    }

    /// Check whether `caller` is the owner.
    pub fn is_owner(&self, caller: &Identity) -> bool {
        self.owner == *caller
    }
}
