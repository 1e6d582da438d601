//! Metrics collection for host monitoring.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use paygate_ledger::EventKind;

use crate::host::TxReceipt;

/// Host metrics.
#[derive(Debug, Default)]
pub struct Metrics {
    /// Transactions submitted.
    pub tx_submitted: AtomicU64,
    /// Transactions mined.
    pub tx_accepted: AtomicU64,
    /// Transactions rejected.
    pub tx_reverted: AtomicU64,
    /// Accepted payments.
    pub payments: AtomicU64,
    /// Accounts unlocked.
    pub access_grants: AtomicU64,
    /// Owner withdrawals.
    pub withdrawals: AtomicU64,
    /// Ledgers deployed.
    pub deployments: AtomicU64,
    /// Blocks mined, including deployments.
    pub blocks_mined: AtomicU64,
}

impl Metrics {
    /// Create new metrics instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a submission.
    pub fn transaction_submitted(&self) {
        self.tx_submitted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a mined transaction and what it did.
    pub fn transaction_accepted(&self, receipt: &TxReceipt) {
        self.tx_accepted.fetch_add(1, Ordering::Relaxed);
        self.blocks_mined.fetch_add(1, Ordering::Relaxed);

        for entry in &receipt.entries {
            match entry.event.kind() {
                EventKind::PaymentReceived => {
                    self.payments.fetch_add(1, Ordering::Relaxed);
                }
                EventKind::AccessGranted => {
                    self.access_grants.fetch_add(1, Ordering::Relaxed);
                }
                EventKind::Paused | EventKind::Unpaused => {}
            }
        }

        if receipt.payout.is_some() {
            self.withdrawals.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a rejected transaction.
    pub fn transaction_reverted(&self) {
        self.tx_reverted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a deployment.
    pub fn ledger_deployed(&self) {
        self.deployments.fetch_add(1, Ordering::Relaxed);
        self.blocks_mined.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            tx_submitted: self.tx_submitted.load(Ordering::Relaxed),
            tx_accepted: self.tx_accepted.load(Ordering::Relaxed),
            tx_reverted: self.tx_reverted.load(Ordering::Relaxed),
            payments: self.payments.load(Ordering::Relaxed),
            access_grants: self.access_grants.load(Ordering::Relaxed),
            withdrawals: self.withdrawals.load(Ordering::Relaxed),
            deployments: self.deployments.load(Ordering::Relaxed),
            blocks_mined: self.blocks_mined.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub tx_submitted: u64,
    pub tx_accepted: u64,
    pub tx_reverted: u64,
    pub payments: u64,
    pub access_grants: u64,
    pub withdrawals: u64,
    pub deployments: u64,
    pub blocks_mined: u64,
}

impl MetricsSnapshot {
    /// Share of submitted transactions that were rejected.
    pub fn revert_rate(&self) -> f64 {
        if self.tx_submitted == 0 {
            return 0.0;
        }
        self.tx_reverted as f64 / self.tx_submitted as f64
    }
}
