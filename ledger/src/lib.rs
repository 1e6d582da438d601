//! PayGate Access Ledger
//!
//! Pay-for-access state machine: one price, one owner, boolean access per
//! identity, a withdrawable treasury and a pause switch on the payment path.

pub mod engine;
pub mod account;
pub mod config;
pub mod journal;
pub mod balance;

pub use engine::{AccessLedger, CallContext, LedgerCall, LedgerReceipt, LedgerStatus, Payout, Transition};
pub use account::{AccountRecord, AccountStatus};
pub use config::LedgerConfig;
pub use journal::{EventKind, Journal, JournalEntry, LedgerEvent, LogFilter};
pub use balance::Treasury;
