//! PayGate Host
//!
//! Runs access ledgers the way a chain would: callers are authenticated,
//! native value moves between wallets and ledgers, and every call is applied
//! atomically in its own block.

pub mod config;
pub mod host;
pub mod metrics;
pub mod sequencer;
pub mod state;
pub mod wallet;

pub use config::{HostConfig, DEFAULT_PRICE};
pub use host::{Host, Transaction, TxReceipt};
pub use metrics::{Metrics, MetricsSnapshot};
pub use sequencer::{Sequencer, SequencerHandle};
pub use state::HostState;
pub use wallet::WalletBook;
