//! Host lifecycle states.

use serde::{Deserialize, Serialize};

/// Host operational state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HostState {
    /// Genesis applied, not yet accepting transactions.
    Starting,
    /// Accepting transactions.
    Running,
    /// Draining queued transactions, not accepting new ones.
    ShuttingDown,
    /// Stopped.
    Stopped,
}

impl HostState {
    /// Check if the host is accepting new transactions.
    pub fn accepts_transactions(&self) -> bool {
        matches!(self, HostState::Running)
    }

    /// Check if the host is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, HostState::Stopped)
    }
}
