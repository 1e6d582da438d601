//! Block numbering and timestamps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A timestamp with timezone (always UTC for PayGate).
pub type Timestamp = DateTime<Utc>;

/// Get the current timestamp.
pub fn now() -> Timestamp {
    Utc::now()
}

/// Sequential block height on the host. Genesis is block 0.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct BlockNumber(u64);

impl BlockNumber {
    /// The genesis block.
    pub const GENESIS: BlockNumber = BlockNumber(0);

    /// Create a block number.
    pub const fn new(height: u64) -> Self {
        Self(height)
    }

    /// Get the raw height.
    pub const fn height(&self) -> u64 {
        self.0
    }

    /// The block after this one.
    pub fn next(&self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for BlockNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u64> for BlockNumber {
    fn from(height: u64) -> Self {
        Self(height)
    }
}

/// Header of a mined block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Block height.
    pub number: BlockNumber,
    /// When the block was mined.
    pub timestamp: Timestamp,
}

impl BlockHeader {
    /// The genesis header, stamped now.
    pub fn genesis() -> Self {
        Self {
            number: BlockNumber::GENESIS,
            timestamp: now(),
        }
    }

    /// Header for the block following this one.
    ///
    /// Timestamps never go backwards even if the wall clock does.
    pub fn successor(&self) -> Self {
        Self {
            number: self.number.next(),
            timestamp: now().max(self.timestamp),
        }
    }
}
