//! PayGate Common Types
//!
//! Shared vocabulary for the PayGate workspace: identities, amounts,
//! block numbering and the error taxonomy.

pub mod identifiers;
pub mod monetary;
pub mod error;
pub mod time;

pub use identifiers::*;
pub use monetary::*;
pub use error::*;
pub use time::*;
