//! Identifier types for PayGate entities.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::PaygateError;

/// Length of an identity in bytes.
pub const IDENTITY_LEN: usize = 20;

/// An account or ledger address on the host.
///
/// Rendered as `0x` followed by 40 lowercase hex digits. Parsing is
/// case-insensitive, so checksummed and lowercase forms compare equal.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identity([u8; IDENTITY_LEN]);

impl Identity {
    /// The all-zero identity.
    pub const ZERO: Identity = Identity([0u8; IDENTITY_LEN]);

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; IDENTITY_LEN]) -> Self {
        Self(bytes)
    }

    /// Derive a deterministic identity from a seed label.
    pub fn from_seed(label: &str) -> Self {
        let digest = Sha256::digest(label.as_bytes());
        Self::from_digest(&digest)
    }

    /// Derive the address of a ledger deployed by `deployer` with the given nonce.
    pub fn derive_ledger(deployer: &Identity, nonce: u64) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(deployer.0);
        hasher.update(nonce.to_be_bytes());
        Self::from_digest(&hasher.finalize())
    }

    fn from_digest(digest: &[u8]) -> Self {
        // Keep the trailing bytes of the digest.
        let mut bytes = [0u8; IDENTITY_LEN];
        bytes.copy_from_slice(&digest[digest.len() - IDENTITY_LEN..]);
        Self(bytes)
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; IDENTITY_LEN] {
        &self.0
    }

    /// Check if this is the zero identity.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; IDENTITY_LEN]
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({})", self)
    }
}

impl FromStr for Identity {
    type Err = PaygateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);

        let mut bytes = [0u8; IDENTITY_LEN];
        hex::decode_to_slice(digits, &mut bytes)
            .map_err(|_| PaygateError::InvalidIdentity(s.to_string()))?;

        Ok(Self(bytes))
    }
}

impl TryFrom<String> for Identity {
    type Error = PaygateError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Identity> for String {
    fn from(id: Identity) -> Self {
        id.to_string()
    }
}

/// Unique identifier for a submitted transaction.
/// Uses UUID v7 so identifiers sort by submission time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxId(Uuid);

impl TxId {
    /// Create a new transaction ID.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Create from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Parse from string.
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TxId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_display_roundtrip() {
        let id = Identity::from_seed("owner");
        let rendered = id.to_string();

        assert!(rendered.starts_with("0x"));
        assert_eq!(rendered.len(), 42);
        assert_eq!(rendered.parse::<Identity>().unwrap(), id);
    }

    #[test]
    fn test_identity_parse_is_case_insensitive() {
        let lower = "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed";
        let mixed = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed";

        let a: Identity = lower.parse().unwrap();
        let b: Identity = mixed.parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(b.to_string(), lower);
    }

    #[test]
    fn test_identity_parse_rejects_malformed() {
        assert!("0x1234".parse::<Identity>().is_err());
        assert!("0x0aaeb6053f3e94c9b9a09f33669435e7ef1beaed00"
            .parse::<Identity>()
            .is_err());
        assert!(matches!(
            "0xaaeb6053f3e94c9b9a09f33669435e7ef1beae".parse::<Identity>(),
            Err(PaygateError::InvalidIdentity(_))
        ));
        assert!("0xzzaeb6053f3e94c9b9a09f33669435e7ef1beaed".parse::<Identity>().is_err());
        assert!("0x+aaeb6053f3e94c9b9a09f33669435e7ef1beaed".parse::<Identity>().is_err());
    }

    #[test]
    fn test_seeded_identities_are_distinct() {
        assert_ne!(Identity::from_seed("user1"), Identity::from_seed("user2"));
        assert_eq!(Identity::from_seed("user1"), Identity::from_seed("user1"));
        assert!(!Identity::from_seed("user1").is_zero());
    }

    #[test]
    fn test_ledger_address_depends_on_nonce() {
        let deployer = Identity::from_seed("owner");
        assert_ne!(
            Identity::derive_ledger(&deployer, 0),
            Identity::derive_ledger(&deployer, 1)
        );
    }

    #[test]
    fn test_identity_serializes_as_string() {
        let id = Identity::from_seed("owner");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id));

        let back: Identity = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_tx_id_creation() {
        let id1 = TxId::new();
        let id2 = TxId::new();
        assert_ne!(id1, id2);
    }
}
