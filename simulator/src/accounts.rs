//! Named development accounts.

use std::collections::BTreeMap;

use paygate_common::Identity;
use paygate_host::Host;

/// Maps scenario names onto the host's development accounts.
///
/// Account 0 is `owner`, the rest are `user1`, `user2`, ...
#[derive(Debug, Clone)]
pub struct Roster {
    accounts: BTreeMap<String, Identity>,
    owner: Identity,
    users: Vec<Identity>,
}

impl Roster {
    /// Build the roster for a host.
    pub fn from_host(host: &Host) -> anyhow::Result<Self> {
        let (owner, users) = host
            .dev_accounts()
            .split_first()
            .ok_or_else(|| anyhow::anyhow!("Host has no development accounts"))?;

        let mut accounts = BTreeMap::new();
        accounts.insert("owner".to_string(), *owner);
        for (i, user) in users.iter().enumerate() {
            accounts.insert(format!("user{}", i + 1), *user);
        }

        Ok(Self {
            accounts,
            owner: *owner,
            users: users.to_vec(),
        })
    }

    /// The deployer of every simulated ledger.
    pub fn owner(&self) -> Identity {
        self.owner
    }

    /// Every account except the owner.
    pub fn users(&self) -> &[Identity] {
        &self.users
    }

    /// Resolve a name or a hex address.
    pub fn resolve(&self, name: &str) -> anyhow::Result<Identity> {
        if let Some(identity) = self.accounts.get(name) {
            return Ok(*identity);
        }

        name.parse()
            .map_err(|_| anyhow::anyhow!("Unknown account: {}", name))
    }

    /// Name of an identity, or its address if it has none.
    pub fn name_of(&self, identity: &Identity) -> String {
        self.accounts
            .iter()
            .find(|(_, id)| *id == identity)
            .map(|(name, _)| name.clone())
            .unwrap_or_else(|| identity.to_string())
    }
}
