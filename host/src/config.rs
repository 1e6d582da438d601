//! Host configuration.

use paygate_common::{Amount, NativeUnit, MAX_NATIVE_DECIMALS};

/// Default ledger price: 0.0001 of an 18-decimal native unit.
pub const DEFAULT_PRICE: Amount = Amount::new(100_000_000_000_000);

/// Main host configuration.
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Chain identifier reported to clients.
    pub chain_id: u64,
    /// Price used when deploying without an explicit one.
    pub default_price: Amount,
    /// Number of pre-funded development accounts.
    pub dev_accounts: usize,
    /// Genesis balance of each development account.
    pub genesis_balance: Amount,
    /// Native currency.
    pub native: NativeUnit,
    /// Capacity of the sequencer queue.
    pub sequencer_capacity: usize,
    /// Log level.
    pub log_level: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        let native = NativeUnit::rbtc();
        // 10_000 whole units per account.
        let genesis_balance = Amount::new(10_000 * 10u128.pow(native.decimals));

        Self {
            chain_id: 31,
            default_price: DEFAULT_PRICE,
            dev_accounts: 10,
            genesis_balance,
            native,
            sequencer_capacity: 1024,
            log_level: "info".to_string(),
        }
    }
}

impl HostConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(id) = std::env::var("PAYGATE_CHAIN_ID") {
            if let Ok(id) = id.parse() {
                config.chain_id = id;
            }
        }

        if let Ok(price) = std::env::var("PAYGATE_PRICE") {
            if let Ok(price) = price.parse() {
                config.default_price = price;
            }
        }

        if let Ok(count) = std::env::var("PAYGATE_DEV_ACCOUNTS") {
            if let Ok(count) = count.parse() {
                config.dev_accounts = count;
            }
        }

        if let Ok(balance) = std::env::var("PAYGATE_GENESIS_BALANCE") {
            if let Ok(balance) = balance.parse() {
                config.genesis_balance = balance;
            }
        }

        if let Ok(symbol) = std::env::var("PAYGATE_NATIVE_SYMBOL") {
            config.native.symbol = symbol;
        }

        if let Ok(capacity) = std::env::var("PAYGATE_QUEUE_CAPACITY") {
            if let Ok(capacity) = capacity.parse() {
                config.sequencer_capacity = capacity;
            }
        }

        if let Ok(level) = std::env::var("LOG_LEVEL") {
            config.log_level = level;
        }

        config
    }

    /// Total native supply minted at genesis, if it fits.
    pub fn genesis_supply(&self) -> Option<Amount> {
        self.genesis_balance.checked_mul(self.dev_accounts as u128)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.default_price.is_zero() {
            return Err("Default price cannot be 0".to_string());
        }

        if self.dev_accounts == 0 {
            return Err("At least one development account is required".to_string());
        }

        if self.sequencer_capacity == 0 {
            return Err("Sequencer capacity cannot be 0".to_string());
        }

        if self.native.decimals > MAX_NATIVE_DECIMALS {
            return Err(format!(
                "Native unit cannot have more than {} decimals",
                MAX_NATIVE_DECIMALS
            ));
        }

        if self.genesis_supply().is_none() {
            return Err("Genesis supply overflows".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HostConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.default_price, Amount::new(100_000_000_000_000));
        assert_eq!(config.chain_id, 31);
    }

    #[test]
    fn test_invalid_config() {
        let mut config = HostConfig::default();
        config.default_price = Amount::ZERO;
        assert!(config.validate().is_err());

        let mut config = HostConfig::default();
        config.sequencer_capacity = 0;
        assert!(config.validate().is_err());

        let mut config = HostConfig::default();
        config.genesis_balance = Amount::MAX;
        config.dev_accounts = 2;
        assert!(config.validate().is_err());
    }
}
