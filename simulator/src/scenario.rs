//! Simulation scenarios.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use paygate_common::Amount;

/// A simulation scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Description.
    #[serde(default)]
    pub description: String,
    /// Ledger price in smallest units. Falls back to the host default.
    #[serde(default)]
    pub price: Option<Amount>,
    /// Steps in the scenario.
    pub steps: Vec<ScenarioStep>,
}

/// Expected outcome of a step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Expect {
    /// The transaction is mined.
    #[default]
    Success,
    /// The transaction is rejected with this error code.
    Revert(String),
}

impl Expect {
    fn revert(code: &str) -> Self {
        Expect::Revert(code.to_string())
    }
}

/// A step in a scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ScenarioStep {
    /// Call `payForAccess`.
    Pay {
        from: String,
        amount: Amount,
        #[serde(default)]
        expect: Expect,
    },
    /// Send value with no entry point selected.
    Transfer {
        from: String,
        amount: Amount,
        #[serde(default)]
        expect: Expect,
    },
    /// Call `withdraw`.
    Withdraw {
        from: String,
        #[serde(default)]
        expect: Expect,
    },
    /// Call `pause`.
    Pause {
        from: String,
        #[serde(default)]
        expect: Expect,
    },
    /// Call `unpause`.
    Unpause {
        from: String,
        #[serde(default)]
        expect: Expect,
    },
    /// Assert a condition.
    Assert { condition: AssertCondition },
}

/// Conditions that can be asserted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AssertCondition {
    /// `hasAccess(account)` equals `expected`.
    HasAccess { account: String, expected: bool },
    /// `totalPaid(account)` equals `amount`.
    TotalPaid { account: String, amount: Amount },
    /// `contractBalance()` equals `amount`.
    ContractBalance { amount: Amount },
    /// `paused()` equals `expected`.
    Paused { expected: bool },
    /// Everything ever withdrawn equals `amount`.
    TotalWithdrawn { amount: Amount },
}

impl Scenario {
    /// Load a built-in scenario by name, or a JSON scenario file by path.
    pub fn load(name: &str) -> anyhow::Result<Self> {
        match name {
            "purchase" => Ok(Self::purchase()),
            "pause-window" => Ok(Self::pause_window()),
            "owner-guard" => Ok(Self::owner_guard()),
            "top-ups" => Ok(Self::top_ups()),
            _ if Path::new(name).extension().is_some_and(|ext| ext == "json") => {
                Self::from_file(Path::new(name))
            }
            _ => Err(anyhow::anyhow!(
                "Unknown scenario: {} (built-in: {})",
                name,
                Self::builtin_names().join(", ")
            )),
        }
    }

    /// Read a JSON scenario file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Invalid scenario file {}", path.display()))
    }

    /// Names of the built-in scenarios.
    pub fn builtin_names() -> &'static [&'static str] {
        &["purchase", "pause-window", "owner-guard", "top-ups"]
    }

    /// Purchase, top-up and withdraw.
    fn purchase() -> Self {
        Self {
            name: "purchase".to_string(),
            description: "First purchase, a small top-up, then the owner withdraws".to_string(),
            price: Some(Amount::new(100_000)),
            steps: vec![
                pay("user1", 100_000, Expect::Success),
                has_access("user1", true),
                total_paid("user1", 100_000),
                contract_balance(100_000),
                pay("user1", 100, Expect::Success),
                total_paid("user1", 100_100),
                contract_balance(100_100),
                has_access("user1", true),
                ScenarioStep::Withdraw {
                    from: "owner".to_string(),
                    expect: Expect::Success,
                },
                contract_balance(0),
                ScenarioStep::Assert {
                    condition: AssertCondition::TotalWithdrawn {
                        amount: Amount::new(100_100),
                    },
                },
            ],
        }
    }

    /// Payments are refused while paused.
    fn pause_window() -> Self {
        Self {
            name: "pause-window".to_string(),
            description: "Payments bounce while the owner has the ledger paused".to_string(),
            price: Some(Amount::new(100_000)),
            steps: vec![
                pay("user1", 100_000, Expect::Success),
                ScenarioStep::Pause {
                    from: "owner".to_string(),
                    expect: Expect::Success,
                },
                paused(true),
                pay("user2", 100_000, Expect::revert("PAUSED")),
                ScenarioStep::Transfer {
                    from: "user1".to_string(),
                    amount: Amount::new(1),
                    expect: Expect::revert("PAUSED"),
                },
                has_access("user1", true),
                has_access("user2", false),
                ScenarioStep::Unpause {
                    from: "owner".to_string(),
                    expect: Expect::Success,
                },
                paused(false),
                pay("user2", 100_000, Expect::Success),
                has_access("user2", true),
                contract_balance(200_000),
            ],
        }
    }

    /// Administration is reserved for the owner.
    fn owner_guard() -> Self {
        Self {
            name: "owner-guard".to_string(),
            description: "Non-owners cannot withdraw, pause or unpause".to_string(),
            price: Some(Amount::new(100_000)),
            steps: vec![
                pay("user1", 100_000, Expect::Success),
                ScenarioStep::Withdraw {
                    from: "user1".to_string(),
                    expect: Expect::revert("NOT_OWNER"),
                },
                ScenarioStep::Pause {
                    from: "user2".to_string(),
                    expect: Expect::revert("NOT_OWNER"),
                },
                paused(false),
                ScenarioStep::Unpause {
                    from: "owner".to_string(),
                    expect: Expect::revert("NOT_PAUSED"),
                },
                ScenarioStep::Pause {
                    from: "owner".to_string(),
                    expect: Expect::Success,
                },
                ScenarioStep::Pause {
                    from: "owner".to_string(),
                    expect: Expect::revert("ALREADY_PAUSED"),
                },
                ScenarioStep::Unpause {
                    from: "user1".to_string(),
                    expect: Expect::revert("NOT_OWNER"),
                },
                paused(true),
                ScenarioStep::Withdraw {
                    from: "owner".to_string(),
                    expect: Expect::Success,
                },
                contract_balance(0),
            ],
        }
    }

    /// Only the first payment has to meet the price.
    fn top_ups() -> Self {
        Self {
            name: "top-ups".to_string(),
            description: "Underpriced first payment, then arbitrary top-ups".to_string(),
            price: Some(Amount::new(100_000)),
            steps: vec![
                pay("user1", 99_999, Expect::revert("INSUFFICIENT_PAYMENT")),
                has_access("user1", false),
                total_paid("user1", 0),
                pay("user1", 100_000, Expect::Success),
                pay("user1", 0, Expect::Success),
                pay("user1", 1, Expect::Success),
                ScenarioStep::Transfer {
                    from: "user1".to_string(),
                    amount: Amount::new(5),
                    expect: Expect::Success,
                },
                total_paid("user1", 100_006),
                contract_balance(100_006),
            ],
        }
    }
}

fn pay(from: &str, amount: u128, expect: Expect) -> ScenarioStep {
    ScenarioStep::Pay {
        from: from.to_string(),
        amount: Amount::new(amount),
        expect,
    }
}

fn has_access(account: &str, expected: bool) -> ScenarioStep {
    ScenarioStep::Assert {
        condition: AssertCondition::HasAccess {
            account: account.to_string(),
            expected,
        },
    }
}

fn total_paid(account: &str, amount: u128) -> ScenarioStep {
    ScenarioStep::Assert {
        condition: AssertCondition::TotalPaid {
            account: account.to_string(),
            amount: Amount::new(amount),
        },
    }
}

fn contract_balance(amount: u128) -> ScenarioStep {
    ScenarioStep::Assert {
        condition: AssertCondition::ContractBalance {
            amount: Amount::new(amount),
        },
    }
}

fn paused(expected: bool) -> ScenarioStep {
    ScenarioStep::Assert {
        condition: AssertCondition::Paused { expected },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_load() {
        for name in Scenario::builtin_names() {
            let scenario = Scenario::load(name).unwrap();
            assert_eq!(scenario.name, *name);
            assert!(!scenario.steps.is_empty());
        }
        assert!(Scenario::load("no-such-scenario").is_err());
    }

    #[test]
    fn test_parse_json_scenario() {
        let json = r#"{
            "name": "custom",
            "price": "1000",
            "steps": [
                { "Pay": { "from": "user1", "amount": "999", "expect": { "Revert": "INSUFFICIENT_PAYMENT" } } },
                { "Pay": { "from": "user1", "amount": "1000" } },
                { "Assert": { "condition": { "HasAccess": { "account": "user1", "expected": true } } } },
                { "Withdraw": { "from": "owner" } }
            ]
        }"#;

        let scenario: Scenario = serde_json::from_str(json).unwrap();

        assert_eq!(scenario.price, Some(Amount::new(1_000)));
        assert_eq!(scenario.steps.len(), 4);
        assert!(matches!(
            &scenario.steps[0],
            ScenarioStep::Pay { expect: Expect::Revert(code), .. } if code == "INSUFFICIENT_PAYMENT"
        ));
        assert!(matches!(
            &scenario.steps[1],
            ScenarioStep::Pay { expect: Expect::Success, .. }
        ));
    }

    #[test]
    fn test_missing_scenario_file() {
        assert!(Scenario::load("/nonexistent/scenario.json").is_err());
    }
}
