//! Simulation controller.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use futures::future::join_all;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::RwLock;
use tracing::{info, warn};

use paygate_common::{Amount, Identity, PaygateError};
use paygate_host::{Host, HostConfig, Sequencer, Transaction, TxReceipt};
use paygate_ledger::{EventKind, LedgerCall, LogFilter};

use crate::accounts::Roster;
use crate::metrics::SimulationMetrics;
use crate::scenario::{AssertCondition, Expect, Scenario, ScenarioStep};

/// Controls the simulation.
pub struct SimulationController {
    /// Host running the ledgers.
    host: Arc<Host>,
    /// Submission queue in front of the host.
    sequencer: Sequencer,
    /// Named accounts.
    roster: Roster,
    /// Random number generator.
    rng: StdRng,
    /// Simulation metrics.
    metrics: RwLock<SimulationMetrics>,
}

impl SimulationController {
    /// Start a host and its sequencer. Must be called inside a tokio runtime.
    pub fn new(config: HostConfig, seed: Option<u64>) -> anyhow::Result<Self> {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };

        let capacity = config.sequencer_capacity;
        let host = Arc::new(Host::new(config)?);
        host.start()?;

        let roster = Roster::from_host(&host)?;
        let sequencer = Sequencer::spawn(host.clone(), capacity);

        info!(
            accounts = host.dev_accounts().len(),
            owner = %roster.owner(),
            "Simulation initialized"
        );

        Ok(Self {
            host,
            sequencer,
            roster,
            rng,
            metrics: RwLock::new(SimulationMetrics::new()),
        })
    }

    /// The host under simulation.
    pub fn host(&self) -> &Arc<Host> {
        &self.host
    }

    /// Deploy a fresh ledger and run a scenario against it.
    pub async fn run_scenario(&self, scenario: &Scenario) -> anyhow::Result<Identity> {
        let price = scenario
            .price
            .unwrap_or(self.host.config().default_price);
        let ledger = self.host.deploy(self.roster.owner(), price)?;

        info!(
            scenario = %scenario.name,
            ledger = %ledger,
            "Running scenario: {}",
            scenario.description
        );

        for (index, step) in scenario.steps.iter().enumerate() {
            self.execute_step(ledger, step)
                .await
                .with_context(|| format!("Step {} of {} failed", index + 1, scenario.name))?;
        }

        info!(scenario = %scenario.name, steps = scenario.steps.len(), "Scenario passed");
        Ok(ledger)
    }

    /// Submit `payments` random payments concurrently, withdraw, and check invariants.
    pub async fn run_traffic(&mut self, payments: usize) -> anyhow::Result<Identity> {
        let owner = self.roster.owner();
        let price = self.host.config().default_price;
        let ledger = self.host.deploy(owner, price)?;

        let users = self.roster.users().to_vec();
        if users.is_empty() {
            anyhow::bail!("Random traffic needs at least one account besides the owner");
        }

        let txs: Vec<Transaction> = (0..payments)
            .map(|_| self.random_payment(ledger, &users, price))
            .collect();

        info!(payments, ledger = %ledger, "Submitting random traffic");

        let this = &*self;
        let outcomes = join_all(txs.into_iter().map(|tx| async move { this.submit(tx).await })).await;
        let accepted = outcomes.iter().filter(|o| o.is_ok()).count();

        self.submit(Transaction::call(owner, ledger, LedgerCall::Withdraw))
            .await
            .context("Owner withdraw failed")?;

        self.check_invariants(ledger)?;

        info!(
            accepted,
            rejected = payments - accepted,
            "Random traffic complete"
        );
        Ok(ledger)
    }

    /// Stop the sequencer and the host.
    pub async fn shutdown(self) -> anyhow::Result<()> {
        self.sequencer.shutdown().await?;
        Ok(())
    }

    /// Get simulation metrics.
    pub async fn metrics(&self) -> SimulationMetrics {
        self.metrics.read().await.clone()
    }

    fn random_payment(&mut self, ledger: Identity, users: &[Identity], price: Amount) -> Transaction {
        let payer = users[self.rng.gen_range(0..users.len())];

        // Mostly purchases and top-ups, with some underpriced first attempts.
        let value = match self.rng.gen_range(0..100) {
            0..=19 => price.value() / 2,
            20..=29 => 0,
            _ => price
                .value()
                .saturating_add(self.rng.gen_range(0..=price.value())),
        };

        if self.rng.gen_bool(0.25) {
            Transaction::transfer(payer, ledger, Amount::new(value))
        } else {
            Transaction::pay_for_access(payer, ledger, Amount::new(value))
        }
    }

    async fn submit(&self, tx: Transaction) -> Result<TxReceipt, PaygateError> {
        let start = Instant::now();
        let outcome = self.sequencer.handle().submit(tx).await;
        let latency = start.elapsed();

        let mut metrics = self.metrics.write().await;
        match &outcome {
            Ok(_) => metrics.record_success(latency),
            Err(err) => metrics.record_revert(err.error_code(), latency),
        }

        outcome
    }

    /// Execute a single scenario step.
    async fn execute_step(&self, ledger: Identity, step: &ScenarioStep) -> anyhow::Result<()> {
        let (tx, expect) = match step {
            ScenarioStep::Pay {
                from,
                amount,
                expect,
            } => (
                Transaction::pay_for_access(self.roster.resolve(from)?, ledger, *amount),
                expect,
            ),
            ScenarioStep::Transfer {
                from,
                amount,
                expect,
            } => (
                Transaction::transfer(self.roster.resolve(from)?, ledger, *amount),
                expect,
            ),
            ScenarioStep::Withdraw { from, expect } => (
                Transaction::call(self.roster.resolve(from)?, ledger, LedgerCall::Withdraw),
                expect,
            ),
            ScenarioStep::Pause { from, expect } => (
                Transaction::call(self.roster.resolve(from)?, ledger, LedgerCall::Pause),
                expect,
            ),
            ScenarioStep::Unpause { from, expect } => (
                Transaction::call(self.roster.resolve(from)?, ledger, LedgerCall::Unpause),
                expect,
            ),
            ScenarioStep::Assert { condition } => {
                return self.check(ledger, condition);
            }
        };

        let sender = self.roster.name_of(&tx.from);
        let call = tx.call.unwrap_or(LedgerCall::Receive).name();

        match (expect, self.submit(tx).await) {
            (Expect::Success, Ok(receipt)) => {
                info!(
                    from = %sender,
                    call,
                    block = %receipt.block,
                    events = receipt.entries.len(),
                    "Step mined"
                );
                Ok(())
            }
            (Expect::Revert(code), Err(err)) if err.error_code() == code => {
                info!(from = %sender, call, code = %code, "Step reverted as expected");
                Ok(())
            }
            (Expect::Success, Err(err)) => Err(anyhow::anyhow!(
                "{} from {} reverted with {}: {}",
                call,
                sender,
                err.error_code(),
                err
            )),
            (Expect::Revert(code), Ok(receipt)) => Err(anyhow::anyhow!(
                "{} from {} was mined in block {} but {} was expected",
                call,
                sender,
                receipt.block,
                code
            )),
            (Expect::Revert(code), Err(err)) => Err(anyhow::anyhow!(
                "{} from {} reverted with {} but {} was expected",
                call,
                sender,
                err.error_code(),
                code
            )),
        }
    }

    fn check(&self, ledger: Identity, condition: &AssertCondition) -> anyhow::Result<()> {
        match condition {
            AssertCondition::HasAccess { account, expected } => {
                let actual = self.host.has_access(&ledger, &self.roster.resolve(account)?)?;
                anyhow::ensure!(
                    actual == *expected,
                    "hasAccess({}) is {}, expected {}",
                    account,
                    actual,
                    expected
                );
            }
            AssertCondition::TotalPaid { account, amount } => {
                let actual = self.host.total_paid(&ledger, &self.roster.resolve(account)?)?;
                anyhow::ensure!(
                    actual == *amount,
                    "totalPaid({}) is {}, expected {}",
                    account,
                    actual,
                    amount
                );
            }
            AssertCondition::ContractBalance { amount } => {
                let actual = self.host.contract_balance(&ledger)?;
                anyhow::ensure!(
                    actual == *amount,
                    "contractBalance() is {}, expected {}",
                    actual,
                    amount
                );
            }
            AssertCondition::Paused { expected } => {
                let actual = self.host.paused(&ledger)?;
                anyhow::ensure!(
                    actual == *expected,
                    "paused() is {}, expected {}",
                    actual,
                    expected
                );
            }
            AssertCondition::TotalWithdrawn { amount } => {
                let actual = self.host.view(&ledger, |l| l.treasury().total_withdrawn)?;
                anyhow::ensure!(
                    actual == *amount,
                    "total withdrawn is {}, expected {}",
                    actual,
                    amount
                );
            }
        }

        info!(?condition, "Assertion holds");
        Ok(())
    }

    fn check_invariants(&self, ledger: Identity) -> anyhow::Result<()> {
        let config = self.host.config();
        let genesis = config
            .genesis_supply()
            .ok_or_else(|| anyhow::anyhow!("Genesis supply overflows"))?;
        anyhow::ensure!(
            self.host.total_supply() == genesis,
            "Native supply changed: {} != {}",
            self.host.total_supply(),
            genesis
        );

        anyhow::ensure!(
            self.host.contract_balance(&ledger)?.is_zero() && self.host.balance_of(&ledger).is_zero(),
            "Ledger still holds funds after withdraw"
        );

        let (treasury, paid, unlocked, underpaid) = self.host.view(&ledger, |l| {
            let paid: Amount = l.accounts().map(|(_, record)| record.total_paid).sum();
            let unlocked = l.accounts().filter(|(_, r)| r.has_access).count();
            let underpaid = l
                .accounts()
                .filter(|(_, r)| r.has_access && r.total_paid < l.price())
                .count();
            (l.treasury(), paid, unlocked, underpaid)
        })?;

        anyhow::ensure!(treasury.is_consistent(), "Treasury accounting is inconsistent");
        anyhow::ensure!(
            treasury.total_withdrawn == paid,
            "Withdrawn {} but accounts paid {}",
            treasury.total_withdrawn,
            paid
        );
        anyhow::ensure!(underpaid == 0, "{} accounts unlocked below price", underpaid);

        let grants = self
            .host
            .logs(&ledger, &LogFilter::all().kind(EventKind::AccessGranted))?
            .len();
        anyhow::ensure!(
            grants == unlocked,
            "{} AccessGranted events for {} unlocked accounts",
            grants,
            unlocked
        );

        if unlocked < self.roster.users().len() {
            warn!(
                unlocked,
                users = self.roster.users().len(),
                "Not every account was unlocked"
            );
        }

        info!(unlocked, withdrawn = %treasury.total_withdrawn.display_in(&config.native), "Invariants hold");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(accounts: usize) -> HostConfig {
        let mut config = HostConfig::default();
        config.dev_accounts = accounts;
        config
    }

    #[tokio::test]
    async fn test_builtin_scenarios_pass() {
        let controller = SimulationController::new(config(4), Some(7)).unwrap();

        for name in Scenario::builtin_names() {
            let scenario = Scenario::load(name).unwrap();
            controller.run_scenario(&scenario).await.unwrap();
        }

        let metrics = controller.metrics().await;
        assert!(metrics.accepted > 0);
        assert!(metrics.reverted.contains_key("PAUSED"));
        controller.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_wrong_expectation_fails_the_run() {
        let controller = SimulationController::new(config(3), Some(7)).unwrap();
        let scenario = Scenario {
            name: "wrong".to_string(),
            description: String::new(),
            price: Some(Amount::new(1_000)),
            steps: vec![ScenarioStep::Pay {
                from: "user1".to_string(),
                amount: Amount::new(999),
                expect: Expect::Success,
            }],
        };

        let err = controller.run_scenario(&scenario).await.unwrap_err();
        assert!(format!("{:#}", err).contains("INSUFFICIENT_PAYMENT"));
        controller.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_random_traffic_keeps_invariants() {
        let mut controller = SimulationController::new(config(6), Some(42)).unwrap();

        let ledger = controller.run_traffic(200).await.unwrap();

        let metrics = controller.metrics().await;
        // Payments plus the final withdraw.
        assert_eq!(metrics.total_transactions, 201);
        assert_eq!(
            controller.host().contract_balance(&ledger).unwrap(),
            Amount::ZERO
        );
        controller.shutdown().await.unwrap();
    }
}
