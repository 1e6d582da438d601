//! In-process execution host.
//!
//! The host authenticates callers, moves native value between wallets and
//! ledgers, and applies each transaction as one all-or-nothing step under a
//! single lock. Every accepted transaction is mined in its own block.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use paygate_common::{
    Amount, BlockHeader, BlockNumber, Identity, PaygateError, Result, Timestamp, TxId,
};
use paygate_ledger::{AccessLedger, CallContext, JournalEntry, LedgerCall, LogFilter, Payout};

use crate::config::HostConfig;
use crate::metrics::Metrics;
use crate::state::HostState;
use crate::wallet::WalletBook;

/// A signed request from `from`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Authenticated sender.
    pub from: Identity,
    /// Ledger or wallet being addressed.
    pub to: Identity,
    /// Native value attached.
    pub value: Amount,
    /// Selected entry point. `None` is a bare value transfer.
    pub call: Option<LedgerCall>,
}

impl Transaction {
    /// Invoke a ledger entry point with no value.
    pub fn call(from: Identity, ledger: Identity, call: LedgerCall) -> Self {
        Self {
            from,
            to: ledger,
            value: Amount::ZERO,
            call: Some(call),
        }
    }

    /// Call `payForAccess` with `value`.
    pub fn pay_for_access(from: Identity, ledger: Identity, value: Amount) -> Self {
        Self::call(from, ledger, LedgerCall::PayForAccess).with_value(value)
    }

    /// Send value with no entry point selected.
    pub fn transfer(from: Identity, to: Identity, value: Amount) -> Self {
        Self {
            from,
            to,
            value,
            call: None,
        }
    }

    /// Attach value.
    pub fn with_value(mut self, value: Amount) -> Self {
        self.value = value;
        self
    }
}

/// Record of a mined transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub tx_id: TxId,
    pub block: BlockNumber,
    pub timestamp: Timestamp,
    pub from: Identity,
    pub to: Identity,
    pub value: Amount,
    /// Entry point that ran, if `to` is a ledger.
    pub call: Option<LedgerCall>,
    /// Events published by the ledger.
    pub entries: Vec<JournalEntry>,
    /// Value the ledger sent out.
    pub payout: Option<Payout>,
}

/// Mutable host state. Only touched while holding the chain lock.
struct Chain {
    head: BlockHeader,
    wallets: WalletBook,
    ledgers: HashMap<Identity, AccessLedger>,
    nonces: HashMap<Identity, u64>,
}

impl Chain {
    fn apply(&mut self, tx: Transaction) -> Result<TxReceipt> {
        let header = self.head.successor();
        let tx_id = TxId::new();

        if self.ledgers.contains_key(&tx.from) {
            return Err(PaygateError::LedgerCannotSend(tx.from));
        }

        let available = self.wallets.balance(&tx.from);
        if available < tx.value {
            return Err(PaygateError::InsufficientFunds {
                required: tx.value,
                available,
            });
        }

        let mut wallets = self.wallets.batch();
        wallets.transfer(tx.from, tx.to, tx.value)?;

        let (call, entries, payout) = match self.ledgers.get_mut(&tx.to) {
            Some(ledger) => {
                let call = tx.call.unwrap_or(LedgerCall::Receive);
                let ctx = CallContext::new(tx.from, tx.value)
                    .with_tx_id(tx_id)
                    .in_block(header);

                let transition = ledger.plan(&ctx, call)?;
                if let Some(payout) = transition.payout() {
                    wallets.transfer(tx.to, payout.to, payout.amount)?;
                }
                let changes = wallets.into_changes();

                // Planned under the same lock, so the commit cannot be stale.
                let receipt = ledger.commit(&ctx, transition)?;
                self.wallets.apply(changes);

                (Some(call), receipt.entries, receipt.payout)
            }
            None => {
                if tx.call.is_some() {
                    return Err(PaygateError::UnknownLedger(tx.to));
                }
                let changes = wallets.into_changes();
                self.wallets.apply(changes);

                (None, Vec::new(), None)
            }
        };

        self.head = header;

        Ok(TxReceipt {
            tx_id,
            block: header.number,
            timestamp: header.timestamp,
            from: tx.from,
            to: tx.to,
            value: tx.value,
            call,
            entries,
            payout,
        })
    }

    fn ledger(&self, address: &Identity) -> Result<&AccessLedger> {
        self.ledgers
            .get(address)
            .ok_or(PaygateError::UnknownLedger(*address))
    }
}

/// The execution host.
pub struct Host {
    config: HostConfig,
    state: RwLock<HostState>,
    chain: Mutex<Chain>,
    receipts: DashMap<TxId, TxReceipt>,
    dev_accounts: Vec<Identity>,
    metrics: Arc<Metrics>,
}

impl Host {
    /// Create a host and mint the genesis balances.
    pub fn new(config: HostConfig) -> Result<Self> {
        config
            .validate()
            .map_err(PaygateError::ConfigurationError)?;

        let mut wallets = WalletBook::new();
        let dev_accounts: Vec<Identity> = (0..config.dev_accounts)
            .map(|i| Identity::from_seed(&format!("paygate-dev-account-{}", i)))
            .collect();
        for account in &dev_accounts {
            wallets.mint(*account, config.genesis_balance)?;
        }

        info!(
            chain_id = config.chain_id,
            dev_accounts = dev_accounts.len(),
            genesis_balance = %config.genesis_balance.display_in(&config.native),
            "Host genesis applied"
        );

        Ok(Self {
            config,
            state: RwLock::new(HostState::Starting),
            chain: Mutex::new(Chain {
                head: BlockHeader::genesis(),
                wallets,
                ledgers: HashMap::new(),
                nonces: HashMap::new(),
            }),
            receipts: DashMap::new(),
            dev_accounts,
            metrics: Arc::new(Metrics::new()),
        })
    }

    /// Start accepting transactions.
    ///
    /// A host that has begun shutting down cannot be restarted.
    pub fn start(&self) -> Result<()> {
        let mut state = self.state.write();
        match *state {
            HostState::Starting => {
                *state = HostState::Running;
                info!(chain_id = self.config.chain_id, "Host running");
                Ok(())
            }
            HostState::Running => Ok(()),
            HostState::ShuttingDown | HostState::Stopped => Err(PaygateError::HostUnavailable(
                format!("cannot start a host that is {:?}", *state),
            )),
        }
    }

    /// Stop accepting new transactions while queued ones drain.
    pub fn begin_shutdown(&self) {
        let mut state = self.state.write();
        if !state.is_terminal() {
            *state = HostState::ShuttingDown;
            info!("Host shutting down");
        }
    }

    /// Stop the host.
    pub fn stop(&self) {
        *self.state.write() = HostState::Stopped;
        info!("Host stopped");
    }

    /// Current lifecycle state.
    pub fn state(&self) -> HostState {
        *self.state.read()
    }

    /// Check if new transactions are accepted.
    pub fn is_accepting(&self) -> bool {
        self.state().accepts_transactions()
    }

    /// Host configuration.
    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    /// Pre-funded development accounts. Account 0 is the usual deployer.
    pub fn dev_accounts(&self) -> &[Identity] {
        &self.dev_accounts
    }

    /// Development account by index.
    pub fn dev_account(&self, index: usize) -> Option<Identity> {
        self.dev_accounts.get(index).copied()
    }

    /// Host metrics.
    pub fn metrics(&self) -> Arc<Metrics> {
        self.metrics.clone()
    }

    /// Deploy a ledger owned by `deployer`.
    #[instrument(skip(self))]
    pub fn deploy(&self, deployer: Identity, price: Amount) -> Result<Identity> {
        self.ensure_accepting()?;

        let mut chain = self.chain.lock();
        if chain.ledgers.contains_key(&deployer) {
            return Err(PaygateError::LedgerCannotSend(deployer));
        }
        let nonce = chain.nonces.get(&deployer).copied().unwrap_or(0);
        let address = Identity::derive_ledger(&deployer, nonce);
        if chain.ledgers.contains_key(&address) || !chain.wallets.balance(&address).is_zero() {
            return Err(PaygateError::InternalError(format!(
                "address collision at {}",
                address
            )));
        }

        chain.ledgers.insert(address, AccessLedger::new(deployer, price));
        chain.nonces.insert(deployer, nonce + 1);
        chain.head = chain.head.successor();
        let block = chain.head.number;
        drop(chain);

        self.metrics.ledger_deployed();
        info!(
            ledger = %address,
            owner = %deployer,
            price = %price.display_in(&self.config.native),
            block = %block,
            "Ledger deployed"
        );

        Ok(address)
    }

    /// Deploy a ledger at the configured default price.
    pub fn deploy_default(&self, deployer: Identity) -> Result<Identity> {
        self.deploy(deployer, self.config.default_price)
    }

    /// Execute a transaction.
    pub fn submit(&self, tx: Transaction) -> Result<TxReceipt> {
        self.ensure_accepting()?;
        self.process(tx)
    }

    /// Execute a transaction admitted before shutdown began.
    #[instrument(skip(self, tx), fields(from = %tx.from, to = %tx.to, value = %tx.value))]
    pub(crate) fn process(&self, tx: Transaction) -> Result<TxReceipt> {
        match self.state() {
            HostState::Running | HostState::ShuttingDown => {}
            state => {
                return Err(PaygateError::HostUnavailable(format!("host is {:?}", state)));
            }
        }

        self.metrics.transaction_submitted();

        let result = self.chain.lock().apply(tx);

        match &result {
            Ok(receipt) => {
                self.metrics.transaction_accepted(receipt);
                self.receipts.insert(receipt.tx_id, receipt.clone());
                info!(
                    tx_id = %receipt.tx_id,
                    block = %receipt.block,
                    events = receipt.entries.len(),
                    "Transaction mined"
                );
            }
            Err(err) => {
                self.metrics.transaction_reverted();
                warn!(code = err.error_code(), error = %err, "Transaction rejected");
            }
        }

        result
    }

    /// Receipt of a mined transaction.
    pub fn receipt(&self, tx_id: &TxId) -> Option<TxReceipt> {
        self.receipts.get(tx_id).map(|r| r.clone())
    }

    /// Latest mined block.
    pub fn block_number(&self) -> BlockNumber {
        self.chain.lock().head.number
    }

    /// Native balance of any identity, including ledger addresses.
    pub fn balance_of(&self, identity: &Identity) -> Amount {
        self.chain.lock().wallets.balance(identity)
    }

    /// Sum of all native balances.
    pub fn total_supply(&self) -> Amount {
        self.chain.lock().wallets.total()
    }

    /// Read a ledger through a consistent snapshot.
    pub fn view<R>(&self, ledger: &Identity, f: impl FnOnce(&AccessLedger) -> R) -> Result<R> {
        let chain = self.chain.lock();
        chain.ledger(ledger).map(f)
    }

    /// `owner()`.
    pub fn owner(&self, ledger: &Identity) -> Result<Identity> {
        self.view(ledger, |l| l.owner())
    }

    /// `price()`.
    pub fn price(&self, ledger: &Identity) -> Result<Amount> {
        self.view(ledger, |l| l.price())
    }

    /// `paused()`.
    pub fn paused(&self, ledger: &Identity) -> Result<bool> {
        self.view(ledger, |l| l.paused())
    }

    /// `hasAccess(identity)`.
    pub fn has_access(&self, ledger: &Identity, identity: &Identity) -> Result<bool> {
        self.view(ledger, |l| l.has_access(identity))
    }

    /// `totalPaid(identity)`.
    pub fn total_paid(&self, ledger: &Identity, identity: &Identity) -> Result<Amount> {
        self.view(ledger, |l| l.total_paid(identity))
    }

    /// `contractBalance()`.
    pub fn contract_balance(&self, ledger: &Identity) -> Result<Amount> {
        self.view(ledger, |l| l.contract_balance())
    }

    /// Published events matching `filter`.
    pub fn logs(&self, ledger: &Identity, filter: &LogFilter) -> Result<Vec<JournalEntry>> {
        self.view(ledger, |l| l.journal().query(filter))
    }

    fn ensure_accepting(&self) -> Result<()> {
        let state = self.state();
        if state.accepts_transactions() {
            Ok(())
        } else {
            Err(PaygateError::HostUnavailable(format!("host is {:?}", state)))
        }
    }
}
