//! Access ledger state machine.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use paygate_common::{
    now, Amount, BlockHeader, BlockNumber, Identity, PaygateError, Result, Timestamp, TxId,
};

use crate::account::AccountRecord;
use crate::balance::Treasury;
use crate::config::LedgerConfig;
use crate::journal::{Journal, JournalEntry, LedgerEvent};

/// Global operating state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerStatus {
    /// Payments are accepted.
    Active,
    /// Payments are rejected; reads and owner administration still work.
    Paused,
}

/// A mutating entry point of the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LedgerCall {
    /// Explicit payment.
    PayForAccess,
    /// Bare value transfer with no operation selected. Same effect as `PayForAccess`.
    Receive,
    /// Owner sweeps the treasury.
    Withdraw,
    /// Owner suspends payments.
    Pause,
    /// Owner resumes payments.
    Unpause,
}

impl LedgerCall {
    /// Check whether this call may carry value.
    pub fn is_payable(&self) -> bool {
        matches!(self, LedgerCall::PayForAccess | LedgerCall::Receive)
    }

    /// Entry point name.
    pub fn name(&self) -> &'static str {
        match self {
            LedgerCall::PayForAccess => "payForAccess",
            LedgerCall::Receive => "receive",
            LedgerCall::Withdraw => "withdraw",
            LedgerCall::Pause => "pause",
            LedgerCall::Unpause => "unpause",
        }
    }
}

/// Who is calling, with how much value, and where the call lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallContext {
    /// Authenticated caller.
    pub caller: Identity,
    /// Value transferred with the call.
    pub value: Amount,
    /// Transaction carrying the call.
    pub tx_id: TxId,
    /// Block the call will be included in.
    pub block: BlockNumber,
    /// Timestamp of that block.
    pub timestamp: Timestamp,
}

impl CallContext {
    /// A call outside any particular block.
    pub fn new(caller: Identity, value: Amount) -> Self {
        Self {
            caller,
            value,
            tx_id: TxId::new(),
            block: BlockNumber::GENESIS,
            timestamp: now(),
        }
    }

    /// Place the call in a block.
    pub fn in_block(mut self, header: BlockHeader) -> Self {
        self.block = header.number;
        self.timestamp = header.timestamp;
        self
    }

    /// Use a specific transaction ID.
    pub fn with_tx_id(mut self, tx_id: TxId) -> Self {
        self.tx_id = tx_id;
        self
    }
}

/// Value leaving the ledger as part of a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payout {
    /// Recipient.
    pub to: Identity,
    /// Amount sent.
    pub amount: Amount,
}

/// The complete effect of a call, computed but not yet applied.
///
/// Produced by [`AccessLedger::plan`] and consumed by [`AccessLedger::commit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    call: LedgerCall,
    base_version: u64,
    account: Option<(Identity, AccountRecord)>,
    treasury: Treasury,
    paused: bool,
    events: Vec<LedgerEvent>,
    payout: Option<Payout>,
}

impl Transition {
    /// The call this transition implements.
    pub fn call(&self) -> LedgerCall {
        self.call
    }

    /// Events that will be published on commit.
    pub fn events(&self) -> &[LedgerEvent] {
        &self.events
    }

    /// Value that will leave the ledger on commit.
    pub fn payout(&self) -> Option<Payout> {
        self.payout
    }
}

/// Outcome of a committed call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerReceipt {
    /// Transaction that carried the call.
    pub tx_id: TxId,
    /// Entry point invoked.
    pub call: LedgerCall,
    /// Authenticated caller.
    pub caller: Identity,
    /// Value received with the call.
    pub value: Amount,
    /// Block the call was included in.
    pub block: BlockNumber,
    /// Published events, in order.
    pub entries: Vec<JournalEntry>,
    /// Value sent out, if any.
    pub payout: Option<Payout>,
}

impl LedgerReceipt {
    /// The events without their log positions.
    pub fn events(&self) -> Vec<LedgerEvent> {
        self.entries.iter().map(|e| e.event).collect()
    }
}

/// Pay-for-access ledger.
///
/// Every mutating call is validated in full against the current state
/// before anything is written, so a rejected call leaves no trace.
#[derive(Debug, Clone)]
pub struct AccessLedger {
    config: LedgerConfig,
    paused: bool,
    accounts: HashMap<Identity, AccountRecord>,
    treasury: Treasury,
    journal: Journal,
    /// Number of committed transitions.
    version: u64,
}

impl AccessLedger {
    /// Create a ledger owned by `owner` charging `price` for first access.
    pub fn new(owner: Identity, price: Amount) -> Self {
        Self::with_config(LedgerConfig::new(owner, price))
    }

    /// Create a ledger from a configuration.
    pub fn with_config(config: LedgerConfig) -> Self {
        info!(owner = %config.owner, price = %config.price, "Access ledger created");

        Self {
            config,
            paused: false,
            accounts: HashMap::new(),
            treasury: Treasury::default(),
            journal: Journal::new(),
            version: 0,
        }
    }

    // ---- reads ----

    /// The privileged identity.
    pub fn owner(&self) -> Identity {
        self.config.owner
    }

    /// Price of first access.
    pub fn price(&self) -> Amount {
        self.config.price
    }

    /// Whether payments are suspended.
    pub fn paused(&self) -> bool {
        self.paused
    }

    /// Global operating state.
    pub fn status(&self) -> LedgerStatus {
        if self.paused {
            LedgerStatus::Paused
        } else {
            LedgerStatus::Active
        }
    }

    /// Whether `identity` has been granted access.
    pub fn has_access(&self, identity: &Identity) -> bool {
        self.account(identity).has_access
    }

    /// Total ever paid by `identity`.
    pub fn total_paid(&self, identity: &Identity) -> Amount {
        self.account(identity).total_paid
    }

    /// Current withdrawable balance.
    pub fn contract_balance(&self) -> Amount {
        self.treasury.balance
    }

    /// Record for `identity`, or the default Locked record if it never paid.
    pub fn account(&self, identity: &Identity) -> AccountRecord {
        self.accounts.get(identity).copied().unwrap_or_default()
    }

    /// Number of identities that have paid at least once.
    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }

    /// Iterate over every recorded account.
    pub fn accounts(&self) -> impl Iterator<Item = (&Identity, &AccountRecord)> {
        self.accounts.iter()
    }

    /// Full treasury accounting.
    pub fn treasury(&self) -> Treasury {
        self.treasury
    }

    /// Creation-time configuration.
    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// The notification log.
    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    // ---- transitions ----

    /// Validate `call` and compute its complete effect without applying it.
    pub fn plan(&self, ctx: &CallContext, call: LedgerCall) -> Result<Transition> {
        if !call.is_payable() && !ctx.value.is_zero() {
            return Err(PaygateError::NonPayable { value: ctx.value });
        }

        match call {
            LedgerCall::PayForAccess | LedgerCall::Receive => self.plan_payment(ctx, call),
            LedgerCall::Withdraw => self.plan_withdraw(ctx),
            LedgerCall::Pause => self.plan_set_paused(ctx, true),
            LedgerCall::Unpause => self.plan_set_paused(ctx, false),
        }
    }

    /// Apply a transition produced by [`plan`](Self::plan) on this same state.
    ///
    /// Fails only if another transition was committed after this one was planned.
    pub fn commit(&mut self, ctx: &CallContext, transition: Transition) -> Result<LedgerReceipt> {
        if transition.base_version != self.version {
            return Err(PaygateError::InternalError(format!(
                "stale transition: planned at version {}, ledger at {}",
                transition.base_version, self.version
            )));
        }

        if let Some((identity, record)) = transition.account {
            self.accounts.insert(identity, record);
        }
        self.treasury = transition.treasury;
        self.paused = transition.paused;
        self.version += 1;

        let entries = self
            .journal
            .append(ctx.tx_id, ctx.block, ctx.timestamp, &transition.events);

        info!(
            call = transition.call.name(),
            caller = %ctx.caller,
            value = %ctx.value,
            events = entries.len(),
            balance = %self.treasury.balance,
            "Ledger transition committed"
        );

        Ok(LedgerReceipt {
            tx_id: ctx.tx_id,
            call: transition.call,
            caller: ctx.caller,
            value: ctx.value,
            block: ctx.block,
            entries,
            payout: transition.payout,
        })
    }

    /// Plan and commit in one step.
    #[instrument(skip(self, ctx), fields(caller = %ctx.caller, value = %ctx.value))]
    pub fn execute(&mut self, ctx: &CallContext, call: LedgerCall) -> Result<LedgerReceipt> {
        let transition = self.plan(ctx, call).map_err(|err| {
            warn!(call = call.name(), code = err.error_code(), error = %err, "Call rejected");
            err
        })?;

        self.commit(ctx, transition)
    }

    /// Pay for access.
    pub fn pay_for_access(&mut self, ctx: &CallContext) -> Result<LedgerReceipt> {
        self.execute(ctx, LedgerCall::PayForAccess)
    }

    /// Accept a bare value transfer.
    pub fn receive(&mut self, ctx: &CallContext) -> Result<LedgerReceipt> {
        self.execute(ctx, LedgerCall::Receive)
    }

    /// Sweep the treasury to the owner.
    pub fn withdraw(&mut self, ctx: &CallContext) -> Result<LedgerReceipt> {
        self.execute(ctx, LedgerCall::Withdraw)
    }

    /// Suspend payments.
    pub fn pause(&mut self, ctx: &CallContext) -> Result<LedgerReceipt> {
        self.execute(ctx, LedgerCall::Pause)
    }

    /// Resume payments.
    pub fn unpause(&mut self, ctx: &CallContext) -> Result<LedgerReceipt> {
        self.execute(ctx, LedgerCall::Unpause)
    }

    fn ensure_owner(&self, caller: &Identity) -> Result<()> {
        if self.config.is_owner(caller) {
            Ok(())
        } else {
            Err(PaygateError::NotOwner { caller: *caller })
        }
    }

    fn plan_payment(&self, ctx: &CallContext, call: LedgerCall) -> Result<Transition> {
        if self.paused {
            return Err(PaygateError::Paused);
        }

        let current = self.account(&ctx.caller);
        let unlocking = !current.has_access;

        if unlocking && ctx.value < self.config.price {
            return Err(PaygateError::InsufficientPayment {
                required: self.config.price,
                provided: ctx.value,
            });
        }

        let record = current
            .credited(ctx.value, unlocking)
            .ok_or(PaygateError::Overflow)?;
        let treasury = self
            .treasury
            .received(ctx.value)
            .ok_or(PaygateError::Overflow)?;

        let mut events = vec![LedgerEvent::PaymentReceived {
            payer: ctx.caller,
            amount: ctx.value,
            new_total_paid: record.total_paid,
        }];
        if unlocking {
            events.push(LedgerEvent::AccessGranted {
                account: ctx.caller,
                price: self.config.price,
            });
        }

        Ok(Transition {
            call,
            base_version: self.version,
            account: Some((ctx.caller, record)),
            treasury,
            paused: self.paused,
            events,
            payout: None,
        })
    }

    fn plan_withdraw(&self, ctx: &CallContext) -> Result<Transition> {
        self.ensure_owner(&ctx.caller)?;

        let (treasury, amount) = self.treasury.drained().ok_or(PaygateError::Overflow)?;

        Ok(Transition {
            call: LedgerCall::Withdraw,
            base_version: self.version,
            account: None,
            treasury,
            paused: self.paused,
            events: Vec::new(),
            payout: Some(Payout {
                to: self.config.owner,
                amount,
            }),
        })
    }

    fn plan_set_paused(&self, ctx: &CallContext, paused: bool) -> Result<Transition> {
        self.ensure_owner(&ctx.caller)?;

        if self.paused == paused {
            return Err(if paused {
                PaygateError::AlreadyPaused
            } else {
                PaygateError::NotPaused
            });
        }

        let (call, event) = if paused {
            (LedgerCall::Pause, LedgerEvent::Paused { account: ctx.caller })
        } else {
            (LedgerCall::Unpause, LedgerEvent::Unpaused { account: ctx.caller })
        };

        Ok(Transition {
            call,
            base_version: self.version,
            account: None,
            treasury: self.treasury,
            paused,
            events: vec![event],
            payout: None,
        })
    }
}
