//! Property tests for the access ledger.
//!
//! Drives random call sequences from a small set of identities and checks
//! that the ledger's invariants hold after every step.

use paygate_common::{Amount, Identity, PaygateError};
use paygate_ledger::{AccessLedger, CallContext, EventKind, LedgerCall};
use proptest::prelude::*;

const PRICE: u128 = 100_000;
const USERS: usize = 4;

fn identity(index: usize) -> Identity {
    // Index 0 is the owner.
    Identity::from_seed(&format!("prop-identity-{}", index))
}

#[derive(Debug, Clone)]
struct Step {
    caller: usize,
    call: LedgerCall,
    value: u128,
}

fn step_strategy() -> impl Strategy<Value = Step> {
    let call = prop_oneof![
        4 => Just(LedgerCall::PayForAccess),
        2 => Just(LedgerCall::Receive),
        1 => Just(LedgerCall::Withdraw),
        1 => Just(LedgerCall::Pause),
        1 => Just(LedgerCall::Unpause),
    ];
    let value = prop_oneof![
        Just(0u128),
        Just(PRICE - 1),
        Just(PRICE),
        0u128..=3 * PRICE,
    ];

    (0..USERS, call, value).prop_map(|(caller, call, value)| Step {
        caller,
        call,
        // Admin calls mostly carry no value so they reach the owner check.
        value: if call.is_payable() || value % 7 == 0 { value } else { 0 },
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Snapshot {
    paused: bool,
    balance: Amount,
    accounts: Vec<(bool, Amount)>,
    log_len: usize,
}

fn snapshot(ledger: &AccessLedger) -> Snapshot {
    Snapshot {
        paused: ledger.paused(),
        balance: ledger.contract_balance(),
        accounts: (0..USERS)
            .map(|i| {
                let id = identity(i);
                (ledger.has_access(&id), ledger.total_paid(&id))
            })
            .collect(),
        log_len: ledger.journal().len(),
    }
}

proptest! {
    #[test]
    fn invariants_hold_for_any_call_sequence(steps in prop::collection::vec(step_strategy(), 1..60)) {
        let owner = identity(0);
        let mut ledger = AccessLedger::new(owner, Amount::new(PRICE));
        let mut accepted: u128 = 0;
        let mut withdrawn: u128 = 0;

        for step in steps {
            let before = snapshot(&ledger);
            let caller = identity(step.caller);
            let ctx = CallContext::new(caller, Amount::new(step.value));

            match ledger.execute(&ctx, step.call) {
                Ok(receipt) => {
                    match step.call {
                        LedgerCall::PayForAccess | LedgerCall::Receive => {
                            accepted += step.value;
                            prop_assert!(!before.paused);
                            prop_assert_eq!(
                                ledger.total_paid(&caller).value(),
                                before.accounts[step.caller].1.value() + step.value
                            );
                            let grants = receipt
                                .events()
                                .iter()
                                .filter(|e| e.kind() == EventKind::AccessGranted)
                                .count();
                            prop_assert_eq!(grants, usize::from(!before.accounts[step.caller].0));
                        }
                        LedgerCall::Withdraw => {
                            prop_assert_eq!(caller, owner);
                            withdrawn += receipt.payout.map(|p| p.amount.value()).unwrap_or(0);
                            prop_assert_eq!(ledger.contract_balance(), Amount::ZERO);
                        }
                        LedgerCall::Pause | LedgerCall::Unpause => {
                            prop_assert_eq!(caller, owner);
                        }
                    }
                }
                Err(err) => {
                    // Rejections leave no trace.
                    prop_assert_eq!(snapshot(&ledger), before.clone());

                    if !step.call.is_payable() && step.value == 0 && caller != owner {
                        prop_assert_eq!(err, PaygateError::NotOwner { caller });
                    } else if step.call.is_payable() && before.paused {
                        prop_assert_eq!(err, PaygateError::Paused);
                    }
                }
            }

            let after = snapshot(&ledger);
            for (i, ((had, paid_before), (has, paid_after))) in
                before.accounts.iter().zip(after.accounts.iter()).enumerate()
            {
                // Access and totals only ever grow.
                prop_assert!(!had || *has, "access revoked for identity {}", i);
                prop_assert!(paid_after >= paid_before);
                if *has {
                    prop_assert!(paid_after.value() >= PRICE);
                }
            }

            prop_assert_eq!(ledger.contract_balance().value(), accepted - withdrawn);
            prop_assert!(ledger.treasury().is_consistent());
            prop_assert!(after.log_len >= before.log_len);
        }
    }

    #[test]
    fn first_payment_below_price_never_unlocks(amount in 0u128..PRICE) {
        let mut ledger = AccessLedger::new(identity(0), Amount::new(PRICE));
        let payer = identity(1);

        let err = ledger
            .pay_for_access(&CallContext::new(payer, Amount::new(amount)))
            .unwrap_err();

        prop_assert_eq!(err.error_code(), "INSUFFICIENT_PAYMENT");
        prop_assert!(!ledger.has_access(&payer));
        prop_assert!(ledger.journal().is_empty());
    }

    #[test]
    fn any_top_up_after_unlock_is_accepted(first in PRICE..10 * PRICE, extra in 0u128..PRICE) {
        let mut ledger = AccessLedger::new(identity(0), Amount::new(PRICE));
        let payer = identity(1);

        ledger.pay_for_access(&CallContext::new(payer, Amount::new(first))).unwrap();
        let receipt = ledger
            .receive(&CallContext::new(payer, Amount::new(extra)))
            .unwrap();

        prop_assert_eq!(receipt.entries.len(), 1);
        prop_assert_eq!(ledger.total_paid(&payer).value(), first + extra);
    }
}
