//! Async submission path.
//!
//! A single worker task drains a bounded queue, so concurrent submitters
//! are executed one at a time in arrival order.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use paygate_common::{PaygateError, Result};

use crate::host::{Host, Transaction, TxReceipt};

struct Job {
    tx: Transaction,
    reply: oneshot::Sender<Result<TxReceipt>>,
}

/// Cloneable submitter.
#[derive(Clone)]
pub struct SequencerHandle {
    host: Arc<Host>,
    jobs: mpsc::Sender<Job>,
}

impl SequencerHandle {
    /// Queue a transaction and wait for its outcome.
    pub async fn submit(&self, tx: Transaction) -> Result<TxReceipt> {
        if !self.host.is_accepting() {
            return Err(PaygateError::HostUnavailable(format!(
                "host is {:?}",
                self.host.state()
            )));
        }

        let (reply, outcome) = oneshot::channel();
        self.jobs
            .send(Job { tx, reply })
            .await
            .map_err(|_| PaygateError::HostUnavailable("sequencer closed".to_string()))?;

        outcome.await.map_err(|_| {
            PaygateError::HostUnavailable("sequencer dropped the transaction".to_string())
        })?
    }

    /// The host behind this sequencer.
    pub fn host(&self) -> &Arc<Host> {
        &self.host
    }
}

/// Owner of the worker task.
pub struct Sequencer {
    handle: SequencerHandle,
    shutdown_tx: mpsc::Sender<()>,
    worker: JoinHandle<()>,
}

impl Sequencer {
    /// Start the worker. Must be called inside a tokio runtime.
    pub fn spawn(host: Arc<Host>, capacity: usize) -> Self {
        let (jobs_tx, jobs_rx) = mpsc::channel(capacity.max(1));
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let worker = tokio::spawn(run(host.clone(), jobs_rx, shutdown_rx));

        Self {
            handle: SequencerHandle {
                host,
                jobs: jobs_tx,
            },
            shutdown_tx,
            worker,
        }
    }

    /// A new submitter.
    pub fn handle(&self) -> SequencerHandle {
        self.handle.clone()
    }

    /// Stop intake, finish queued transactions and stop the host.
    pub async fn shutdown(self) -> Result<()> {
        self.handle.host.begin_shutdown();

        // Signal shutdown to the worker
        let _ = self.shutdown_tx.send(()).await;

        self.worker
            .await
            .map_err(|e| PaygateError::InternalError(format!("sequencer task failed: {}", e)))
    }
}

async fn run(host: Arc<Host>, mut jobs: mpsc::Receiver<Job>, mut shutdown: mpsc::Receiver<()>) {
    info!(capacity = jobs.max_capacity(), "Sequencer started");

    loop {
        tokio::select! {
            _ = shutdown.recv() => break,
            job = jobs.recv() => match job {
                Some(job) => execute(&host, job),
                None => break,
            },
        }
    }

    jobs.close();
    let mut drained = 0usize;
    while let Some(job) = jobs.recv().await {
        execute(&host, job);
        drained += 1;
    }

    host.stop();
    info!(drained, "Sequencer stopped");
}

fn execute(host: &Host, job: Job) {
    let result = host.process(job.tx);
    if job.reply.send(result).is_err() {
        debug!("Submitter went away before the outcome was ready");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HostConfig;
    use crate::state::HostState;
    use futures::future::join_all;
    use paygate_common::Amount;
    use paygate_ledger::LedgerCall;
    use tokio_test::{assert_err, assert_ok};

    const PRICE: Amount = Amount::new(1_000);

    fn running_host() -> Arc<Host> {
        let host = Host::new(HostConfig::default()).unwrap();
        host.start().unwrap();
        Arc::new(host)
    }

    #[tokio::test]
    async fn test_submit_returns_receipt() {
        let host = running_host();
        let owner = host.dev_account(0).unwrap();
        let user = host.dev_account(1).unwrap();
        let ledger = host.deploy(owner, PRICE).unwrap();
        let sequencer = Sequencer::spawn(host.clone(), 8);

        let receipt = assert_ok!(
            sequencer
                .handle()
                .submit(Transaction::pay_for_access(user, ledger, PRICE))
                .await
        );

        assert_eq!(receipt.entries.len(), 2);
        assert!(host.has_access(&ledger, &user).unwrap());
        assert_ok!(sequencer.shutdown().await);
    }

    #[tokio::test]
    async fn test_concurrent_submissions_are_totally_ordered() {
        let host = running_host();
        let owner = host.dev_account(0).unwrap();
        let ledger = host.deploy(owner, PRICE).unwrap();
        let sequencer = Sequencer::spawn(host.clone(), 4);

        let payers: Vec<_> = host.dev_accounts()[1..].to_vec();
        let submissions = payers.iter().map(|payer| {
            let handle = sequencer.handle();
            let tx = Transaction::pay_for_access(*payer, ledger, PRICE);
            async move { handle.submit(tx).await }
        });
        let receipts: Vec<_> = join_all(submissions)
            .await
            .into_iter()
            .collect::<Result<_>>()
            .unwrap();

        let mut blocks: Vec<_> = receipts.iter().map(|r: &TxReceipt| r.block).collect();
        blocks.sort();
        blocks.dedup();
        assert_eq!(blocks.len(), payers.len());

        let expected = PRICE.checked_mul(payers.len() as u128).unwrap();
        assert_eq!(host.contract_balance(&ledger).unwrap(), expected);
        assert_eq!(host.balance_of(&ledger), expected);

        assert_ok!(sequencer.shutdown().await);
    }

    #[tokio::test]
    async fn test_reverts_come_back_through_the_queue() {
        let host = running_host();
        let owner = host.dev_account(0).unwrap();
        let user = host.dev_account(1).unwrap();
        let ledger = host.deploy(owner, PRICE).unwrap();
        let sequencer = Sequencer::spawn(host.clone(), 8);

        let err = assert_err!(
            sequencer
                .handle()
                .submit(Transaction::call(user, ledger, LedgerCall::Pause))
                .await
        );
        assert_eq!(err, PaygateError::NotOwner { caller: user });

        assert_ok!(sequencer.shutdown().await);
    }

    #[tokio::test]
    async fn test_submissions_after_shutdown_fail() {
        let host = running_host();
        let owner = host.dev_account(0).unwrap();
        let ledger = host.deploy(owner, PRICE).unwrap();
        let sequencer = Sequencer::spawn(host.clone(), 8);
        let handle = sequencer.handle();

        assert_ok!(sequencer.shutdown().await);
        assert_eq!(host.state(), HostState::Stopped);

        let err = assert_err!(
            handle
                .submit(Transaction::call(owner, ledger, LedgerCall::Pause))
                .await
        );
        assert_eq!(err.error_code(), "HOST_UNAVAILABLE");
        assert!(!host.paused(&ledger).unwrap());
    }
}
