//! Append-only notification log.

use paygate_common::{Amount, BlockNumber, Identity, Timestamp, TxId};
use serde::{Deserialize, Serialize};

/// A notification published by the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "PascalCase")]
pub enum LedgerEvent {
    /// Emitted on every accepted payment.
    PaymentReceived {
        payer: Identity,
        amount: Amount,
        new_total_paid: Amount,
    },
    /// Emitted once per account, on the payment that unlocks it.
    AccessGranted { account: Identity, price: Amount },
    /// Owner paused payments.
    Paused { account: Identity },
    /// Owner resumed payments.
    Unpaused { account: Identity },
}

impl LedgerEvent {
    /// The kind of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            LedgerEvent::PaymentReceived { .. } => EventKind::PaymentReceived,
            LedgerEvent::AccessGranted { .. } => EventKind::AccessGranted,
            LedgerEvent::Paused { .. } => EventKind::Paused,
            LedgerEvent::Unpaused { .. } => EventKind::Unpaused,
        }
    }

    /// The identity this event is about.
    pub fn subject(&self) -> Identity {
        match *self {
            LedgerEvent::PaymentReceived { payer, .. } => payer,
            LedgerEvent::AccessGranted { account, .. } => account,
            LedgerEvent::Paused { account } => account,
            LedgerEvent::Unpaused { account } => account,
        }
    }
}

/// Event discriminant used for filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    PaymentReceived,
    AccessGranted,
    Paused,
    Unpaused,
}

/// A published event with its position in the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Position in the log, starting at 0.
    pub sequence: u64,
    /// Transaction that produced the event.
    pub tx_id: TxId,
    /// Block the transaction was included in.
    pub block: BlockNumber,
    /// The event itself.
    pub event: LedgerEvent,
    /// When the producing block was mined.
    pub recorded_at: Timestamp,
}

/// Criteria for querying the log. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogFilter {
    /// Inclusive lower block bound.
    pub from_block: Option<BlockNumber>,
    /// Inclusive upper block bound.
    pub to_block: Option<BlockNumber>,
    /// Only events of this kind.
    pub kind: Option<EventKind>,
    /// Only events about this identity.
    pub subject: Option<Identity>,
}

impl LogFilter {
    /// Match everything.
    pub fn all() -> Self {
        Self::default()
    }

    /// Restrict to one event kind.
    pub fn kind(mut self, kind: EventKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Restrict to blocks at or after `block`.
    pub fn from_block(mut self, block: BlockNumber) -> Self {
        self.from_block = Some(block);
        self
    }

    /// Restrict to blocks at or before `block`.
    pub fn to_block(mut self, block: BlockNumber) -> Self {
        self.to_block = Some(block);
        self
    }

    /// Restrict to events about `subject`.
    pub fn subject(mut self, subject: Identity) -> Self {
        self.subject = Some(subject);
        self
    }

    /// Check whether an entry matches.
    pub fn matches(&self, entry: &JournalEntry) -> bool {
        self.from_block.map_or(true, |b| entry.block >= b)
            && self.to_block.map_or(true, |b| entry.block <= b)
            && self.kind.map_or(true, |k| entry.event.kind() == k)
            && self.subject.map_or(true, |s| entry.event.subject() == s)
    }
}

/// Ordered, append-only sequence of published events.
///
/// Entries are only ever added by a committed transition; nothing removes
/// or rewrites them.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    entries: Vec<JournalEntry>,
}

impl Journal {
    /// Create an empty journal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the events of one committed transaction.
    pub(crate) fn append(
        &mut self,
        tx_id: TxId,
        block: BlockNumber,
        recorded_at: Timestamp,
        events: &[LedgerEvent],
    ) -> Vec<JournalEntry> {
        let start = self.entries.len();

        for event in events {
            let entry = JournalEntry {
                sequence: self.entries.len() as u64,
                tx_id,
                block,
                event: *event,
                recorded_at,
            };
            self.entries.push(entry);
        }

        self.entries[start..].to_vec()
    }

    /// All entries in publication order.
    pub fn entries(&self) -> &[JournalEntry] {
        &self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing has been published.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries matching a filter, in publication order.
    pub fn query(&self, filter: &LogFilter) -> Vec<JournalEntry> {
        self.entries
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect()
    }

    /// Entries produced by one transaction.
    pub fn for_tx(&self, tx_id: TxId) -> Vec<JournalEntry> {
        self.entries
            .iter()
            .filter(|e| e.tx_id == tx_id)
            .cloned()
            .collect()
    }

    /// Export the log as JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use paygate_common::now;

    fn payment(payer: Identity, amount: u128, total: u128) -> LedgerEvent {
        LedgerEvent::PaymentReceived {
            payer,
            amount: Amount::new(amount),
            new_total_paid: Amount::new(total),
        }
    }

    #[test]
    fn test_append_assigns_sequence() {
        let alice = Identity::from_seed("alice");
        let mut journal = Journal::new();

        let first = journal.append(
            TxId::new(),
            BlockNumber::new(1),
            now(),
            &[
                payment(alice, 100, 100),
                LedgerEvent::AccessGranted {
                    account: alice,
                    price: Amount::new(100),
                },
            ],
        );
        let second = journal.append(TxId::new(), BlockNumber::new(2), now(), &[payment(alice, 5, 105)]);

        assert_eq!(first.iter().map(|e| e.sequence).collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(second[0].sequence, 2);
        assert_eq!(journal.len(), 3);
    }

    #[test]
    fn test_query_by_block_range_and_kind() {
        let alice = Identity::from_seed("alice");
        let bob = Identity::from_seed("bob");
        let mut journal = Journal::new();

        journal.append(TxId::new(), BlockNumber::new(1), now(), &[payment(alice, 100, 100)]);
        journal.append(TxId::new(), BlockNumber::new(2), now(), &[payment(bob, 100, 100)]);
        journal.append(
            TxId::new(),
            BlockNumber::new(3),
            now(),
            &[LedgerEvent::Paused { account: alice }],
        );

        let ranged = journal.query(&LogFilter::all().from_block(BlockNumber::new(2)));
        assert_eq!(ranged.len(), 2);

        let payments = journal.query(
            &LogFilter::all()
                .kind(EventKind::PaymentReceived)
                .to_block(BlockNumber::new(3)),
        );
        assert_eq!(payments.len(), 2);

        let about_alice = journal.query(&LogFilter::all().subject(alice));
        assert_eq!(about_alice.len(), 2);
    }

    #[test]
    fn test_for_tx() {
        let alice = Identity::from_seed("alice");
        let tx = TxId::new();
        let mut journal = Journal::new();

        journal.append(tx, BlockNumber::new(1), now(), &[payment(alice, 1, 1)]);
        journal.append(TxId::new(), BlockNumber::new(2), now(), &[payment(alice, 1, 2)]);

        assert_eq!(journal.for_tx(tx).len(), 1);
    }

    #[test]
    fn test_event_json_shape() {
        let alice = Identity::from_seed("alice");
        let json = serde_json::to_value(LedgerEvent::AccessGranted {
            account: alice,
            price: Amount::new(100),
        })
        .unwrap();

        assert_eq!(json["event"], "AccessGranted");
        assert_eq!(json["account"], alice.to_string());
    }
}
