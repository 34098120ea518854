use crate::types::QuoteRecord;
use std::sync::{Arc, RwLock};

/// Append-only, shared log of normalized quotes.
///
/// Many stream tasks append concurrently; analyzers read. Entries are never
/// mutated or removed, so an index observed once stays valid for the process
/// lifetime and readers only ever see fully-written records. The lock is
/// never held across a suspension point.
#[derive(Debug, Default)]
pub struct PriceLedger {
    entries: RwLock<Vec<QuoteRecord>>,
}

impl PriceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one record. Within a single producer, append order equals
    /// call order.
    pub fn append(&self, record: QuoteRecord) {
        self.entries
            .write()
            .expect("ledger lock poisoned")
            .push(record);
    }

    /// Appends a batch of records, preserving their order.
    pub fn extend(&self, records: impl IntoIterator<Item = QuoteRecord>) {
        self.entries
            .write()
            .expect("ledger lock poisoned")
            .extend(records);
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("ledger lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a copy of every entry at index `start` or later.
    pub fn read_from(&self, start: usize) -> Vec<QuoteRecord> {
        let entries = self.entries.read().expect("ledger lock poisoned");
        if start >= entries.len() {
            return Vec::new();
        }
        entries[start..].to_vec()
    }

    /// Returns a copy of the full log.
    pub fn snapshot(&self) -> Vec<QuoteRecord> {
        self.entries.read().expect("ledger lock poisoned").clone()
    }
}

/// A consumer-owned cursor over the ledger.
///
/// Each call to [`LedgerCursor::poll_new`] yields only the entries appended
/// since the previous call, so a consumer processes every record at most
/// once.
#[derive(Debug)]
pub struct LedgerCursor {
    ledger: Arc<PriceLedger>,
    position: usize,
}

impl LedgerCursor {
    pub fn new(ledger: Arc<PriceLedger>) -> Self {
        Self {
            ledger,
            position: 0,
        }
    }

    /// Index of the next unconsumed entry.
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn ledger(&self) -> &Arc<PriceLedger> {
        &self.ledger
    }

    /// Drains entries appended since the last poll.
    pub fn poll_new(&mut self) -> Vec<QuoteRecord> {
        let new_entries = self.ledger.read_from(self.position);
        self.position += new_entries.len();
        new_entries
    }
}
