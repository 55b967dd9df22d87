//! Bounded write batching for the sync loop.
//!
//! Ledger writes are grouped into explicit batches so no single database
//! transaction ever carries more than [`MAX_WRITES_PER_FLUSH`] mutations.
//! [`BoundedBatch::push`] flushes transparently when the bound is reached
//! and [`BoundedBatch::finish`] flushes the remainder, so callers never
//! manage thresholds themselves - but the flushing is an explicit method on
//! an explicit type, not interception behind a proxy.
//!
//! Each flush applies its writes inside one database transaction. A failed
//! flush rolls the whole group back and surfaces the error; the sync loop
//! reacts by not advancing the cursor, so the page is re-fetched on the
//! next run and the idempotent upserts absorb the replay.

use crate::{
    core::ledger::{self, IncomingTransaction, UpsertOutcome},
    errors::Result,
};
use sea_orm::{DatabaseConnection, TransactionTrait};

/// Upper bound on mutations per flushed database transaction.
pub const MAX_WRITES_PER_FLUSH: usize = 200;

/// One pending ledger mutation.
#[derive(Debug, Clone)]
pub enum LedgerWrite {
    /// Merge an incoming transaction by external id
    Upsert(IncomingTransaction),
    /// Tombstone an upstream-removed transaction
    Tombstone {
        /// Upstream id of the removed transaction
        external_id: String,
    },
}

/// What a batch's committed flushes did, accumulated across flushes.
#[derive(Debug, Clone, Default)]
pub struct BatchStats {
    /// Ledger ids of rows created by upserts (in write order)
    pub inserted_ids: Vec<i64>,
    /// Number of upserts that merged an existing row
    pub updated: usize,
    /// Number of removals that tombstoned a live row
    pub tombstoned: usize,
}

/// Collects ledger writes and flushes them in bounded, atomic groups.
#[derive(Debug)]
pub struct BoundedBatch {
    capacity: usize,
    pending: Vec<LedgerWrite>,
    stats: BatchStats,
}

impl BoundedBatch {
    /// Creates a batch that flushes whenever `capacity` writes are pending.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            pending: Vec::new(),
            stats: BatchStats::default(),
        }
    }

    /// Queues a write, flushing first if the batch is at capacity.
    pub async fn push(&mut self, db: &DatabaseConnection, write: LedgerWrite) -> Result<()> {
        if self.pending.len() >= self.capacity {
            self.flush(db).await?;
        }
        self.pending.push(write);
        Ok(())
    }

    /// Applies all pending writes in one database transaction.
    ///
    /// Stats are folded in only after the transaction commits; on error the
    /// writes stay pending and nothing is counted.
    pub async fn flush(&mut self, db: &DatabaseConnection) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let txn = db.begin().await?;
        let mut flushed = BatchStats::default();

        for write in &self.pending {
            match write {
                LedgerWrite::Upsert(incoming) => {
                    match ledger::upsert_transaction(&txn, incoming).await? {
                        UpsertOutcome::Inserted(row) => flushed.inserted_ids.push(row.id),
                        UpsertOutcome::Updated(_) => flushed.updated += 1,
                    }
                }
                LedgerWrite::Tombstone { external_id } => {
                    if ledger::tombstone_transaction(&txn, external_id)
                        .await?
                        .is_some()
                    {
                        flushed.tombstoned += 1;
                    }
                }
            }
        }

        txn.commit().await?;

        self.pending.clear();
        self.stats.inserted_ids.extend(flushed.inserted_ids);
        self.stats.updated += flushed.updated;
        self.stats.tombstoned += flushed.tombstoned;
        Ok(())
    }

    /// Flushes any remainder and returns the accumulated stats.
    pub async fn finish(mut self, db: &DatabaseConnection) -> Result<BatchStats> {
        self.flush(db).await?;
        Ok(self.stats)
    }

    /// Number of writes queued but not yet flushed.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}
