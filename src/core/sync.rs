//! Sync business logic - The transaction ingestion loop.
//!
//! For every known connection the loop pages the upstream feed from the
//! stored cursor, reconciles each page into the ledger through a bounded
//! batch, and persists the page's cursor only after its writes have
//! committed. A connection that fails mid-run keeps its old cursor and has
//! the error recorded on it; the sweep always continues with the next
//! connection, so one broken upstream link can never starve the others.
//!
//! The feed reports amounts in the upstream convention (credits negative).
//! This module is the one place where the sign is flipped into the internal
//! positive-inflow convention, as the data is handed to the ledger.

use crate::{
    core::allocation::{self, AllocationOutcome},
    core::batch::{BoundedBatch, LedgerWrite, MAX_WRITES_PER_FLUSH},
    core::connection as connection_ops,
    core::ledger::IncomingTransaction,
    entities::connection,
    errors::{Error, Result},
    feed::{FeedTransaction, TransactionFeed},
};
use sea_orm::DatabaseConnection;
use tracing::{debug, info, warn};

/// Upper bound on pages fetched per connection per run.
///
/// A pathological upstream that always reports more pages would otherwise
/// keep the loop alive forever; whatever is left is picked up next run.
pub const MAX_PAGES_PER_RUN: usize = 50;

/// One connection's failure within a sweep.
#[derive(Debug, Clone)]
pub struct SyncFailure {
    /// Connection that failed
    pub connection_id: String,
    /// What went wrong
    pub message: String,
}

/// Per-connection tallies for a successful sync.
#[derive(Debug, Clone, Default)]
pub struct ConnectionSyncStats {
    /// Pages fetched from the feed
    pub pages: usize,
    /// Ledger rows created
    pub added: usize,
    /// Ledger rows merged in place
    pub modified: usize,
    /// Ledger rows tombstoned
    pub removed: usize,
    /// Ids of the created rows, for downstream allocation
    pub new_transaction_ids: Vec<i64>,
}

/// Aggregate report of one sweep, the operator-visible signal of a run.
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    /// Connections the sweep looked at
    pub connections_processed: usize,
    /// Connections fully synced
    pub connections_succeeded: usize,
    /// Connections that failed and kept their old cursor
    pub connections_failed: usize,
    /// Total ledger rows created
    pub added: usize,
    /// Total ledger rows merged
    pub modified: usize,
    /// Total ledger rows tombstoned
    pub removed: usize,
    /// Failure detail per failed connection
    pub failures: Vec<SyncFailure>,
    /// Ids of all rows created this sweep, in observation order
    pub new_transaction_ids: Vec<i64>,
}

impl SyncReport {
    fn absorb(&mut self, stats: ConnectionSyncStats) {
        self.added += stats.added;
        self.modified += stats.modified;
        self.removed += stats.removed;
        self.new_transaction_ids.extend(stats.new_transaction_ids);
    }
}

/// Report of a sweep followed by automatic allocation of the new arrivals.
#[derive(Debug, Clone, Default)]
pub struct SweepReport {
    /// The ingestion half of the run
    pub sync: SyncReport,
    /// Allocation records written for newly ingested inflows
    pub allocations_created: usize,
    /// New transactions skipped as outflows / no rules / already allocated
    pub allocations_skipped: usize,
    /// Allocation attempts that failed hard (logged, not fatal to the run)
    pub allocation_failures: usize,
}

fn to_incoming(connection: &connection::Model, feed_tx: &FeedTransaction) -> IncomingTransaction {
    IncomingTransaction {
        external_id: feed_tx.external_id.clone(),
        connection_id: connection.id.clone(),
        user_id: connection.user_id.clone(),
        // Upstream reports credits as negative; internally inflows are
        // positive. This negation is the sign boundary for the whole crate.
        amount_minor: -feed_tx.amount_minor,
        currency: feed_tx.currency.clone(),
        posted_on: feed_tx.posted_on,
        description: feed_tx.description.clone(),
    }
}

/// Pulls all pending pages for one connection and reconciles them.
///
/// Pages are processed strictly in cursor order. Each page's writes go
/// through a [`BoundedBatch`]; only after the page has fully committed is
/// the cursor advanced, so a crash or failure replays the current page on
/// the next run and the ledger's idempotent upsert absorbs the replay.
pub async fn sync_connection<F>(
    db: &DatabaseConnection,
    feed: &F,
    connection: &connection::Model,
) -> Result<ConnectionSyncStats>
where
    F: TransactionFeed,
{
    let mut stats = ConnectionSyncStats::default();
    let mut cursor = connection.cursor.clone();

    loop {
        if stats.pages >= MAX_PAGES_PER_RUN {
            warn!(
                connection_id = %connection.id,
                pages = stats.pages,
                "page limit reached; deferring remainder to next run"
            );
            break;
        }

        let page = feed
            .fetch_page(&connection.access_token, cursor.as_deref())
            .await
            .map_err(|e| Error::Feed {
                connection_id: connection.id.clone(),
                message: e.to_string(),
            })?;
        stats.pages += 1;

        let mut batch = BoundedBatch::new(MAX_WRITES_PER_FLUSH);
        for feed_tx in page.added.iter().chain(page.modified.iter()) {
            batch
                .push(db, LedgerWrite::Upsert(to_incoming(connection, feed_tx)))
                .await?;
        }
        for external_id in &page.removed {
            batch
                .push(
                    db,
                    LedgerWrite::Tombstone {
                        external_id: external_id.clone(),
                    },
                )
                .await?;
        }
        let page_stats = batch.finish(db).await?;

        // The page is durably written; only now may the cursor move.
        connection_ops::advance_cursor(db, &connection.id, &page.next_cursor).await?;

        debug!(
            connection_id = %connection.id,
            cursor = %page.next_cursor,
            added = page_stats.inserted_ids.len(),
            modified = page_stats.updated,
            removed = page_stats.tombstoned,
            "page reconciled"
        );

        stats.added += page_stats.inserted_ids.len();
        stats.modified += page_stats.updated;
        stats.removed += page_stats.tombstoned;
        stats.new_transaction_ids.extend(page_stats.inserted_ids);

        cursor = Some(page.next_cursor);
        if !page.has_more {
            break;
        }
    }

    Ok(stats)
}

async fn sweep<F>(
    db: &DatabaseConnection,
    feed: &F,
    connections: Vec<connection::Model>,
) -> SyncReport
where
    F: TransactionFeed,
{
    let mut report = SyncReport::default();

    for conn in connections {
        report.connections_processed += 1;
        match sync_connection(db, feed, &conn).await {
            Ok(stats) => {
                info!(
                    connection_id = %conn.id,
                    pages = stats.pages,
                    added = stats.added,
                    modified = stats.modified,
                    removed = stats.removed,
                    "connection synced"
                );
                report.connections_succeeded += 1;
                report.absorb(stats);
            }
            Err(e) => {
                let message = e.to_string();
                warn!(
                    connection_id = %conn.id,
                    error = %message,
                    "connection sync failed; sweep continues"
                );
                if let Err(record_err) =
                    connection_ops::record_sync_error(db, &conn.id, &message).await
                {
                    warn!(
                        connection_id = %conn.id,
                        error = %record_err,
                        "could not record sync error on connection"
                    );
                }
                report.connections_failed += 1;
                report.failures.push(SyncFailure {
                    connection_id: conn.id,
                    message,
                });
            }
        }
    }

    report
}

/// Syncs every known connection, isolating failures per connection.
pub async fn sync_all_connections<F>(db: &DatabaseConnection, feed: &F) -> Result<SyncReport>
where
    F: TransactionFeed,
{
    let connections = connection_ops::get_all_connections(db).await?;
    Ok(sweep(db, feed, connections).await)
}

/// Syncs a single connection by id (admin/manual trigger).
///
/// The unknown id is the only hard error; a failing connection is reported
/// through the returned [`SyncReport`] exactly as in a full sweep.
pub async fn sync_single_connection<F>(
    db: &DatabaseConnection,
    feed: &F,
    connection_id: &str,
) -> Result<SyncReport>
where
    F: TransactionFeed,
{
    let conn = connection_ops::get_connection(db, connection_id)
        .await?
        .ok_or_else(|| Error::ConnectionNotFound {
            id: connection_id.to_string(),
        })?;
    Ok(sweep(db, feed, vec![conn]).await)
}

/// Runs a full sweep, then allocates each newly ingested transaction.
///
/// Allocation failures never corrupt the ingestion report: each is logged,
/// counted, and left for a later manual retry (the engine's idempotency
/// makes retries safe).
pub async fn sync_and_allocate<F>(
    db: &DatabaseConnection,
    feed: &F,
    auto_allocate: bool,
) -> Result<SweepReport>
where
    F: TransactionFeed,
{
    let sync = sync_all_connections(db, feed).await?;
    let mut report = SweepReport {
        sync,
        ..Default::default()
    };

    if !auto_allocate {
        return Ok(report);
    }

    let new_transaction_ids = report.sync.new_transaction_ids.clone();
    for tx_id in new_transaction_ids {
        match allocation::allocate_transaction(db, tx_id).await {
            Ok(AllocationOutcome::Allocated { record, .. }) => {
                debug!(
                    transaction_id = tx_id,
                    allocation_id = record.id,
                    total_minor = record.total_minor,
                    "transaction allocated"
                );
                report.allocations_created += 1;
            }
            Ok(_) => report.allocations_skipped += 1,
            Err(e) => {
                warn!(
                    transaction_id = tx_id,
                    error = %e,
                    "automatic allocation failed"
                );
                report.allocation_failures += 1;
            }
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::bucket::get_bucket;
    use crate::core::ledger::get_transaction_by_external_id;
    use crate::entities::{Transaction, TxStatus};
    use crate::test_utils::*;
    use sea_orm::{ConnectionTrait, EntityTrait};

    #[tokio::test]
    async fn test_sync_reconciles_and_advances_cursor() -> Result<()> {
        let (db, connection) = setup_with_connection().await?;
        let feed = ScriptedFeed::new(vec![
            script_page(vec![feed_tx("t1", -25000)], vec![], vec![]),
            script_page(vec![feed_tx("t2", 4200)], vec![], vec!["t1".to_string()]),
        ]);

        let stats = sync_connection(&db, &feed, &connection).await?;
        assert_eq!(stats.pages, 2);
        assert_eq!(stats.added, 2);
        assert_eq!(stats.removed, 1);

        // Upstream credit convention flips at the boundary
        let t1 = get_transaction_by_external_id(&db, "t1").await?.unwrap();
        assert_eq!(t1.amount_minor, 25000);
        assert_eq!(t1.status, TxStatus::Removed);
        let t2 = get_transaction_by_external_id(&db, "t2").await?.unwrap();
        assert_eq!(t2.amount_minor, -4200);

        let conn = crate::core::connection::get_connection(&db, &connection.id)
            .await?
            .unwrap();
        assert_eq!(conn.cursor.as_deref(), Some("2"));
        assert!(conn.last_synced_at.is_some());

        Ok(())
    }

    #[tokio::test]
    async fn test_sync_replay_is_idempotent() -> Result<()> {
        let (db, connection) = setup_with_connection().await?;
        let feed = ScriptedFeed::new(vec![script_page(
            vec![feed_tx("t1", -25000)],
            vec![],
            vec![],
        )]);

        let first = sync_connection(&db, &feed, &connection).await?;
        assert_eq!(first.added, 1);
        let row = get_transaction_by_external_id(&db, "t1").await?.unwrap();

        // Replaying the same page (cursor reset, as after a crash before
        // the cursor write) merges instead of duplicating.
        let second = sync_connection(&db, &feed, &connection).await?;
        assert_eq!(second.added, 0);
        assert_eq!(second.modified, 1);

        let rows = Transaction::find().all(&db).await?;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].first_seen_at, row.first_seen_at);

        Ok(())
    }

    #[tokio::test]
    async fn test_feed_failure_keeps_cursor() -> Result<()> {
        let (db, connection) = setup_with_connection().await?;
        let feed = ScriptedFeed::new(vec![
            script_page(vec![feed_tx("t1", -25000)], vec![], vec![]),
            script_page(vec![feed_tx("t2", -1000)], vec![], vec![]),
        ])
        .failing_from_page(1);

        let result = sync_connection(&db, &feed, &connection).await;
        assert!(matches!(result.unwrap_err(), Error::Feed { .. }));

        // Page 1 landed and its cursor stuck; page 2 is untouched
        let conn = crate::core::connection::get_connection(&db, &connection.id)
            .await?
            .unwrap();
        assert_eq!(conn.cursor.as_deref(), Some("1"));
        assert!(get_transaction_by_external_id(&db, "t1").await?.is_some());
        assert!(get_transaction_by_external_id(&db, "t2").await?.is_none());

        Ok(())
    }

    #[tokio::test]
    async fn test_persistence_failure_keeps_cursor() -> Result<()> {
        let (db, connection) = setup_with_connection().await?;
        let feed = ScriptedFeed::new(vec![
            script_page(vec![feed_tx("t1", -25000)], vec![], vec![]),
            script_page(vec![feed_tx("t2", -1000)], vec![], vec![]),
        ]);

        // First run consumes page 1 only
        let one_page = ScriptedFeed::new(vec![script_page(
            vec![feed_tx("t1", -25000)],
            vec![],
            vec![],
        )]);
        sync_connection(&db, &one_page, &connection).await?;

        // Break the ledger store out from under the loop: the page 2 flush
        // now fails, so the cursor must stay at page 1's value.
        db.execute_unprepared("DROP TABLE transactions").await?;
        let conn = crate::core::connection::get_connection(&db, &connection.id)
            .await?
            .unwrap();
        let result = sync_connection(&db, &feed, &conn).await;
        assert!(result.is_err());

        let after = crate::core::connection::get_connection(&db, &connection.id)
            .await?
            .unwrap();
        assert_eq!(after.cursor.as_deref(), Some("1"));

        Ok(())
    }

    #[tokio::test]
    async fn test_sweep_isolates_failing_connection() -> Result<()> {
        let db = setup_test_db().await?;
        // Three connections; conn-b's token is unknown to the feed
        let conn_a = create_custom_connection(&db, "conn-a", "user-1", "token-a").await?;
        create_custom_connection(&db, "conn-b", "user-2", "token-broken").await?;
        let conn_c = create_custom_connection(&db, "conn-c", "user-3", "token-c").await?;

        let feed = crate::feed::replay::ReplayFeed::from_json(
            r#"
            {
                "feeds": {
                    "token-a": [
                        { "added": [ { "external_id": "a1", "amount_minor": -25000,
                                       "currency": "USD", "posted_on": "2026-01-15",
                                       "description": "Payroll" } ] }
                    ],
                    "token-c": [
                        { "added": [ { "external_id": "c1", "amount_minor": -9000,
                                       "currency": "USD", "posted_on": "2026-01-16",
                                       "description": "Invoice" } ] }
                    ]
                }
            }
            "#,
        )?;

        let report = sync_all_connections(&db, &feed).await?;
        assert_eq!(report.connections_processed, 3);
        assert_eq!(report.connections_succeeded, 2);
        assert_eq!(report.connections_failed, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].connection_id, "conn-b");

        // Survivors advanced; the failure was recorded without moving the
        // broken connection's cursor.
        for id in [&conn_a.id, &conn_c.id] {
            let conn = crate::core::connection::get_connection(&db, id)
                .await?
                .unwrap();
            assert_eq!(conn.cursor.as_deref(), Some("1"));
            assert!(conn.last_error.is_none());
        }
        let broken = crate::core::connection::get_connection(&db, "conn-b")
            .await?
            .unwrap();
        assert_eq!(broken.cursor, None);
        assert!(broken.last_error.is_some());

        Ok(())
    }

    #[tokio::test]
    async fn test_sync_single_connection() -> Result<()> {
        let db = setup_test_db().await?;
        create_custom_connection(&db, "conn-a", "user-1", "token-a").await?;
        create_custom_connection(&db, "conn-b", "user-2", "token-b").await?;

        let feed = ScriptedFeed::new(vec![script_page(
            vec![feed_tx("t1", -25000)],
            vec![],
            vec![],
        )]);

        let report = sync_single_connection(&db, &feed, "conn-a").await?;
        assert_eq!(report.connections_processed, 1);
        assert_eq!(report.connections_succeeded, 1);

        // Only the requested connection moved
        let untouched = crate::core::connection::get_connection(&db, "conn-b")
            .await?
            .unwrap();
        assert_eq!(untouched.cursor, None);

        let result = sync_single_connection(&db, &feed, "missing").await;
        assert!(matches!(
            result.unwrap_err(),
            Error::ConnectionNotFound { id: _ }
        ));

        Ok(())
    }

    #[tokio::test]
    async fn test_page_limit_bounds_a_run() -> Result<()> {
        let (db, connection) = setup_with_connection().await?;

        // More pages than the per-run limit; every page reports has_more
        let pages: Vec<ScriptPage> = (0..MAX_PAGES_PER_RUN + 5)
            .map(|i| {
                script_page(
                    vec![feed_tx(&format!("t{i}"), -100)],
                    vec![],
                    vec![],
                )
            })
            .collect();
        let feed = ScriptedFeed::new(pages);

        let stats = sync_connection(&db, &feed, &connection).await?;
        assert_eq!(stats.pages, MAX_PAGES_PER_RUN);
        assert_eq!(stats.added, MAX_PAGES_PER_RUN);

        // The cursor parked mid-history; the next run picks up the rest
        let conn = crate::core::connection::get_connection(&db, &connection.id)
            .await?
            .unwrap();
        let stats = sync_connection(&db, &feed, &conn).await?;
        assert_eq!(stats.added, 5);

        Ok(())
    }

    #[tokio::test]
    async fn test_end_to_end_sync_then_allocate() -> Result<()> {
        // The full path: null cursor, one upstream credit of $250, rules
        // 25/10/35/30, automatic allocation.
        let (db, connection) = setup_with_connection().await?;
        let taxes = create_test_rule(&db, "Taxes", 25.0).await?;
        let profit = create_test_rule(&db, "Profit", 10.0).await?;
        let owner_pay = create_test_rule(&db, "Owner Pay", 35.0).await?;
        let opex = create_test_rule(&db, "Opex", 30.0).await?;

        let feed = ScriptedFeed::new(vec![script_page(
            vec![feed_tx("t1", -25000)],
            vec![],
            vec![],
        )]);

        let report = sync_and_allocate(&db, &feed, true).await?;
        assert_eq!(report.sync.added, 1);
        assert_eq!(report.allocations_created, 1);
        assert_eq!(report.allocation_failures, 0);

        let row = get_transaction_by_external_id(&db, "t1").await?.unwrap();
        assert_eq!(row.amount_minor, 25000);
        let conn = crate::core::connection::get_connection(&db, &connection.id)
            .await?
            .unwrap();
        assert_eq!(conn.cursor.as_deref(), Some("1"));

        for (rule, expected) in [
            (&taxes, 6250),
            (&profit, 2500),
            (&owner_pay, 8750),
            (&opex, 7500),
        ] {
            assert_eq!(
                get_bucket(&db, rule.id).await?.unwrap().balance_minor,
                expected
            );
        }

        Ok(())
    }

    #[tokio::test]
    async fn test_auto_allocate_skips_outflows() -> Result<()> {
        let (db, _connection) = setup_with_connection().await?;
        let taxes = create_test_rule(&db, "Taxes", 25.0).await?;

        // One credit, one debit (upstream convention: debit is positive)
        let feed = ScriptedFeed::new(vec![script_page(
            vec![feed_tx("t1", -25000), feed_tx("t2", 9900)],
            vec![],
            vec![],
        )]);

        let report = sync_and_allocate(&db, &feed, true).await?;
        assert_eq!(report.sync.added, 2);
        assert_eq!(report.allocations_created, 1);
        assert_eq!(report.allocations_skipped, 1);
        assert_eq!(report.allocation_failures, 0);

        // Only the credit reached the bucket
        assert_eq!(get_bucket(&db, taxes.id).await?.unwrap().balance_minor, 6250);
        assert_eq!(crate::entities::Allocation::find().all(&db).await?.len(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_auto_allocate_switch_off() -> Result<()> {
        let (db, _connection) = setup_with_connection().await?;
        create_test_rule(&db, "Taxes", 25.0).await?;

        let feed = ScriptedFeed::new(vec![script_page(
            vec![feed_tx("t1", -25000)],
            vec![],
            vec![],
        )]);

        let report = sync_and_allocate(&db, &feed, false).await?;
        assert_eq!(report.sync.added, 1);
        assert_eq!(report.allocations_created, 0);
        assert_eq!(report.allocations_skipped, 0);
        assert!(crate::entities::Allocation::find().all(&db).await?.is_empty());

        Ok(())
    }
}
