//! Ledger business logic - Reconciles upstream feed data into the transaction store.
//!
//! The single write path is an upsert keyed on the upstream `external_id`,
//! so replaying a feed page any number of times leaves exactly one row per
//! id. Merges preserve `first_seen_at` (first time wins) and always refresh
//! `updated_at`. Upstream removals tombstone the row rather than deleting
//! it, keeping history intact for audit and reporting.

use crate::{
    entities::{Transaction, TxStatus, transaction},
    errors::Result,
};
use chrono::{NaiveDate, Utc};
use sea_orm::{QueryOrder, Set, prelude::*};

/// A transaction arriving from the feed boundary, already converted to the
/// internal sign convention (positive = inflow).
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingTransaction {
    /// Stable upstream identifier
    pub external_id: String,
    /// Connection the transaction was observed on
    pub connection_id: String,
    /// User owning the connection
    pub user_id: String,
    /// Signed amount in currency minor units, internal convention
    pub amount_minor: i64,
    /// ISO 4217 currency code
    pub currency: String,
    /// Date the transaction occurred
    pub posted_on: NaiveDate,
    /// Human-readable description
    pub description: String,
}

/// What an upsert did with the incoming record.
#[derive(Debug, Clone, PartialEq)]
pub enum UpsertOutcome {
    /// No row existed for the external id; a new one was created
    Inserted(transaction::Model),
    /// An existing row was merged in place
    Updated(transaction::Model),
}

/// Merges an incoming transaction into the ledger, keyed on `external_id`.
///
/// On first sight the row is created with `first_seen_at = now`. On every
/// later merge the mutable fields (amount, currency, date, description) are
/// refreshed, the row is revived to active (upstream modifying a
/// transaction supersedes an earlier removal), `first_seen_at` is left
/// alone, and `updated_at` is stamped.
pub async fn upsert_transaction<C>(db: &C, incoming: &IncomingTransaction) -> Result<UpsertOutcome>
where
    C: ConnectionTrait,
{
    let now = Utc::now();

    let existing = Transaction::find()
        .filter(transaction::Column::ExternalId.eq(incoming.external_id.as_str()))
        .one(db)
        .await?;

    match existing {
        Some(row) => {
            let mut active: transaction::ActiveModel = row.into();
            active.amount_minor = Set(incoming.amount_minor);
            active.currency = Set(incoming.currency.clone());
            active.posted_on = Set(incoming.posted_on);
            active.description = Set(incoming.description.clone());
            active.status = Set(TxStatus::Active);
            active.updated_at = Set(now);
            let updated = active.update(db).await?;
            Ok(UpsertOutcome::Updated(updated))
        }
        None => {
            let inserted = transaction::ActiveModel {
                external_id: Set(incoming.external_id.clone()),
                connection_id: Set(incoming.connection_id.clone()),
                user_id: Set(incoming.user_id.clone()),
                amount_minor: Set(incoming.amount_minor),
                currency: Set(incoming.currency.clone()),
                posted_on: Set(incoming.posted_on),
                description: Set(incoming.description.clone()),
                status: Set(TxStatus::Active),
                first_seen_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            }
            .insert(db)
            .await?;
            Ok(UpsertOutcome::Inserted(inserted))
        }
    }
}

/// Tombstones the row for an upstream-removed transaction.
///
/// Returns the tombstoned row, or None when no row exists for the id - a
/// feed may report removals for transactions this store never saw (or a
/// replayed page may tombstone twice), and both are tolerated.
pub async fn tombstone_transaction<C>(
    db: &C,
    external_id: &str,
) -> Result<Option<transaction::Model>>
where
    C: ConnectionTrait,
{
    let existing = Transaction::find()
        .filter(transaction::Column::ExternalId.eq(external_id))
        .one(db)
        .await?;

    let Some(row) = existing else {
        return Ok(None);
    };

    if row.status == TxStatus::Removed {
        return Ok(Some(row));
    }

    let mut active: transaction::ActiveModel = row.into();
    active.status = Set(TxStatus::Removed);
    active.updated_at = Set(Utc::now());
    let updated = active.update(db).await?;
    Ok(Some(updated))
}

/// Finds a ledger row by its upstream id, tombstoned or not.
pub async fn get_transaction_by_external_id(
    db: &DatabaseConnection,
    external_id: &str,
) -> Result<Option<transaction::Model>> {
    Transaction::find()
        .filter(transaction::Column::ExternalId.eq(external_id))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Lists a user's live (non-tombstoned) transactions, newest first.
pub async fn list_active_transactions_for_user(
    db: &DatabaseConnection,
    user_id: &str,
) -> Result<Vec<transaction::Model>> {
    Transaction::find()
        .filter(transaction::Column::UserId.eq(user_id))
        .filter(transaction::Column::Status.eq(TxStatus::Active))
        .order_by_desc(transaction::Column::PostedOn)
        .order_by_desc(transaction::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}
