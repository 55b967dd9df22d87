//! Shared test utilities for `FlowSplit`.
//!
//! Common helpers for setting up test databases, creating entities with
//! sensible defaults, and scripting the upstream feed.

use crate::{
    core::{connection, ledger, rule},
    entities::{self, DestinationKind},
    errors::Result,
    feed::{FeedError, FeedPage, FeedTransaction, TransactionFeed},
};
use chrono::NaiveDate;
use sea_orm::DatabaseConnection;

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Creates a test connection owned by `user-1` with token `token-1`.
pub async fn create_test_connection(
    db: &DatabaseConnection,
    id: &str,
) -> Result<entities::connection::Model> {
    connection::create_connection(db, id.to_string(), "user-1".to_string(), "token-1".to_string())
        .await
}

/// Creates a test connection with custom owner and token.
pub async fn create_custom_connection(
    db: &DatabaseConnection,
    id: &str,
    user_id: &str,
    access_token: &str,
) -> Result<entities::connection::Model> {
    connection::create_connection(
        db,
        id.to_string(),
        user_id.to_string(),
        access_token.to_string(),
    )
    .await
}

/// Sets up a complete test environment with one connection.
/// Returns (db, connection) for common test scenarios.
pub async fn setup_with_connection()
-> Result<(DatabaseConnection, entities::connection::Model)> {
    let db = setup_test_db().await?;
    let conn = create_test_connection(&db, "conn-1").await?;
    Ok((db, conn))
}

/// Creates a hold-type rule for `user-1`.
pub async fn create_test_rule(
    db: &DatabaseConnection,
    name: &str,
    percentage: f64,
) -> Result<entities::allocation_rule::Model> {
    rule::create_rule(
        db,
        "user-1".to_string(),
        name.to_string(),
        percentage,
        DestinationKind::Hold,
        None,
    )
    .await
}

/// Creates a rule with custom owner and destination.
pub async fn create_custom_rule(
    db: &DatabaseConnection,
    user_id: &str,
    name: &str,
    percentage: f64,
    destination: DestinationKind,
    destination_id: Option<String>,
) -> Result<entities::allocation_rule::Model> {
    rule::create_rule(
        db,
        user_id.to_string(),
        name.to_string(),
        percentage,
        destination,
        destination_id,
    )
    .await
}

/// Builds an incoming ledger record for a connection, already in the
/// internal sign convention (positive = inflow).
pub fn incoming_tx(
    connection: &entities::connection::Model,
    external_id: &str,
    amount_minor: i64,
) -> ledger::IncomingTransaction {
    ledger::IncomingTransaction {
        external_id: external_id.to_string(),
        connection_id: connection.id.clone(),
        user_id: connection.user_id.clone(),
        amount_minor,
        currency: "USD".to_string(),
        posted_on: NaiveDate::from_ymd_opt(2026, 1, 15).expect("valid date"),
        description: "Test transaction".to_string(),
    }
}

/// Inserts a ledger row directly, bypassing the sync loop.
pub async fn create_test_transaction(
    db: &DatabaseConnection,
    connection: &entities::connection::Model,
    external_id: &str,
    amount_minor: i64,
) -> Result<entities::transaction::Model> {
    let outcome =
        ledger::upsert_transaction(db, &incoming_tx(connection, external_id, amount_minor)).await?;
    Ok(match outcome {
        ledger::UpsertOutcome::Inserted(model) | ledger::UpsertOutcome::Updated(model) => model,
    })
}

/// Builds a feed transaction in the upstream sign convention
/// (negative = credit/inflow).
pub fn feed_tx(external_id: &str, amount_minor: i64) -> FeedTransaction {
    FeedTransaction {
        external_id: external_id.to_string(),
        amount_minor,
        currency: "USD".to_string(),
        posted_on: NaiveDate::from_ymd_opt(2026, 1, 15).expect("valid date"),
        description: "Test feed transaction".to_string(),
    }
}

/// One scripted feed page for [`ScriptedFeed`].
#[derive(Debug, Clone, Default)]
pub struct ScriptPage {
    /// Transactions reported as added
    pub added: Vec<FeedTransaction>,
    /// Transactions reported as modified
    pub modified: Vec<FeedTransaction>,
    /// External ids reported as removed
    pub removed: Vec<String>,
}

/// Builds a [`ScriptPage`].
pub fn script_page(
    added: Vec<FeedTransaction>,
    modified: Vec<FeedTransaction>,
    removed: Vec<String>,
) -> ScriptPage {
    ScriptPage {
        added,
        modified,
        removed,
    }
}

/// A scripted in-memory feed serving the same page sequence to every
/// access token, with optional failure injection.
///
/// Cursors are page indexes rendered as strings, so re-fetching with an
/// old cursor replays the same page.
#[derive(Debug)]
pub struct ScriptedFeed {
    pages: Vec<ScriptPage>,
    fail_from: Option<usize>,
}

impl ScriptedFeed {
    /// Creates a feed serving `pages` in order.
    pub fn new(pages: Vec<ScriptPage>) -> Self {
        Self {
            pages,
            fail_from: None,
        }
    }

    /// Makes every fetch of page `index` or later fail.
    pub fn failing_from_page(mut self, index: usize) -> Self {
        self.fail_from = Some(index);
        self
    }
}

impl TransactionFeed for ScriptedFeed {
    async fn fetch_page(
        &self,
        _access_token: &str,
        cursor: Option<&str>,
    ) -> std::result::Result<FeedPage, FeedError> {
        let consumed: usize = match cursor {
            None => 0,
            Some(c) => c
                .parse()
                .map_err(|_| FeedError(format!("malformed scripted cursor '{c}'")))?,
        };

        if let Some(fail_from) = self.fail_from {
            if consumed >= fail_from {
                return Err(FeedError("injected feed failure".to_string()));
            }
        }

        if consumed >= self.pages.len() {
            return Ok(FeedPage {
                added: Vec::new(),
                modified: Vec::new(),
                removed: Vec::new(),
                next_cursor: consumed.to_string(),
                has_more: false,
            });
        }

        let page = &self.pages[consumed];
        Ok(FeedPage {
            added: page.added.clone(),
            modified: page.modified.clone(),
            removed: page.removed.clone(),
            next_cursor: (consumed + 1).to_string(),
            has_more: consumed + 1 < self.pages.len(),
        })
    }
}
