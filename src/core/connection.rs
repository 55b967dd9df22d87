//! Connection business logic - Manages linked account-feed connections.
//!
//! Provides lookups used by the sync sweep plus the two mutations the sync
//! loop is allowed to make: advancing the cursor after a durably written
//! page, and recording a failed run on the connection without touching its
//! cursor. Connections themselves are created when a user completes the
//! link flow (or from seed configuration for local operation).

use crate::{
    config::app::ConnectionConfig,
    entities::{Connection, connection},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{QueryOrder, Set, prelude::*};

/// Retrieves every known connection, ordered by id for a stable sweep order.
pub async fn get_all_connections(db: &DatabaseConnection) -> Result<Vec<connection::Model>> {
    Connection::find()
        .order_by_asc(connection::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Finds a connection by its id, returning None if it does not exist.
pub async fn get_connection(
    db: &DatabaseConnection,
    id: &str,
) -> Result<Option<connection::Model>> {
    Connection::find_by_id(id).one(db).await.map_err(Into::into)
}

/// Creates a new connection with an empty cursor (never synced).
pub async fn create_connection(
    db: &DatabaseConnection,
    id: String,
    user_id: String,
    access_token: String,
) -> Result<connection::Model> {
    if id.trim().is_empty() {
        return Err(Error::Config {
            message: "Connection id cannot be empty".to_string(),
        });
    }
    if access_token.trim().is_empty() {
        return Err(Error::Config {
            message: "Connection access token cannot be empty".to_string(),
        });
    }

    let connection = connection::ActiveModel {
        id: Set(id),
        user_id: Set(user_id),
        access_token: Set(access_token),
        cursor: Set(None),
        last_synced_at: Set(None),
        last_error: Set(None),
        last_error_at: Set(None),
    };

    let result = connection.insert(db).await?;
    Ok(result)
}

/// Persists the cursor returned with a fully written feed page.
///
/// Also stamps `last_synced_at` and clears any recorded error. Must only be
/// called after the page's ledger writes have committed; the sync loop's
/// crash-safety rests on that ordering.
pub async fn advance_cursor(db: &DatabaseConnection, id: &str, cursor: &str) -> Result<()> {
    let connection =
        Connection::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| Error::ConnectionNotFound {
                id: id.to_string(),
            })?;

    let mut active: connection::ActiveModel = connection.into();
    active.cursor = Set(Some(cursor.to_string()));
    active.last_synced_at = Set(Some(Utc::now()));
    active.last_error = Set(None);
    active.last_error_at = Set(None);
    active.update(db).await?;

    Ok(())
}

/// Records a failed sync on the connection, leaving its cursor untouched.
///
/// The next sweep retries from the old cursor.
pub async fn record_sync_error(db: &DatabaseConnection, id: &str, message: &str) -> Result<()> {
    let connection =
        Connection::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| Error::ConnectionNotFound {
                id: id.to_string(),
            })?;

    let mut active: connection::ActiveModel = connection.into();
    active.last_error = Set(Some(message.to_string()));
    active.last_error_at = Set(Some(Utc::now()));
    active.update(db).await?;

    Ok(())
}

/// Creates any configured connections that do not exist yet.
///
/// Existing connections are left untouched (their cursor and credentials
/// are live state). Returns how many connections were created.
pub async fn seed_connections(
    db: &DatabaseConnection,
    configs: &[ConnectionConfig],
) -> Result<usize> {
    let mut created = 0;
    for config in configs {
        if get_connection(db, &config.id).await?.is_none() {
            create_connection(
                db,
                config.id.clone(),
                config.user_id.clone(),
                config.access_token.clone(),
            )
            .await?;
            created += 1;
        }
    }
    Ok(created)
}
