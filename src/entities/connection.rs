//! Connection entity - Represents one linked upstream account-feed connection.
//!
//! Each connection carries the opaque access token used to talk to the
//! upstream feed and the pagination cursor recording how far ingestion has
//! progressed. The cursor is only ever advanced by the sync loop, and only
//! after the page it came with has been durably written.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Connection database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "connections")]
pub struct Model {
    /// Unique identifier assigned when the user completed the link flow
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// User who owns this connection
    pub user_id: String,
    /// Opaque credential for the upstream feed. Secret - never logged.
    #[serde(skip_serializing)]
    pub access_token: String,
    /// Opaque pagination cursor; None means no sync has been performed yet
    pub cursor: Option<String>,
    /// When the last successful sync finished
    pub last_synced_at: Option<DateTimeUtc>,
    /// Message from the most recent failed sync, cleared on success
    pub last_error: Option<String>,
    /// When the most recent failed sync happened
    pub last_error_at: Option<DateTimeUtc>,
}

/// Defines relationships between Connection and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One connection has many ledger transactions
    #[sea_orm(has_many = "super::transaction::Entity")]
    Transactions,
}

impl Related<super::transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
