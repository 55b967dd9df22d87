//! Transaction entity - Represents a single ledger entry observed on a connection.
//!
//! Rows are created and merged exclusively by the sync loop. The upstream
//! `external_id` is unique across the whole store, so replaying a feed page
//! can never duplicate a row. Amounts are stored in currency minor units
//! with the internal sign convention: positive = inflow.
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a ledger transaction.
///
/// Upstream removals tombstone the row instead of deleting it, so audit
/// history survives. Queries exclude tombstones by matching on this state.
#[derive(Copy, Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    /// Live entry, visible to reporting and allocation
    #[sea_orm(string_value = "active")]
    Active,
    /// Tombstoned after the upstream feed reported it removed
    #[sea_orm(string_value = "removed")]
    Removed,
}

/// Transaction database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    /// Unique identifier for the ledger row
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Stable upstream identifier, the deduplication key
    #[sea_orm(unique)]
    pub external_id: String,
    /// Connection this transaction was observed on
    pub connection_id: String,
    /// User who owns the connection
    pub user_id: String,
    /// Signed amount in currency minor units (positive = inflow)
    pub amount_minor: i64,
    /// ISO 4217 currency code (e.g., "USD")
    pub currency: String,
    /// Date the transaction occurred
    pub posted_on: Date,
    /// Human-readable description from the upstream feed
    pub description: String,
    /// Live or tombstoned
    pub status: TxStatus,
    /// When this row was first created; never touched by later merges
    pub first_seen_at: DateTimeUtc,
    /// When this row was last merged or tombstoned
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Transaction and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each transaction belongs to one connection
    #[sea_orm(
        belongs_to = "super::connection::Entity",
        from = "Column::ConnectionId",
        to = "super::connection::Column::Id"
    )]
    Connection,
}

impl Related<super::connection::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Connection.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
