//! Allocation entity - Immutable record of one income transaction's split.
//!
//! `source_transaction_id` is unique: at most one allocation can ever exist
//! per ledger transaction, which is the structural idempotency guarantee the
//! allocation engine leans on. The per-rule breakdown lives in
//! [`super::allocation_output`].

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Allocation database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "allocations")]
pub struct Model {
    /// Unique identifier for the allocation record
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Ledger transaction this allocation distributed; unique so a source
    /// can never be split twice
    #[sea_orm(unique)]
    pub source_transaction_id: i64,
    /// User whose rules produced this split
    pub user_id: String,
    /// Income base that was distributed, in currency minor units
    pub total_minor: i64,
    /// ISO 4217 currency code of the source transaction
    pub currency: String,
    /// When the split was executed
    pub executed_at: DateTimeUtc,
}

/// Defines relationships between Allocation and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One allocation has one output per participating rule
    #[sea_orm(has_many = "super::allocation_output::Entity")]
    Outputs,
    /// Each allocation distributes exactly one ledger transaction
    #[sea_orm(
        belongs_to = "super::transaction::Entity",
        from = "Column::SourceTransactionId",
        to = "super::transaction::Column::Id"
    )]
    SourceTransaction,
}

impl Related<super::allocation_output::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Outputs.def()
    }
}

impl Related<super::transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SourceTransaction.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
