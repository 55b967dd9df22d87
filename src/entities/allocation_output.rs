//! Allocation output entity - One rule's share of an allocation record.
//!
//! Rule name, percentage, and destination are snapshotted at execution time
//! so later rule edits or deletions never corrupt history. The percentage
//! stored is the rule's original one, pre-normalization, for transparency.
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::allocation_rule::DestinationKind;

/// Allocation output database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "allocation_outputs")]
pub struct Model {
    /// Unique identifier for the output row
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Allocation record this output belongs to
    pub allocation_id: i64,
    /// Rule that produced this output
    pub rule_id: i64,
    /// Rule name at execution time
    pub rule_name: String,
    /// Rule percentage at execution time, before any normalization
    pub percentage: f64,
    /// Amount routed to the destination, in currency minor units
    pub amount_minor: i64,
    /// Destination kind at execution time
    pub destination: DestinationKind,
    /// Destination id at execution time; None for hold buckets
    pub destination_id: Option<String>,
}

/// Defines relationships between `AllocationOutput` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each output belongs to one allocation record
    #[sea_orm(
        belongs_to = "super::allocation::Entity",
        from = "Column::AllocationId",
        to = "super::allocation::Column::Id"
    )]
    Allocation,
    /// Each output was produced by one rule
    #[sea_orm(
        belongs_to = "super::allocation_rule::Entity",
        from = "Column::RuleId",
        to = "super::allocation_rule::Column::Id"
    )]
    Rule,
}

impl Related<super::allocation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Allocation.def()
    }
}

impl Related<super::allocation_rule::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Rule.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
