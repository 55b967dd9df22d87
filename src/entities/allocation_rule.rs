//! Allocation rule entity - A named percentage-based destination for income.
//!
//! Rules are user-edited and soft-deleted, so historical allocation records
//! can keep referring to a rule that no longer accepts new splits. The rule
//! set of a user is not required to sum to 100; the allocation engine
//! normalizes at split time when the sum exceeds 100.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Where an allocated amount is destined.
#[derive(Copy, Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum DestinationKind {
    /// Internal hold bucket, keyed by the rule id itself
    #[sea_orm(string_value = "hold")]
    Hold,
    /// Connected payout account (recorded only; movement is external)
    #[sea_orm(string_value = "payout")]
    Payout,
    /// External bank account (recorded only; movement is external)
    #[sea_orm(string_value = "external")]
    External,
}

/// Allocation rule database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "allocation_rules")]
pub struct Model {
    /// Unique identifier for the rule
    #[sea_orm(primary_key)]
    pub id: i64,
    /// User who owns this rule
    pub user_id: String,
    /// Display name (e.g., "Taxes", "Owner Pay")
    pub name: String,
    /// Percentage of each income transaction routed here (0-100, fractional allowed)
    pub percentage: f64,
    /// What kind of destination this rule pays into
    pub destination: DestinationKind,
    /// Opaque destination id for payout/external rules; None for hold rules,
    /// whose bucket is keyed by the rule id
    pub destination_id: Option<String>,
    /// Soft delete flag - deleted rules are skipped by new allocations but
    /// keep historical records intact
    pub is_deleted: bool,
}

/// Defines relationships between `AllocationRule` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One rule appears in many allocation outputs
    #[sea_orm(has_many = "super::allocation_output::Entity")]
    Outputs,
}

impl Related<super::allocation_output::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Outputs.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
