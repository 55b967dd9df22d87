//! Bucket entity - Running balance for a hold-type allocation rule.
//!
//! A bucket's id equals the id of the rule that feeds it. Balances are only
//! ever adjusted through atomic increments issued by the allocation engine;
//! there is no operation for assigning a balance directly.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Bucket database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "buckets")]
pub struct Model {
    /// Bucket id, equal to the hold rule's id
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i64,
    /// Display name, copied from the rule when the bucket is first created
    pub name: String,
    /// Current balance in currency minor units
    pub balance_minor: i64,
}

/// Buckets have no foreign-key relations; the rule linkage is by shared id
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
