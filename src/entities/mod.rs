//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod allocation;
pub mod allocation_output;
pub mod allocation_rule;
pub mod bucket;
pub mod connection;
pub mod transaction;

// Re-export specific types to avoid conflicts
pub use allocation::{Column as AllocationColumn, Entity as Allocation, Model as AllocationModel};
pub use allocation_output::{
    Column as AllocationOutputColumn, Entity as AllocationOutput, Model as AllocationOutputModel,
};
pub use allocation_rule::{
    Column as AllocationRuleColumn, DestinationKind, Entity as AllocationRule,
    Model as AllocationRuleModel,
};
pub use bucket::{Column as BucketColumn, Entity as Bucket, Model as BucketModel};
pub use connection::{Column as ConnectionColumn, Entity as Connection, Model as ConnectionModel};
pub use transaction::{
    Column as TransactionColumn, Entity as Transaction, Model as TransactionModel, TxStatus,
};
