//! Core business logic - framework-agnostic ingestion and allocation.
//!
//! Everything here takes the database connection (and, for the sync loop,
//! the feed) as explicit parameters; there is no ambient client state.

/// Allocation engine: split planning and durable allocation records
pub mod allocation;
/// Bounded, atomic batching of ledger writes
pub mod batch;
/// Running balances for hold-type rules
pub mod bucket;
/// Linked account-feed connections and their cursors
pub mod connection;
/// Reconciliation of feed data into the transaction store
pub mod ledger;
/// Allocation rule CRUD and seeding
pub mod rule;
/// The transaction ingestion loop and sweep reports
pub mod sync;
