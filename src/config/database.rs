//! Database configuration module for `FlowSplit`.
//!
//! Handles `SQLite` connection and table creation using `SeaORM`. Tables
//! are generated straight from the entity definitions with
//! `Schema::create_table_from_entity`, so the database schema always
//! matches the Rust structs without hand-written SQL.

use crate::entities::{
    Allocation, AllocationOutput, AllocationRule, Bucket, Connection, Transaction,
};
use crate::errors::Result;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Schema};

const DEFAULT_DATABASE_URL: &str = "sqlite://data/flowsplit.sqlite?mode=rwc";

/// Gets the database URL from the `DATABASE_URL` environment variable or
/// falls back to a local `SQLite` file.
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

/// Establishes a connection to the database named by `DATABASE_URL`.
pub async fn create_connection() -> Result<DatabaseConnection> {
    Database::connect(get_database_url())
        .await
        .map_err(Into::into)
}

/// Creates all tables from the entity definitions, skipping any that
/// already exist so startup is safe to repeat.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let mut statements = vec![
        schema.create_table_from_entity(Connection),
        schema.create_table_from_entity(Transaction),
        schema.create_table_from_entity(AllocationRule),
        schema.create_table_from_entity(Bucket),
        schema.create_table_from_entity(Allocation),
        schema.create_table_from_entity(AllocationOutput),
    ];

    for statement in &mut statements {
        statement.if_not_exists();
        db.execute(builder.build(statement)).await?;
    }

    Ok(())
}
