//! Bucket business logic - Running balances for hold-type allocation rules.
//!
//! Balances move only through [`increment_bucket_balance`], which issues a
//! single atomic SQL update (`balance_minor = balance_minor + delta`)
//! instead of a read-modify-write, so two allocations crediting the same
//! bucket concurrently cannot lose an increment. There is deliberately no
//! operation for setting a balance outright.

use crate::{
    entities::{Bucket, bucket},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, prelude::*};

/// Finds a bucket by its id (= the hold rule's id).
pub async fn get_bucket<C>(db: &C, id: i64) -> Result<Option<bucket::Model>>
where
    C: ConnectionTrait,
{
    Bucket::find_by_id(id).one(db).await.map_err(Into::into)
}

/// Retrieves all buckets, ordered alphabetically by name.
pub async fn get_all_buckets(db: &DatabaseConnection) -> Result<Vec<bucket::Model>> {
    Bucket::find()
        .order_by_asc(bucket::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Returns the bucket for a hold rule, creating it with a zero balance on
/// first use.
pub async fn get_or_create_bucket<C>(db: &C, id: i64, name: &str) -> Result<bucket::Model>
where
    C: ConnectionTrait,
{
    if let Some(existing) = get_bucket(db, id).await? {
        return Ok(existing);
    }

    let bucket = bucket::ActiveModel {
        id: Set(id),
        name: Set(name.to_string()),
        balance_minor: Set(0),
    };

    let result = bucket.insert(db).await?;
    Ok(result)
}

/// Atomically adds `delta_minor` to a bucket's balance.
///
/// Uses a single SQL UPDATE (`balance_minor = balance_minor + delta`) so
/// concurrent increments compose instead of overwriting each other.
pub async fn increment_bucket_balance<C>(
    db: &C,
    id: i64,
    delta_minor: i64,
) -> Result<bucket::Model>
where
    C: ConnectionTrait,
{
    use sea_orm::sea_query::Expr;

    let _bucket = get_bucket(db, id)
        .await?
        .ok_or(Error::BucketNotFound { id })?;

    Bucket::update_many()
        .col_expr(
            bucket::Column::BalanceMinor,
            Expr::col(bucket::Column::BalanceMinor).add(delta_minor),
        )
        .filter(bucket::Column::Id.eq(id))
        .exec(db)
        .await?;

    get_bucket(db, id)
        .await?
        .ok_or(Error::BucketNotFound { id })
}
