//! Allocation engine - Distributes income transactions across a user's rules.
//!
//! The split itself is a pure computation ([`plan_split`]): percentages are
//! applied to the income base in currency minor units, normalized when the
//! rule set is oversubscribed, and rounded to the nearest unit. The durable
//! operation ([`allocate_transaction`]) runs inside a single database
//! transaction so the allocation record, its outputs, and the hold-bucket
//! balance increments commit or roll back together.
//!
//! A source transaction can be allocated at most once. Besides the
//! advisory pre-check, the unique index on `source_transaction_id` closes
//! the check-then-act window: a racing duplicate insert fails at the store
//! and surfaces as a retryable database error, never as a second record.

use crate::{
    core::bucket,
    entities::{
        Allocation, AllocationRule, DestinationKind, TxStatus, allocation, allocation_output,
        allocation_rule, transaction,
    },
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};

/// One rule's planned share of an income transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedOutput {
    /// Rule that produced this share
    pub rule_id: i64,
    /// Rule name at planning time
    pub rule_name: String,
    /// Rule percentage at planning time, before any normalization
    pub percentage: f64,
    /// Share of the income base, in currency minor units
    pub amount_minor: i64,
    /// Destination kind at planning time
    pub destination: DestinationKind,
    /// Destination id at planning time; None for hold buckets
    pub destination_id: Option<String>,
}

/// Result of attempting to allocate one transaction.
///
/// The three skip variants are benign "nothing to do" states; hard
/// failures are `Err` on the operation itself.
#[derive(Debug, Clone, PartialEq)]
pub enum AllocationOutcome {
    /// A new allocation record was written
    Allocated {
        /// The persisted record
        record: allocation::Model,
        /// Its outputs, in rule order
        outputs: Vec<allocation_output::Model>,
    },
    /// An allocation already exists for this source transaction
    AlreadyAllocated,
    /// The owner has no rule with a positive percentage
    NoActiveRules,
    /// The transaction is not an inflow; outflows are never distributed
    NotAnInflow,
}

/// Computes each rule's share of `base_minor`.
///
/// Rules with a zero percentage are skipped. When the remaining percentages
/// sum above 100 every share is scaled by `100 / sum`, so the distributed
/// total stays within the base even for oversubscribed rule sets. Shares
/// round to the nearest minor unit (half away from zero); outputs that
/// round to zero are dropped.
pub fn plan_split(base_minor: i64, rules: &[allocation_rule::Model]) -> Vec<PlannedOutput> {
    if base_minor <= 0 {
        return Vec::new();
    }

    let active: Vec<&allocation_rule::Model> =
        rules.iter().filter(|r| r.percentage > 0.0).collect();
    if active.is_empty() {
        return Vec::new();
    }

    let pct_sum: f64 = active.iter().map(|r| r.percentage).sum();
    let factor = if pct_sum > 100.0 { 100.0 / pct_sum } else { 1.0 };

    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    let mut outputs: Vec<PlannedOutput> = active
        .iter()
        .map(|rule| PlannedOutput {
            rule_id: rule.id,
            rule_name: rule.name.clone(),
            percentage: rule.percentage,
            amount_minor: ((base_minor as f64) * (rule.percentage / 100.0) * factor).round()
                as i64,
            destination: rule.destination,
            destination_id: rule.destination_id.clone(),
        })
        .filter(|output| output.amount_minor > 0)
        .collect();

    // Nearest-unit rounding can overshoot the base by a few minor units
    // when many shares round up. Claw the excess back from the largest
    // shares so the distributed total never exceeds the income base.
    let mut excess = outputs.iter().map(|o| o.amount_minor).sum::<i64>() - base_minor;
    while excess > 0 {
        let Some(largest) = outputs.iter_mut().max_by_key(|o| o.amount_minor) else {
            break;
        };
        let take = excess.min(largest.amount_minor);
        largest.amount_minor -= take;
        excess -= take;
    }
    outputs.retain(|o| o.amount_minor > 0);

    outputs
}

/// Returns the allocation record for a source transaction, if one exists.
pub async fn get_allocation_for_transaction<C>(
    db: &C,
    source_transaction_id: i64,
) -> Result<Option<allocation::Model>>
where
    C: ConnectionTrait,
{
    Allocation::find()
        .filter(allocation::Column::SourceTransactionId.eq(source_transaction_id))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Lists an allocation's outputs in rule order.
pub async fn get_allocation_outputs(
    db: &DatabaseConnection,
    allocation_id: i64,
) -> Result<Vec<allocation_output::Model>> {
    crate::entities::AllocationOutput::find()
        .filter(allocation_output::Column::AllocationId.eq(allocation_id))
        .order_by_asc(allocation_output::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Distributes one income transaction across its owner's rules, exactly once.
///
/// Record creation, output rows, and hold-bucket increments share one
/// database transaction. Payout and external destinations are recorded but
/// move no money here; the record is the authoritative statement of what
/// should move where.
pub async fn allocate_transaction(
    db: &DatabaseConnection,
    transaction_id: i64,
) -> Result<AllocationOutcome> {
    let txn = db.begin().await?;

    let source = transaction::Entity::find_by_id(transaction_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::TransactionNotFound {
            id: transaction_id.to_string(),
        })?;

    // A tombstoned row is no longer allocatable
    if source.status == TxStatus::Removed {
        return Err(Error::TransactionNotFound {
            id: transaction_id.to_string(),
        });
    }

    if source.amount_minor <= 0 {
        return Ok(AllocationOutcome::NotAnInflow);
    }

    if get_allocation_for_transaction(&txn, source.id)
        .await?
        .is_some()
    {
        return Ok(AllocationOutcome::AlreadyAllocated);
    }

    let rules = AllocationRule::find()
        .filter(allocation_rule::Column::UserId.eq(source.user_id.as_str()))
        .filter(allocation_rule::Column::IsDeleted.eq(false))
        .order_by_asc(allocation_rule::Column::Id)
        .all(&txn)
        .await?;

    let planned = plan_split(source.amount_minor, &rules);
    if planned.is_empty() {
        return Ok(AllocationOutcome::NoActiveRules);
    }

    let record = allocation::ActiveModel {
        source_transaction_id: Set(source.id),
        user_id: Set(source.user_id.clone()),
        total_minor: Set(source.amount_minor),
        currency: Set(source.currency.clone()),
        executed_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let mut outputs = Vec::with_capacity(planned.len());
    for output in planned {
        let row = allocation_output::ActiveModel {
            allocation_id: Set(record.id),
            rule_id: Set(output.rule_id),
            rule_name: Set(output.rule_name.clone()),
            percentage: Set(output.percentage),
            amount_minor: Set(output.amount_minor),
            destination: Set(output.destination),
            destination_id: Set(output.destination_id.clone()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        if output.destination == DestinationKind::Hold {
            bucket::get_or_create_bucket(&txn, output.rule_id, &output.rule_name).await?;
            bucket::increment_bucket_balance(&txn, output.rule_id, output.amount_minor).await?;
        }

        outputs.push(row);
    }

    txn.commit().await?;

    Ok(AllocationOutcome::Allocated { record, outputs })
}

/// Manual-trigger convenience: allocates a transaction referenced by its
/// upstream id.
pub async fn allocate_by_external_id(
    db: &DatabaseConnection,
    external_id: &str,
) -> Result<AllocationOutcome> {
    let source = crate::core::ledger::get_transaction_by_external_id(db, external_id)
        .await?
        .ok_or_else(|| Error::TransactionNotFound {
            id: external_id.to_string(),
        })?;
    allocate_transaction(db, source.id).await
}
