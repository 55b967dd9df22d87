//! Allocation rule business logic - CRUD over percentage-based destinations.
//!
//! Rules are validated on the way in (finite percentage in 0-100, a
//! destination id exactly when the destination kind needs one) and soft
//! deleted on the way out, so allocation outputs written against a rule
//! stay resolvable forever. Nothing here requires a user's percentages to
//! sum to 100; the allocation engine normalizes oversubscribed rule sets
//! at split time.

use crate::{
    config::app::RuleConfig,
    entities::{AllocationRule, DestinationKind, allocation_rule},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, prelude::*};

/// Lists a user's live rules in creation order.
pub async fn list_active_rules<C>(db: &C, user_id: &str) -> Result<Vec<allocation_rule::Model>>
where
    C: ConnectionTrait,
{
    AllocationRule::find()
        .filter(allocation_rule::Column::UserId.eq(user_id))
        .filter(allocation_rule::Column::IsDeleted.eq(false))
        .order_by_asc(allocation_rule::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Finds a rule by id, deleted or not.
pub async fn get_rule_by_id(
    db: &DatabaseConnection,
    rule_id: i64,
) -> Result<Option<allocation_rule::Model>> {
    AllocationRule::find_by_id(rule_id)
        .one(db)
        .await
        .map_err(Into::into)
}

fn validate_percentage(percentage: f64) -> Result<()> {
    if !percentage.is_finite() || !(0.0..=100.0).contains(&percentage) {
        return Err(Error::InvalidPercentage { percentage });
    }
    Ok(())
}

fn validate_destination(
    destination: DestinationKind,
    destination_id: Option<&str>,
) -> Result<()> {
    match (destination, destination_id) {
        // Hold buckets are keyed by the rule id; an explicit id is a
        // configuration mistake.
        (DestinationKind::Hold, Some(_)) => Err(Error::Config {
            message: "Hold rules must not carry a destination id".to_string(),
        }),
        (DestinationKind::Payout | DestinationKind::External, None) => Err(Error::Config {
            message: "Payout and external rules require a destination id".to_string(),
        }),
        _ => Ok(()),
    }
}

/// Creates a new allocation rule after validating its inputs.
pub async fn create_rule(
    db: &DatabaseConnection,
    user_id: String,
    name: String,
    percentage: f64,
    destination: DestinationKind,
    destination_id: Option<String>,
) -> Result<allocation_rule::Model> {
    if name.trim().is_empty() {
        return Err(Error::Config {
            message: "Rule name cannot be empty".to_string(),
        });
    }
    validate_percentage(percentage)?;
    validate_destination(destination, destination_id.as_deref())?;

    let rule = allocation_rule::ActiveModel {
        user_id: Set(user_id),
        name: Set(name.trim().to_string()),
        percentage: Set(percentage),
        destination: Set(destination),
        destination_id: Set(destination_id),
        is_deleted: Set(false),
        ..Default::default()
    };

    let result = rule.insert(db).await?;
    Ok(result)
}

/// Changes a rule's percentage.
pub async fn update_rule_percentage(
    db: &DatabaseConnection,
    rule_id: i64,
    percentage: f64,
) -> Result<allocation_rule::Model> {
    validate_percentage(percentage)?;

    let rule = get_rule_by_id(db, rule_id)
        .await?
        .ok_or(Error::RuleNotFound { id: rule_id })?;

    let mut active: allocation_rule::ActiveModel = rule.into();
    active.percentage = Set(percentage);
    active.update(db).await.map_err(Into::into)
}

/// Soft-deletes a rule.
///
/// The rule stops participating in new allocations; historical allocation
/// outputs keep pointing at it, and its bucket (if any) keeps its balance.
pub async fn soft_delete_rule(db: &DatabaseConnection, rule_id: i64) -> Result<()> {
    let rule = get_rule_by_id(db, rule_id)
        .await?
        .ok_or(Error::RuleNotFound { id: rule_id })?;

    let mut active: allocation_rule::ActiveModel = rule.into();
    active.is_deleted = Set(true);
    active.update(db).await?;
    Ok(())
}

/// Creates any configured rules that do not exist yet, matched by owner and
/// name. Returns how many rules were created.
pub async fn seed_rules(db: &DatabaseConnection, configs: &[RuleConfig]) -> Result<usize> {
    let mut created = 0;
    for config in configs {
        let existing = AllocationRule::find()
            .filter(allocation_rule::Column::UserId.eq(config.user_id.as_str()))
            .filter(allocation_rule::Column::Name.eq(config.name.as_str()))
            .filter(allocation_rule::Column::IsDeleted.eq(false))
            .one(db)
            .await?;

        if existing.is_none() {
            create_rule(
                db,
                config.user_id.clone(),
                config.name.clone(),
                config.percentage,
                config.destination,
                config.destination_id.clone(),
            )
            .await?;
            created += 1;
        }
    }
    Ok(created)
}
