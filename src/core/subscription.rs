//! Subscription tiers and the daily AI scan quota.
//!
//! Payment itself happens at the provider; the only thing this crate does on success is
//! [`fulfill_checkout`], which moves the user to the purchased tier.

pub use crate::entities::SubscriptionTier;
use crate::{
    core::user::require_user,
    entities::{User, user},
    errors::Result,
};
use chrono::{DateTime, Utc};
use sea_orm::{Set, TransactionTrait, prelude::*, sea_query::Expr};
use tracing::{debug, info};

impl SubscriptionTier {
    /// Marketing name.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Free => "Eco-Seed",
            Self::Pro => "Eco-Sprout",
            Self::Business => "Eco-Harvest",
        }
    }

    /// Monthly price in USD.
    #[must_use]
    pub const fn monthly_price(self) -> f64 {
        match self {
            Self::Free => 0.0,
            Self::Pro => 11.99,
            Self::Business => 19.99,
        }
    }

    /// AI scans per day; `None` means unlimited.
    #[must_use]
    pub const fn daily_ai_limit(self) -> Option<i32> {
        match self {
            Self::Free => Some(3),
            Self::Pro => Some(15),
            Self::Business => None,
        }
    }
}

/// Applies a successful checkout: sets the tier and marks the entry fee as paid.
pub async fn fulfill_checkout(
    db: &DatabaseConnection,
    user_id: &str,
    tier: SubscriptionTier,
) -> Result<user::Model> {
    let current = require_user(db, user_id).await?;
    let mut active: user::ActiveModel = current.into();
    active.subscription_tier = Set(tier);
    active.is_lifetime_member = Set(true);
    let updated = active.update(db).await?;

    info!(user_id, tier = tier.display_name(), "Subscription upgraded");
    Ok(updated)
}

/// Marks the one-off entry fee as paid without changing the tier.
pub async fn pay_lifetime_fee(db: &DatabaseConnection, user_id: &str) -> Result<user::Model> {
    let current = require_user(db, user_id).await?;
    let mut active: user::ActiveModel = current.into();
    active.is_lifetime_member = Set(true);
    active.update(db).await.map_err(Into::into)
}

/// Uses one AI scan if the user still has quota for the UTC day of `now`.
///
/// The counter restarts when `now` falls on a different calendar day than the last
/// reset. Returns `false`, without consuming anything, when the quota is exhausted.
pub async fn try_consume_ai_scan(
    db: &DatabaseConnection,
    user_id: &str,
    now: DateTime<Utc>,
) -> Result<bool> {
    let txn = db.begin().await?;
    let current = require_user(&txn, user_id).await?;

    if current.last_ai_reset.date_naive() != now.date_naive() {
        debug!(user_id, "Resetting daily AI quota");
        let mut active: user::ActiveModel = current.clone().into();
        active.ai_scan_count = Set(0);
        active.last_ai_reset = Set(now);
        active.update(&txn).await?;
    }

    let mut increment = User::update_many()
        .col_expr(
            user::Column::AiScanCount,
            Expr::col(user::Column::AiScanCount).add(1),
        )
        .filter(user::Column::Id.eq(user_id));
    if let Some(limit) = current.subscription_tier.daily_ai_limit() {
        increment = increment.filter(user::Column::AiScanCount.lt(limit));
    }
    let consumed = increment.exec(&txn).await?.rows_affected > 0;

    txn.commit().await?;
    Ok(consumed)
}
