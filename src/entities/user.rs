//! User entity - Wallet holder, giver and receiver.
//!
//! The wallet balance is only ever changed with atomic increment expressions, and every
//! change is paired with an append-only entry in `point_transactions`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Paid plan a user is on
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionTier {
    /// Eco-Seed
    #[sea_orm(string_value = "free")]
    Free,
    /// Eco-Sprout
    #[sea_orm(string_value = "pro")]
    Pro,
    /// Eco-Harvest
    #[sea_orm(string_value = "business")]
    Business,
}

/// User database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    /// Auth provider user id
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Display name
    pub name: String,
    /// Login email
    #[sea_orm(unique)]
    pub email: String,
    /// Free-text home location
    pub location: String,
    /// Current points balance
    pub wallet_balance: i64,
    /// Average star rating
    pub rating: f64,
    /// Number of ratings received
    pub rating_count: i32,
    /// Current plan
    pub subscription_tier: SubscriptionTier,
    /// Whether the one-off entry fee was paid
    pub is_lifetime_member: bool,
    /// AI scans used since `last_ai_reset`
    pub ai_scan_count: i32,
    /// Start of the current AI quota window
    pub last_ai_reset: DateTimeUtc,
    /// Account creation time
    pub created_at: DateTimeUtc,
}

/// Defines relationships between User and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One user gives many listings
    #[sea_orm(has_many = "super::listing::Entity")]
    Listings,
    /// One user has many ledger entries
    #[sea_orm(has_many = "super::point_transaction::Entity")]
    PointTransactions,
}

impl Related<super::listing::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Listings.def()
    }
}

impl Related<super::point_transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PointTransactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
