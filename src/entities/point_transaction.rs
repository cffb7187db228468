//! Point transaction entity - Append-only ledger of wallet movements.
//!
//! Entries are inserted alongside the balance change they describe and are never
//! updated or deleted afterwards. `amount` is signed: credits are positive,
//! redemptions and sales negative.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// What caused a ledger entry
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
pub enum PointTransactionKind {
    /// Reward for a verified hand-off or other action
    #[sea_orm(string_value = "earned")]
    Earned,
    /// Points spent on a perk
    #[sea_orm(string_value = "redeemed")]
    Redeemed,
    /// Credits sold on the marketplace
    #[sea_orm(string_value = "sold")]
    Sold,
    /// Credits bought on the marketplace
    #[sea_orm(string_value = "bought")]
    Bought,
    /// Credits retired as an offset
    #[sea_orm(string_value = "retired")]
    Retired,
    /// Credits put up for sale
    #[sea_orm(string_value = "listed")]
    Listed,
}

/// Point transaction database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "point_transactions")]
pub struct Model {
    /// Unique identifier for the entry
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Wallet owner
    pub user_id: String,
    /// Listing that produced the entry, for settlement credits
    pub listing_id: Option<i64>,
    /// Signed amount in points
    pub amount: i64,
    /// Human-readable description
    pub description: String,
    /// Entry type
    pub transaction_type: PointTransactionKind,
    /// Carbon standard the credit was issued under
    pub standard: Option<String>,
    /// Vintage year of the credit
    pub vintage: Option<i32>,
    /// Registry serial number
    pub serial_number: Option<String>,
    /// Token shared by the two entries of one settlement
    pub verification_hash: Option<String>,
    /// When the entry was written
    pub timestamp: DateTimeUtc,
}

/// Defines relationships between `PointTransaction` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each entry belongs to one user
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
