//! Credit listing entity - Carbon credits a user puts up for sale.
//!
//! The seller's points are escrowed when the listing is created; `amount` is what is
//! still for sale and only ever shrinks through conditional decrements.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a credit listing
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
pub enum CreditListingStatus {
    /// Credits left to buy
    #[sea_orm(string_value = "active")]
    Active,
    /// Every credit was bought
    #[sea_orm(string_value = "sold")]
    Sold,
    /// Taken off the market by the seller, remainder refunded
    #[sea_orm(string_value = "withdrawn")]
    Withdrawn,
}

/// Credit listing database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "credit_listings")]
pub struct Model {
    /// Unique identifier for the credit listing
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Seller user id
    pub seller_id: String,
    /// Seller display name at listing time
    pub seller_name: String,
    /// Credits still for sale
    pub amount: i64,
    /// Credits originally offered
    pub initial_amount: i64,
    /// Asking price per credit in USD
    pub price_per_credit: f64,
    /// Carbon standard the credits were issued under
    pub standard: String,
    /// Vintage year
    pub vintage: i32,
    /// Registry batch the credits belong to, e.g. `RIQ-2024-7K3M9QXA`
    pub batch_serial: String,
    /// Serial range covering every credit originally offered
    pub serial_number_range: String,
    /// Current status
    pub status: CreditListingStatus,
    /// When the credits were listed
    pub created_at: DateTimeUtc,
}

/// Defines relationships between `CreditListing` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each credit listing belongs to one seller
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::SellerId",
        to = "super::user::Column::Id"
    )]
    Seller,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Seller.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
