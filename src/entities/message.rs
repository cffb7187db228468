//! Message entity - Chat between a giver and a receiver about one listing.
//!
//! Claim and unclaim also write a system message from the receiver to the giver, in
//! the same transaction as the status change.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Message database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "messages")]
pub struct Model {
    /// Unique identifier for the message
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Listing the conversation is about
    pub listing_id: i64,
    /// Author
    pub sender_id: String,
    /// Author display name at send time
    pub sender_name: String,
    /// Recipient
    pub receiver_id: String,
    /// Message body
    pub text: String,
    /// When the message was sent
    pub timestamp: DateTimeUtc,
}

/// Defines relationships between Message and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each message belongs to one listing
    #[sea_orm(
        belongs_to = "super::listing::Entity",
        from = "Column::ListingId",
        to = "super::listing::Column::Id"
    )]
    Listing,
}

impl Related<super::listing::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Listing.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
