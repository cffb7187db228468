//! Listing entity - One unit of surplus food offered by a giver.
//!
//! A listing moves through `available` -> `claimed` -> `completed`, can fall back from
//! `claimed` to `available` when the claimer backs out, and can be soft-deleted by the
//! giver at any point before completion. `claim_code` and `claimed_by` are either both
//! set or both empty.

use sea_orm::FromJsonQueryResult;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a listing
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
pub enum ListingStatus {
    /// Open for claiming
    #[sea_orm(string_value = "available")]
    Available,
    /// Reserved by one receiver, waiting for the hand-off
    #[sea_orm(string_value = "claimed")]
    Claimed,
    /// Hand-off verified and rewards settled
    #[sea_orm(string_value = "completed")]
    Completed,
    /// Withdrawn by the giver
    #[sea_orm(string_value = "deleted")]
    Deleted,
}

/// How the receiver travels to pick up a listing
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    /// On foot
    #[sea_orm(string_value = "walk")]
    Walk,
    /// Bicycle
    #[sea_orm(string_value = "bike")]
    Bike,
    /// Bus or train
    #[sea_orm(string_value = "transit")]
    Transit,
    /// Private car
    #[sea_orm(string_value = "car")]
    Car,
}

/// JSON-encoded list of strings (ingredients, tags)
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct StringList(pub Vec<String>);

impl From<Vec<String>> for StringList {
    fn from(value: Vec<String>) -> Self {
        Self(value)
    }
}

/// Listing database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "listings")]
pub struct Model {
    /// Unique identifier for the listing
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Dish name shown to receivers
    pub title: String,
    /// Number of servings on offer
    pub quantity: i32,
    /// Ingredient list, mostly for allergy checks
    #[sea_orm(column_type = "Json")]
    pub ingredients: StringList,
    /// Calories per serving, if known
    pub calories_per_serving: Option<i32>,
    /// Image URL or storage path
    pub image: Option<String>,
    /// User id of the giver
    pub giver_id: String,
    /// Giver display name at posting time
    pub giver_name: String,
    /// Giver rating at posting time
    pub giver_rating: f64,
    /// Free-text pickup location
    pub location: String,
    /// Free-text one-way distance, e.g. `"0.5km"`
    pub distance: String,
    /// Free-form tags (e.g. "Free", "Eco-Ride")
    #[sea_orm(column_type = "Json")]
    pub tags: StringList,
    /// Current lifecycle status
    pub status: ListingStatus,
    /// Four-digit hand-off code, present while claimed and after completion
    pub claim_code: Option<String>,
    /// User id of the claimer
    pub claimed_by: Option<String>,
    /// Claimer display name
    pub claimed_by_name: Option<String>,
    /// Transport mode chosen by the claimer
    pub pickup_method: Option<TransportMode>,
    /// Stars the claimer gave the giver after the hand-off, at most once
    pub pickup_rating: Option<i32>,
    /// kg CO2e avoided by sharing instead of wasting, computed when posted
    pub carbon_saved: f64,
    /// When the listing was posted
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Listing and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each listing belongs to one giver
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::GiverId",
        to = "super::user::Column::Id"
    )]
    Giver,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Giver.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
