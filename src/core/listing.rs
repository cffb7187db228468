//! Listing business logic - Posting, browsing and the claim lifecycle.
//!
//! Claim, unclaim and delete are each a single conditional `UPDATE` filtered on the
//! status the transition starts from. The status read that precedes it only produces a
//! friendlier error; when two users race, the database decides and the loser gets
//! [`Error::InvalidListingState`]. Claim and unclaim run that update in a transaction
//! together with the system message they post to the giver.

use crate::{
    core::{
        claim_code::ClaimCode,
        impact::parse_distance_km,
        lifecycle::{ListingEvent, ensure_transition},
        message::send_message,
        session::Session,
    },
    entities::{Listing, ListingStatus, TransportMode, listing},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use tracing::{info, warn};

/// Data a giver supplies when posting a listing
#[derive(Debug, Clone, Default)]
pub struct NewListing {
    /// Dish name
    pub title: String,
    /// Servings
    pub quantity: i32,
    /// Ingredient list
    pub ingredients: Vec<String>,
    /// Calories per serving
    pub calories_per_serving: Option<i32>,
    /// Image reference
    pub image: Option<String>,
    /// Pickup location
    pub location: String,
    /// One-way distance text, e.g. "0.5km"
    pub distance: String,
    /// Tags
    pub tags: Vec<String>,
    /// kg CO2e saved, see [`crate::core::carbon::CarbonAnalysis::carbon_saved`]
    pub carbon_saved: f64,
}

/// Posts a new `available` listing on behalf of the session user.
///
/// Rejects an empty title, a non-positive quantity, a negative or non-finite
/// `carbon_saved`, and a distance that [`parse_distance_km`] cannot read.
pub async fn post_listing(
    db: &DatabaseConnection,
    session: &Session,
    new_listing: NewListing,
) -> Result<listing::Model> {
    if new_listing.title.trim().is_empty() {
        return Err(Error::validation("Listing title cannot be empty"));
    }
    if new_listing.quantity <= 0 {
        return Err(Error::validation(format!(
            "Quantity must be positive, got {}",
            new_listing.quantity
        )));
    }
    if !new_listing.carbon_saved.is_finite() || new_listing.carbon_saved < 0.0 {
        return Err(Error::validation(format!(
            "Carbon saved must be a non-negative number, got {}",
            new_listing.carbon_saved
        )));
    }
    parse_distance_km(&new_listing.distance)?;

    let giver = session.user();
    let model = listing::ActiveModel {
        title: Set(new_listing.title.trim().to_string()),
        quantity: Set(new_listing.quantity),
        ingredients: Set(new_listing.ingredients.into()),
        calories_per_serving: Set(new_listing.calories_per_serving),
        image: Set(new_listing.image),
        giver_id: Set(giver.id.clone()),
        giver_name: Set(giver.name.clone()),
        giver_rating: Set(giver.rating),
        location: Set(new_listing.location),
        distance: Set(new_listing.distance),
        tags: Set(new_listing.tags.into()),
        status: Set(ListingStatus::Available),
        claim_code: Set(None),
        claimed_by: Set(None),
        claimed_by_name: Set(None),
        pickup_method: Set(None),
        pickup_rating: Set(None),
        carbon_saved: Set(new_listing.carbon_saved),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    };

    let created = model.insert(db).await?;
    info!(listing_id = created.id, giver_id = %created.giver_id, "Listing posted");
    Ok(created)
}

/// Finds a listing by id, whatever its status.
pub async fn get_listing_by_id(
    db: &DatabaseConnection,
    listing_id: i64,
) -> Result<Option<listing::Model>> {
    Listing::find_by_id(listing_id)
        .one(db)
        .await
        .map_err(Into::into)
}

async fn require_listing<C>(db: &C, listing_id: i64) -> Result<listing::Model>
where
    C: ConnectionTrait,
{
    Listing::find_by_id(listing_id)
        .one(db)
        .await?
        .ok_or(Error::ListingNotFound { id: listing_id })
}

/// Lists `available` listings, newest first, optionally hiding one giver's own posts.
pub async fn get_available_listings(
    db: &DatabaseConnection,
    exclude_giver: Option<&str>,
) -> Result<Vec<listing::Model>> {
    let mut query = Listing::find().filter(listing::Column::Status.eq(ListingStatus::Available));
    if let Some(giver_id) = exclude_giver {
        query = query.filter(listing::Column::GiverId.ne(giver_id));
    }

    query
        .order_by_desc(listing::Column::CreatedAt)
        .order_by_desc(listing::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// A giver's listings in every status except `deleted`, newest first.
pub async fn get_listings_by_giver(
    db: &DatabaseConnection,
    giver_id: &str,
) -> Result<Vec<listing::Model>> {
    Listing::find()
        .filter(listing::Column::GiverId.eq(giver_id))
        .filter(listing::Column::Status.ne(ListingStatus::Deleted))
        .order_by_desc(listing::Column::CreatedAt)
        .order_by_desc(listing::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Listings currently or previously claimed by a user, newest first.
pub async fn get_listings_claimed_by(
    db: &DatabaseConnection,
    user_id: &str,
) -> Result<Vec<listing::Model>> {
    Listing::find()
        .filter(listing::Column::ClaimedBy.eq(user_id))
        .order_by_desc(listing::Column::CreatedAt)
        .order_by_desc(listing::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Reserves an `available` listing for the session user and mints its hand-off code.
///
/// # Errors
/// * [`Error::ListingNotFound`]
/// * [`Error::PermissionDenied`] - givers cannot claim their own listing
/// * [`Error::InvalidListingState`] - not `available`, or another claimer won the race
pub async fn claim_listing(
    db: &DatabaseConnection,
    session: &Session,
    listing_id: i64,
    pickup_method: TransportMode,
) -> Result<listing::Model> {
    let current = require_listing(db, listing_id).await?;
    if current.giver_id == session.user_id() {
        return Err(Error::permission("You cannot claim your own listing"));
    }
    ensure_transition(&current, ListingEvent::Claim)?;

    let code = ClaimCode::generate();
    let txn = db.begin().await?;
    let result = Listing::update_many()
        .set(listing::ActiveModel {
            status: Set(ListingStatus::Claimed),
            claim_code: Set(Some(code.into())),
            claimed_by: Set(Some(session.user_id().to_string())),
            claimed_by_name: Set(Some(session.user_name().to_string())),
            pickup_method: Set(Some(pickup_method)),
            ..Default::default()
        })
        .filter(listing::Column::Id.eq(listing_id))
        .filter(listing::Column::Status.eq(ListingStatus::Available))
        .exec(&txn)
        .await?;

    let updated = require_listing(&txn, listing_id).await?;
    if result.rows_affected == 0 {
        warn!(listing_id, user_id = session.user_id(), "Claim lost the race");
        return Err(Error::InvalidListingState {
            id: listing_id,
            status: updated.status,
            expected: ListingEvent::Claim.expected_states(),
        });
    }

    send_message(
        &txn,
        session,
        listing_id,
        &current.giver_id,
        &format!("System: I've claimed this item via {}.", pickup_method.as_str()),
    )
    .await?;
    txn.commit().await?;

    info!(
        listing_id,
        claimer_id = session.user_id(),
        method = pickup_method.as_str(),
        "Listing claimed"
    );
    Ok(updated)
}

/// Releases the session user's claim, returning the listing to `available`.
///
/// # Errors
/// * [`Error::ListingNotFound`]
/// * [`Error::InvalidListingState`] - not `claimed`
/// * [`Error::PermissionDenied`] - the session user is not the current claimer
pub async fn unclaim_listing(
    db: &DatabaseConnection,
    session: &Session,
    listing_id: i64,
) -> Result<listing::Model> {
    let current = require_listing(db, listing_id).await?;
    ensure_transition(&current, ListingEvent::Unclaim)?;
    if current.claimed_by.as_deref() != Some(session.user_id()) {
        return Err(Error::permission("Only the claimer can release a claim"));
    }

    let txn = db.begin().await?;
    let result = Listing::update_many()
        .set(listing::ActiveModel {
            status: Set(ListingStatus::Available),
            claim_code: Set(None),
            claimed_by: Set(None),
            claimed_by_name: Set(None),
            pickup_method: Set(None),
            ..Default::default()
        })
        .filter(listing::Column::Id.eq(listing_id))
        .filter(listing::Column::Status.eq(ListingStatus::Claimed))
        .filter(listing::Column::ClaimedBy.eq(session.user_id()))
        .exec(&txn)
        .await?;

    let updated = require_listing(&txn, listing_id).await?;
    if result.rows_affected == 0 {
        return Err(Error::InvalidListingState {
            id: listing_id,
            status: updated.status,
            expected: ListingEvent::Unclaim.expected_states(),
        });
    }

    send_message(
        &txn,
        session,
        listing_id,
        &current.giver_id,
        "System: I have unclaimed this item.",
    )
    .await?;
    txn.commit().await?;

    info!(listing_id, user_id = session.user_id(), "Listing unclaimed");
    Ok(updated)
}

/// Withdraws one of the session user's listings. Completed listings cannot be deleted.
///
/// The row is kept with status `deleted` so ledger entries still resolve.
pub async fn delete_listing(
    db: &DatabaseConnection,
    session: &Session,
    listing_id: i64,
) -> Result<listing::Model> {
    let current = require_listing(db, listing_id).await?;
    if current.giver_id != session.user_id() {
        return Err(Error::permission("Only the giver can delete a listing"));
    }
    ensure_transition(&current, ListingEvent::Delete)?;

    let result = Listing::update_many()
        .set(listing::ActiveModel {
            status: Set(ListingStatus::Deleted),
            ..Default::default()
        })
        .filter(listing::Column::Id.eq(listing_id))
        .filter(
            listing::Column::Status.is_in([ListingStatus::Available, ListingStatus::Claimed]),
        )
        .exec(db)
        .await?;

    let updated = require_listing(db, listing_id).await?;
    if result.rows_affected == 0 {
        return Err(Error::InvalidListingState {
            id: listing_id,
            status: updated.status,
            expected: ListingEvent::Delete.expected_states(),
        });
    }

    info!(listing_id, "Listing deleted");
    Ok(updated)
}
