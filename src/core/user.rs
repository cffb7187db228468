//! User business logic - Account creation, lookups and hand-off ratings.

use crate::{
    core::session::Session,
    entities::{Listing, ListingStatus, SubscriptionTier, User, listing, user},
    errors::{Error, Result},
};
use sea_orm::{Set, TransactionTrait, prelude::*};
use tracing::info;

/// Data needed to register a user
#[derive(Debug, Clone)]
pub struct NewUser {
    /// Auth provider id
    pub id: String,
    /// Display name
    pub name: String,
    /// Login email
    pub email: String,
    /// Free-text home location
    pub location: String,
}

/// Registers a user on the free tier with an empty wallet.
///
/// Validates that the id and name are non-empty and that the email looks like one.
pub async fn create_user<C>(db: &C, new_user: NewUser) -> Result<user::Model>
where
    C: ConnectionTrait,
{
    if new_user.id.trim().is_empty() {
        return Err(Error::validation("User id cannot be empty"));
    }
    if new_user.name.trim().is_empty() {
        return Err(Error::validation("User name cannot be empty"));
    }
    if !new_user.email.contains('@') {
        return Err(Error::validation(format!(
            "Invalid email address {:?}",
            new_user.email
        )));
    }

    let now = chrono::Utc::now();
    let model = user::ActiveModel {
        id: Set(new_user.id.trim().to_string()),
        name: Set(new_user.name.trim().to_string()),
        email: Set(new_user.email.trim().to_lowercase()),
        location: Set(new_user.location),
        wallet_balance: Set(0),
        rating: Set(0.0),
        rating_count: Set(0),
        subscription_tier: Set(SubscriptionTier::Free),
        is_lifetime_member: Set(false),
        ai_scan_count: Set(0),
        last_ai_reset: Set(now),
        created_at: Set(now),
    };

    let created = model.insert(db).await?;
    info!(user_id = %created.id, "User created");
    Ok(created)
}

/// Finds a user by id.
pub async fn get_user_by_id<C>(db: &C, user_id: &str) -> Result<Option<user::Model>>
where
    C: ConnectionTrait,
{
    User::find_by_id(user_id.to_string())
        .one(db)
        .await
        .map_err(Into::into)
}

/// Finds a user by email, case-insensitively.
pub async fn get_user_by_email(
    db: &DatabaseConnection,
    email: &str,
) -> Result<Option<user::Model>> {
    User::find()
        .filter(user::Column::Email.eq(email.trim().to_lowercase()))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Like [`get_user_by_id`], but a missing user is an error.
pub async fn require_user<C>(db: &C, user_id: &str) -> Result<user::Model>
where
    C: ConnectionTrait,
{
    get_user_by_id(db, user_id)
        .await?
        .ok_or_else(|| Error::UserNotFound {
            id: user_id.to_string(),
        })
}

/// Rates the giver of a completed hand-off on behalf of its claimer and updates the
/// giver's running average.
///
/// Each hand-off can be rated once: the listing's `pickup_rating` is set with a
/// conditional update, so a second rating is refused even when both arrive together.
///
/// # Errors
/// * [`Error::Validation`] - stars outside 1-5
/// * [`Error::ListingNotFound`]
/// * [`Error::PermissionDenied`] - the session user did not claim the listing
/// * [`Error::InvalidListingState`] - the hand-off has not been verified yet
/// * [`Error::AlreadyRated`]
pub async fn rate_giver(
    db: &DatabaseConnection,
    session: &Session,
    listing_id: i64,
    stars: u8,
) -> Result<user::Model> {
    if !(1..=5).contains(&stars) {
        return Err(Error::validation(format!(
            "Rating must be between 1 and 5, got {stars}"
        )));
    }

    let handed_off = Listing::find_by_id(listing_id)
        .one(db)
        .await?
        .ok_or(Error::ListingNotFound { id: listing_id })?;
    if handed_off.claimed_by.as_deref() != Some(session.user_id()) {
        return Err(Error::permission("Only the receiver of a hand-off can rate it"));
    }
    if handed_off.status != ListingStatus::Completed {
        return Err(Error::InvalidListingState {
            id: listing_id,
            status: handed_off.status,
            expected: "completed",
        });
    }
    if handed_off.pickup_rating.is_some() {
        return Err(Error::AlreadyRated { listing_id });
    }

    let txn = db.begin().await?;
    let marked = Listing::update_many()
        .set(listing::ActiveModel {
            pickup_rating: Set(Some(i32::from(stars))),
            ..Default::default()
        })
        .filter(listing::Column::Id.eq(listing_id))
        .filter(listing::Column::Status.eq(ListingStatus::Completed))
        .filter(listing::Column::ClaimedBy.eq(session.user_id()))
        .filter(listing::Column::PickupRating.is_null())
        .exec(&txn)
        .await?;
    if marked.rows_affected == 0 {
        return Err(Error::AlreadyRated { listing_id });
    }

    let rated = require_user(&txn, &handed_off.giver_id).await?;
    let count = rated.rating_count + 1;
    let average = rated
        .rating
        .mul_add(f64::from(rated.rating_count), f64::from(stars))
        / f64::from(count);

    let mut active: user::ActiveModel = rated.into();
    active.rating = Set(average);
    active.rating_count = Set(count);
    let updated = active.update(&txn).await?;

    txn.commit().await?;
    info!(listing_id, giver_id = %updated.id, stars, "Giver rated");
    Ok(updated)
}
