//! Settlement - Verifies a hand-off code and credits giver and claimer exactly once.
//!
//! The giver, status and code checks run on a plain read. Everything after that happens
//! inside one database transaction: the listing is flipped to `completed` with a
//! conditional update, both wallets are incremented with atomic expressions and one
//! ledger entry is appended per user. Any failure drops the transaction, which rolls
//! back every write made so far.
//!
//! Rewards follow `points = round(carbon_saved * points_per_kg) + base_points`, split
//! evenly between the two parties; an odd point is dropped.

use crate::{
    core::{
        claim_code::ClaimCode,
        lifecycle::{ListingEvent, ensure_transition},
        points::{LedgerEntry, adjust_balance_atomic, append_entry},
        session::Session,
    },
    entities::{Listing, ListingStatus, PointTransactionKind, listing, point_transaction},
    errors::{Error, Result},
};
use rand::{Rng, distr::Alphanumeric};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Carbon standard recorded on settlement ledger entries.
pub const SETTLEMENT_STANDARD: &str = "ReplateIQ Verified";

const VERIFICATION_HASH_LENGTH: usize = 26;

/// Reward constants used by settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardPolicy {
    /// Points per kg CO2e saved
    pub points_per_kg: i64,
    /// Flat participation points added to every settlement
    pub base_points: i64,
}

impl Default for RewardPolicy {
    fn default() -> Self {
        Self {
            points_per_kg: 10,
            base_points: 5,
        }
    }
}

/// How a reward was divided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RewardSplit {
    /// Points earned by the hand-off
    pub total: i64,
    /// Points credited to each of giver and claimer
    pub per_party: i64,
    /// Remainder nobody receives
    pub dropped: i64,
}

impl RewardPolicy {
    /// Rejects negative constants.
    pub fn validate(&self) -> Result<()> {
        if self.points_per_kg < 0 || self.base_points < 0 {
            return Err(Error::Config {
                message: format!(
                    "Reward constants must be non-negative (points_per_kg={}, base_points={})",
                    self.points_per_kg, self.base_points
                ),
            });
        }
        Ok(())
    }

    /// Total points for a listing that saved `carbon_saved` kg CO2e.
    ///
    /// Non-finite or negative savings count as zero.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    pub fn points_for(&self, carbon_saved: f64) -> i64 {
        let saved = if carbon_saved.is_finite() {
            carbon_saved.max(0.0)
        } else {
            0.0
        };
        (saved * self.points_per_kg as f64).round() as i64 + self.base_points
    }

    /// Splits `points` evenly between two parties.
    #[must_use]
    pub const fn split(points: i64) -> RewardSplit {
        let per_party = points / 2;
        RewardSplit {
            total: points,
            per_party,
            dropped: points - per_party * 2,
        }
    }
}

/// Outcome of a successful settlement.
#[derive(Debug, Clone)]
pub struct Settlement {
    /// The listing, now `completed`
    pub listing: listing::Model,
    /// Reward breakdown
    pub split: RewardSplit,
    /// Ledger entry written for the giver
    pub giver_entry: point_transaction::Model,
    /// Ledger entry written for the claimer
    pub claimer_entry: point_transaction::Model,
}

pub(crate) fn verification_hash() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(VERIFICATION_HASH_LENGTH)
        .map(char::from)
        .collect()
}

/// Completes a claimed listing when the giver submits the claimer's code.
///
/// # Errors
/// * [`Error::MalformedCode`] - `code` is not four digits (nothing is read)
/// * [`Error::ListingNotFound`] - no such listing
/// * [`Error::PermissionDenied`] - the session user is not the giver
/// * [`Error::InvalidListingState`] - the listing is not `claimed`, including when it was
///   already completed or another settlement won the race
/// * [`Error::InvalidCode`] - the code does not match; the listing stays `claimed`
pub async fn complete_listing(
    db: &DatabaseConnection,
    policy: &RewardPolicy,
    session: &Session,
    listing_id: i64,
    code: &str,
) -> Result<Settlement> {
    let code = ClaimCode::parse(code)?;

    let current = Listing::find_by_id(listing_id)
        .one(db)
        .await?
        .ok_or(Error::ListingNotFound { id: listing_id })?;

    if current.giver_id != session.user_id() {
        warn!(listing_id, user_id = session.user_id(), "Non-giver tried to verify a hand-off");
        return Err(Error::permission("Only the giver can verify a hand-off"));
    }

    ensure_transition(&current, ListingEvent::SubmitCode)?;

    if current.claim_code.as_deref() != Some(code.as_str()) {
        warn!(listing_id, "Hand-off code mismatch");
        return Err(Error::InvalidCode { listing_id });
    }

    let txn = db.begin().await?;

    // Write before reading inside the transaction. Only one settlement can move the
    // listing out of `claimed`.
    let flipped = Listing::update_many()
        .set(listing::ActiveModel {
            status: Set(ListingStatus::Completed),
            ..Default::default()
        })
        .filter(listing::Column::Id.eq(listing_id))
        .filter(listing::Column::GiverId.eq(session.user_id()))
        .filter(listing::Column::Status.eq(ListingStatus::Claimed))
        .filter(listing::Column::ClaimCode.eq(code.as_str()))
        .exec(&txn)
        .await?;

    let found = Listing::find_by_id(listing_id)
        .one(&txn)
        .await?
        .ok_or(Error::ListingNotFound { id: listing_id })?;

    if flipped.rows_affected == 0 {
        warn!(listing_id, status = ?found.status, "Settlement lost the race");
        return Err(Error::InvalidListingState {
            id: listing_id,
            status: found.status,
            expected: ListingEvent::SubmitCode.expected_states(),
        });
    }

    let claimer_id = found.claimed_by.clone().ok_or(Error::InvalidListingState {
        id: listing_id,
        status: found.status,
        expected: "claimed by a receiver",
    })?;

    let split = RewardPolicy::split(policy.points_for(found.carbon_saved));
    let hash = verification_hash();

    adjust_balance_atomic(&txn, &found.giver_id, split.per_party).await?;
    adjust_balance_atomic(&txn, &claimer_id, split.per_party).await?;

    let giver_entry = append_entry(
        &txn,
        &found.giver_id,
        LedgerEntry::new(
            split.per_party,
            format!("Food Rescued: {} (50% Share)", found.title),
            PointTransactionKind::Earned,
        )
        .for_listing(listing_id)
        .with_standard(SETTLEMENT_STANDARD)
        .with_verification_hash(hash.clone()),
    )
    .await?;

    let claimer_entry = append_entry(
        &txn,
        &claimer_id,
        LedgerEntry::new(
            split.per_party,
            format!("Verified Pickup: {} (50% Share)", found.title),
            PointTransactionKind::Earned,
        )
        .for_listing(listing_id)
        .with_standard(SETTLEMENT_STANDARD)
        .with_verification_hash(hash),
    )
    .await?;

    txn.commit().await?;

    info!(
        listing_id,
        giver_id = %found.giver_id,
        claimer_id = %claimer_id,
        points = split.total,
        per_party = split.per_party,
        "Listing settled"
    );

    Ok(Settlement {
        listing: found,
        split,
        giver_entry,
        claimer_entry,
    })
}

/// Finds the giver's claimed listing carrying `code`, for when only a code is typed in.
pub async fn find_claimed_listing_by_code(
    db: &DatabaseConnection,
    session: &Session,
    code: &str,
) -> Result<Option<listing::Model>> {
    let code = ClaimCode::parse(code)?;

    Listing::find()
        .filter(listing::Column::GiverId.eq(session.user_id()))
        .filter(listing::Column::Status.eq(ListingStatus::Claimed))
        .filter(listing::Column::ClaimCode.eq(code.as_str()))
        .order_by_desc(listing::Column::CreatedAt)
        .one(db)
        .await
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::listing::{claim_listing, get_listing_by_id};
    use crate::core::points::get_points_history;
    use crate::core::user::require_user;
    use crate::entities::TransportMode;
    use crate::errors::ErrorKind;
    use crate::test_utils::*;

    #[test]
    fn test_points_formula() {
        let policy = RewardPolicy::default();
        assert_eq!(policy.points_for(0.0), 5);
        assert_eq!(policy.points_for(2.4), 29);
        assert_eq!(policy.points_for(1.25), 18);
        assert_eq!(policy.points_for(-3.0), 5);
        assert_eq!(policy.points_for(f64::NAN), 5);

        let generous = RewardPolicy {
            points_per_kg: 10,
            base_points: 50,
        };
        assert_eq!(generous.points_for(2.4), 74);
    }

    #[test]
    fn test_split_conserves_points() {
        for points in 0..200 {
            let split = RewardPolicy::split(points);
            assert!(split.per_party * 2 <= points);
            assert_eq!(split.per_party * 2 + split.dropped, points);
            assert_eq!(split.dropped, points % 2);
        }
    }

    #[test]
    fn test_verification_hash_shape() {
        let hash = verification_hash();
        assert_eq!(hash.len(), VERIFICATION_HASH_LENGTH);
        assert!(hash.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[tokio::test]
    async fn test_complete_listing_credits_both_parties() -> Result<()> {
        let (db, giver, claimer) = setup_with_users().await?;
        let posted = create_custom_listing(&db, &giver, "Lasagna", "0.5km", 2.4).await?;
        let claimed = claim_listing(&db, &claimer, posted.id, TransportMode::Walk).await?;
        let code = claimed.claim_code.clone().unwrap();

        let settlement =
            complete_listing(&db, &RewardPolicy::default(), &giver, posted.id, &code).await?;

        // round(2.4 * 10) + 5 = 29, 14 each, 1 dropped
        assert_eq!(settlement.split.total, 29);
        assert_eq!(settlement.split.per_party, 14);
        assert_eq!(settlement.split.dropped, 1);
        assert_eq!(settlement.listing.status, ListingStatus::Completed);
        assert_eq!(settlement.listing.claim_code.as_deref(), Some(code.as_str()));
        assert_eq!(settlement.listing.claimed_by.as_deref(), Some(claimer.user_id()));

        assert_eq!(require_user(&db, giver.user_id()).await?.wallet_balance, 14);
        assert_eq!(require_user(&db, claimer.user_id()).await?.wallet_balance, 14);

        let giver_history = get_points_history(&db, giver.user_id()).await?;
        let claimer_history = get_points_history(&db, claimer.user_id()).await?;
        assert_eq!(giver_history, vec![settlement.giver_entry.clone()]);
        assert_eq!(claimer_history, vec![settlement.claimer_entry.clone()]);
        assert_eq!(giver_history[0].description, "Food Rescued: Lasagna (50% Share)");
        assert_eq!(claimer_history[0].listing_id, Some(posted.id));
        assert_eq!(
            giver_history[0].verification_hash,
            claimer_history[0].verification_hash
        );
        assert_eq!(giver_history[0].standard.as_deref(), Some(SETTLEMENT_STANDARD));
        Ok(())
    }

    #[tokio::test]
    async fn test_complete_listing_is_single_use() -> Result<()> {
        let (db, giver, claimer) = setup_with_users().await?;
        let posted = create_test_listing(&db, &giver).await?;
        let claimed = claim_listing(&db, &claimer, posted.id, TransportMode::Bike).await?;
        let code = claimed.claim_code.unwrap();
        let policy = RewardPolicy::default();

        complete_listing(&db, &policy, &giver, posted.id, &code).await?;
        let balance_after_first = require_user(&db, giver.user_id()).await?.wallet_balance;

        let second = complete_listing(&db, &policy, &giver, posted.id, &code).await;
        let err = second.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Precondition);
        assert!(matches!(
            err,
            Error::InvalidListingState {
                status: ListingStatus::Completed,
                ..
            }
        ));

        assert_eq!(
            require_user(&db, giver.user_id()).await?.wallet_balance,
            balance_after_first
        );
        assert_eq!(get_points_history(&db, giver.user_id()).await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_wrong_code_leaves_listing_claimed() -> Result<()> {
        let (db, giver, claimer) = setup_with_users().await?;
        let posted = create_test_listing(&db, &giver).await?;
        let claimed = claim_listing(&db, &claimer, posted.id, TransportMode::Walk).await?;
        let real = claimed.claim_code.clone().unwrap();
        let wrong = if real == "1234" { "4321" } else { "1234" };
        let policy = RewardPolicy::default();

        // Mismatches can be retried without limit
        for _ in 0..3 {
            let result = complete_listing(&db, &policy, &giver, posted.id, wrong).await;
            assert!(matches!(result, Err(Error::InvalidCode { .. })));
        }

        let unchanged = get_listing_by_id(&db, posted.id).await?.unwrap();
        assert_eq!(unchanged, claimed);
        assert_eq!(require_user(&db, giver.user_id()).await?.wallet_balance, 0);

        complete_listing(&db, &policy, &giver, posted.id, &real).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_only_giver_can_complete() -> Result<()> {
        let (db, giver, claimer) = setup_with_users().await?;
        let posted = create_test_listing(&db, &giver).await?;
        let claimed = claim_listing(&db, &claimer, posted.id, TransportMode::Walk).await?;
        let code = claimed.claim_code.unwrap();

        let result =
            complete_listing(&db, &RewardPolicy::default(), &claimer, posted.id, &code).await;
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Permission);

        let still_claimed = get_listing_by_id(&db, posted.id).await?.unwrap();
        assert_eq!(still_claimed.status, ListingStatus::Claimed);
        Ok(())
    }

    #[tokio::test]
    async fn test_complete_unclaimed_listing() -> Result<()> {
        let (db, giver, _claimer) = setup_with_users().await?;
        let posted = create_test_listing(&db, &giver).await?;

        let result =
            complete_listing(&db, &RewardPolicy::default(), &giver, posted.id, "1234").await;
        assert!(matches!(
            result,
            Err(Error::InvalidListingState {
                status: ListingStatus::Available,
                ..
            })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_malformed_code_and_missing_listing() -> Result<()> {
        let (db, giver, _claimer) = setup_with_users().await?;
        let policy = RewardPolicy::default();

        let result = complete_listing(&db, &policy, &giver, 1, "12a4").await;
        assert!(matches!(result, Err(Error::MalformedCode { .. })));

        let result = complete_listing(&db, &policy, &giver, 999, "1234").await;
        assert!(matches!(result, Err(Error::ListingNotFound { id: 999 })));
        Ok(())
    }

    #[tokio::test]
    async fn test_find_claimed_listing_by_code() -> Result<()> {
        let (db, giver, claimer) = setup_with_users().await?;
        let posted = create_test_listing(&db, &giver).await?;
        let claimed = claim_listing(&db, &claimer, posted.id, TransportMode::Walk).await?;
        let code = claimed.claim_code.clone().unwrap();

        let found = find_claimed_listing_by_code(&db, &giver, &code).await?;
        assert_eq!(found, Some(claimed));

        // The claimer has no listing of their own carrying that code
        assert!(find_claimed_listing_by_code(&db, &claimer, &code).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_completions_settle_once() -> Result<()> {
        let (db, giver, claimer) = setup_with_users().await?;
        let posted = create_test_listing(&db, &giver).await?;
        let claimed = claim_listing(&db, &claimer, posted.id, TransportMode::Walk).await?;
        let code = claimed.claim_code.unwrap();
        let policy = RewardPolicy::default();

        let (first, second) = tokio::join!(
            complete_listing(&db, &policy, &giver, posted.id, &code),
            complete_listing(&db, &policy, &giver, posted.id, &code),
        );
        assert_eq!(usize::from(first.is_ok()) + usize::from(second.is_ok()), 1);
        assert_eq!(get_points_history(&db, claimer.user_id()).await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_completions_on_shared_file() -> Result<()> {
        let (db, _dir) = setup_file_test_db().await?;
        let giver = create_test_session(&db, "user_1", "Sarah Jenkins").await?;
        let claimer = create_test_session(&db, "user_2", "Mike Chen").await?;
        let policy = RewardPolicy::default();

        for round in 1..=10 {
            let posted = create_test_listing(&db, &giver).await?;
            let claimed = claim_listing(&db, &claimer, posted.id, TransportMode::Walk).await?;
            let code = claimed.claim_code.unwrap();

            let (first, second) = tokio::join!(
                complete_listing(&db, &policy, &giver, posted.id, &code),
                complete_listing(&db, &policy, &giver, posted.id, &code),
            );
            let lost = match (first, second) {
                (Ok(_), Err(err)) | (Err(err), Ok(_)) => err,
                (first, second) => panic!("expected one winner, got {first:?} and {second:?}"),
            };
            assert_eq!(lost.kind(), ErrorKind::Precondition);
            assert_eq!(get_points_history(&db, giver.user_id()).await?.len(), round);
        }

        // Ten settlements of 29 points, 14 to each side
        assert_eq!(require_user(&db, giver.user_id()).await?.wallet_balance, 140);
        assert_eq!(require_user(&db, claimer.user_id()).await?.wallet_balance, 140);
        Ok(())
    }
}
