//! Carbon credit market - Selling earned points as verified carbon credits.
//!
//! Listing credits escrows them: the seller's wallet is debited with a conditional
//! decrement and a `listed` ledger entry. A purchase takes credits off the listing with
//! another conditional decrement, so two buyers can never take the same credit. Bought
//! credits land in the buyer's wallet; retired credits leave circulation and only leave
//! a ledger record carrying the certificate hash.
//!
//! Payment happens outside the crate. A purchase reports its price and records a
//! zero-amount `sold` entry for the seller, whose points already left at listing time.
//! A user's ledger amounts therefore always sum to their wallet balance.

use crate::{
    core::{
        impact::round2,
        points::{LedgerEntry, adjust_balance_atomic, append_entry, debit_balance_atomic},
        session::Session,
        settlement::{SETTLEMENT_STANDARD, verification_hash},
    },
    entities::{
        CreditListing, CreditListingStatus, PointTransactionKind, credit_listing,
        point_transaction,
    },
    errors::{Error, Result},
};
use chrono::Datelike;
use rand::{Rng, distr::Alphanumeric};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*, sea_query::Expr};
use tracing::{info, warn};

const EARLIEST_VINTAGE: i32 = 2000;
const BATCH_ID_LENGTH: usize = 8;

/// Credits a seller puts up for sale
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NewCreditListing {
    /// Credits to escrow, one per wallet point
    pub amount: i64,
    /// Asking price per credit in USD
    pub price_per_credit: f64,
    /// Vintage year
    pub vintage: i32,
}

/// Outcome of a purchase.
#[derive(Debug, Clone)]
pub struct CreditPurchase {
    /// The credit listing after the purchase
    pub listing: credit_listing::Model,
    /// Zero-amount `sold` entry written for the seller
    pub seller_entry: point_transaction::Model,
    /// `bought` or `retired` entry written for the buyer
    pub buyer_entry: point_transaction::Model,
    /// Amount owed to the seller in USD
    pub total_price: f64,
}

fn new_batch_serial(vintage: i32) -> String {
    let batch: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(BATCH_ID_LENGTH)
        .map(|b| char::from(b).to_ascii_uppercase())
        .collect();
    format!("RIQ-{vintage}-{batch}")
}

fn serial_range(batch_serial: &str, first: i64, last: i64) -> String {
    format!("{batch_serial}/{first:06}-{last:06}")
}

#[allow(clippy::cast_precision_loss)]
fn price_of(credits: i64, price_per_credit: f64) -> f64 {
    round2(credits as f64 * price_per_credit)
}

async fn require_credit_listing<C>(db: &C, id: i64) -> Result<credit_listing::Model>
where
    C: ConnectionTrait,
{
    CreditListing::find_by_id(id)
        .one(db)
        .await?
        .ok_or(Error::CreditListingNotFound { id })
}

/// Escrows `amount` of the session user's points as credits for sale.
///
/// # Errors
/// * [`Error::InvalidAmount`] - `amount` is not positive
/// * [`Error::Validation`] - price not a positive number, or vintage outside
///   2000 to the current year
/// * [`Error::InsufficientPoints`] - the wallet cannot cover `amount`
pub async fn list_credits(
    db: &DatabaseConnection,
    session: &Session,
    offer: NewCreditListing,
) -> Result<credit_listing::Model> {
    if offer.amount <= 0 {
        return Err(Error::InvalidAmount {
            amount: offer.amount,
        });
    }
    if !offer.price_per_credit.is_finite() || offer.price_per_credit <= 0.0 {
        return Err(Error::validation(format!(
            "Price per credit must be a positive number, got {}",
            offer.price_per_credit
        )));
    }
    let now = chrono::Utc::now();
    if !(EARLIEST_VINTAGE..=now.year()).contains(&offer.vintage) {
        return Err(Error::validation(format!(
            "Vintage must be between {EARLIEST_VINTAGE} and {}, got {}",
            now.year(),
            offer.vintage
        )));
    }

    let batch_serial = new_batch_serial(offer.vintage);
    let range = serial_range(&batch_serial, 1, offer.amount);

    let txn = db.begin().await?;
    debit_balance_atomic(&txn, session.user_id(), offer.amount).await?;

    let created = credit_listing::ActiveModel {
        seller_id: Set(session.user_id().to_string()),
        seller_name: Set(session.user_name().to_string()),
        amount: Set(offer.amount),
        initial_amount: Set(offer.amount),
        price_per_credit: Set(offer.price_per_credit),
        standard: Set(SETTLEMENT_STANDARD.to_string()),
        vintage: Set(offer.vintage),
        batch_serial: Set(batch_serial),
        serial_number_range: Set(range.clone()),
        status: Set(CreditListingStatus::Active),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    append_entry(
        &txn,
        session.user_id(),
        LedgerEntry::new(
            -offer.amount,
            format!(
                "Listed {} credits @ ${:.2}",
                offer.amount, offer.price_per_credit
            ),
            PointTransactionKind::Listed,
        )
        .with_standard(SETTLEMENT_STANDARD)
        .with_registry(offer.vintage, range),
    )
    .await?;
    txn.commit().await?;

    info!(
        credit_listing_id = created.id,
        seller_id = session.user_id(),
        amount = offer.amount,
        "Credits listed"
    );
    Ok(created)
}

/// Buys `amount` credits from an active listing. With `retire` the credits are retired
/// on the buyer's behalf instead of landing in their wallet.
///
/// # Errors
/// * [`Error::InvalidAmount`] - `amount` is not positive
/// * [`Error::CreditListingNotFound`]
/// * [`Error::PermissionDenied`] - sellers cannot buy their own credits
/// * [`Error::CreditsUnavailable`] - the listing is closed or has fewer credits left,
///   including when another buyer got there first
pub async fn buy_credits(
    db: &DatabaseConnection,
    session: &Session,
    credit_listing_id: i64,
    amount: i64,
    retire: bool,
) -> Result<CreditPurchase> {
    if amount <= 0 {
        return Err(Error::InvalidAmount { amount });
    }

    let current = require_credit_listing(db, credit_listing_id).await?;
    if current.seller_id == session.user_id() {
        return Err(Error::permission("You cannot buy your own credits"));
    }

    let txn = db.begin().await?;
    let taken = CreditListing::update_many()
        .col_expr(
            credit_listing::Column::Amount,
            Expr::col(credit_listing::Column::Amount).sub(amount),
        )
        .filter(credit_listing::Column::Id.eq(credit_listing_id))
        .filter(credit_listing::Column::Status.eq(CreditListingStatus::Active))
        .filter(credit_listing::Column::Amount.gte(amount))
        .exec(&txn)
        .await?;

    let mut found = require_credit_listing(&txn, credit_listing_id).await?;
    if taken.rows_affected == 0 {
        let available = if found.status == CreditListingStatus::Active {
            found.amount
        } else {
            0
        };
        warn!(credit_listing_id, available, requested = amount, "Credit purchase refused");
        return Err(Error::CreditsUnavailable {
            listing_id: credit_listing_id,
            available,
            requested: amount,
        });
    }

    if found.amount == 0 {
        CreditListing::update_many()
            .set(credit_listing::ActiveModel {
                status: Set(CreditListingStatus::Sold),
                ..Default::default()
            })
            .filter(credit_listing::Column::Id.eq(credit_listing_id))
            .exec(&txn)
            .await?;
        found.status = CreditListingStatus::Sold;
    }

    // Credits are handed out in serial order
    let first = found.initial_amount - found.amount - amount + 1;
    let range = serial_range(&found.batch_serial, first, first + amount - 1);
    let total_price = price_of(amount, found.price_per_credit);

    let seller_entry = append_entry(
        &txn,
        &found.seller_id,
        LedgerEntry::new(
            0,
            format!(
                "Sold {amount} credits to {} for ${total_price:.2}",
                session.user_name()
            ),
            PointTransactionKind::Sold,
        )
        .with_standard(found.standard.clone())
        .with_registry(found.vintage, range.clone()),
    )
    .await?;

    let buyer_entry = if retire {
        append_entry(
            &txn,
            session.user_id(),
            LedgerEntry::new(
                0,
                format!(
                    "Retired {amount} credits ({} {})",
                    found.standard, found.vintage
                ),
                PointTransactionKind::Retired,
            )
            .with_standard(found.standard.clone())
            .with_registry(found.vintage, range)
            .with_verification_hash(verification_hash()),
        )
        .await?
    } else {
        adjust_balance_atomic(&txn, session.user_id(), amount).await?;
        append_entry(
            &txn,
            session.user_id(),
            LedgerEntry::new(
                amount,
                format!("Bought {amount} credits from {}", found.seller_name),
                PointTransactionKind::Bought,
            )
            .with_standard(found.standard.clone())
            .with_registry(found.vintage, range),
        )
        .await?
    };
    txn.commit().await?;

    info!(
        credit_listing_id,
        buyer_id = session.user_id(),
        amount,
        retire,
        total_price,
        "Credits bought"
    );
    Ok(CreditPurchase {
        listing: found,
        seller_entry,
        buyer_entry,
        total_price,
    })
}

/// Takes the session user's listing off the market and refunds the unsold credits.
///
/// # Errors
/// * [`Error::CreditListingNotFound`]
/// * [`Error::PermissionDenied`] - the session user is not the seller
/// * [`Error::CreditsUnavailable`] - the listing is already sold or withdrawn
pub async fn withdraw_credits(
    db: &DatabaseConnection,
    session: &Session,
    credit_listing_id: i64,
) -> Result<credit_listing::Model> {
    let current = require_credit_listing(db, credit_listing_id).await?;
    if current.seller_id != session.user_id() {
        return Err(Error::permission("Only the seller can withdraw credits"));
    }

    let txn = db.begin().await?;
    let closed = CreditListing::update_many()
        .set(credit_listing::ActiveModel {
            status: Set(CreditListingStatus::Withdrawn),
            ..Default::default()
        })
        .filter(credit_listing::Column::Id.eq(credit_listing_id))
        .filter(credit_listing::Column::Status.eq(CreditListingStatus::Active))
        .exec(&txn)
        .await?;

    let withdrawn = require_credit_listing(&txn, credit_listing_id).await?;
    if closed.rows_affected == 0 {
        return Err(Error::CreditsUnavailable {
            listing_id: credit_listing_id,
            available: 0,
            requested: current.amount,
        });
    }

    if withdrawn.amount > 0 {
        adjust_balance_atomic(&txn, session.user_id(), withdrawn.amount).await?;
        append_entry(
            &txn,
            session.user_id(),
            LedgerEntry::new(
                withdrawn.amount,
                format!("Withdrew {} unsold credits", withdrawn.amount),
                PointTransactionKind::Listed,
            )
            .with_standard(withdrawn.standard.clone())
            .with_registry(withdrawn.vintage, withdrawn.serial_number_range.clone()),
        )
        .await?;
    }
    txn.commit().await?;

    info!(credit_listing_id, refunded = withdrawn.amount, "Credits withdrawn");
    Ok(withdrawn)
}

/// Active credit listings, newest first.
pub async fn get_active_credit_listings(
    db: &DatabaseConnection,
) -> Result<Vec<credit_listing::Model>> {
    CreditListing::find()
        .filter(credit_listing::Column::Status.eq(CreditListingStatus::Active))
        .order_by_desc(credit_listing::Column::CreatedAt)
        .order_by_desc(credit_listing::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}
