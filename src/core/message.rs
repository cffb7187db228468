//! Listing chat - Messages between a giver and a receiver about one listing.
//!
//! Every conversation has the listing's giver on one side. Claim and unclaim post
//! their system messages through [`send_message`] on the same transaction as the
//! status change, so a claim that loses a race leaves no message behind.

use crate::{
    core::{session::Session, user::require_user},
    entities::{Listing, Message, message},
    errors::{Error, Result},
};
use sea_orm::{Condition, QueryOrder, Set, prelude::*};
use tracing::debug;

const MAX_MESSAGE_CHARS: usize = 2000;

/// Sends `text` about `listing_id` from the session user to `receiver_id`.
///
/// # Errors
/// * [`Error::Validation`] - empty or overlong text, or a message to oneself
/// * [`Error::ListingNotFound`] / [`Error::UserNotFound`]
/// * [`Error::PermissionDenied`] - neither side is the listing's giver
pub async fn send_message<C>(
    db: &C,
    session: &Session,
    listing_id: i64,
    receiver_id: &str,
    text: &str,
) -> Result<message::Model>
where
    C: ConnectionTrait,
{
    let text = text.trim();
    if text.is_empty() {
        return Err(Error::validation("Message cannot be empty"));
    }
    if text.chars().count() > MAX_MESSAGE_CHARS {
        return Err(Error::validation(format!(
            "Message is longer than {MAX_MESSAGE_CHARS} characters"
        )));
    }
    if receiver_id == session.user_id() {
        return Err(Error::validation("You cannot message yourself"));
    }

    let about = Listing::find_by_id(listing_id)
        .one(db)
        .await?
        .ok_or(Error::ListingNotFound { id: listing_id })?;
    if about.giver_id != session.user_id() && about.giver_id != receiver_id {
        return Err(Error::permission(
            "Messages about a listing must be to or from its giver",
        ));
    }
    require_user(db, receiver_id).await?;

    let model = message::ActiveModel {
        listing_id: Set(listing_id),
        sender_id: Set(session.user_id().to_string()),
        sender_name: Set(session.user_name().to_string()),
        receiver_id: Set(receiver_id.to_string()),
        text: Set(text.to_string()),
        timestamp: Set(chrono::Utc::now()),
        ..Default::default()
    };

    let sent = model.insert(db).await?;
    debug!(listing_id, message_id = sent.id, "Message sent");
    Ok(sent)
}

/// The conversation between the session user and `other_user_id` about one listing,
/// oldest first.
pub async fn get_conversation(
    db: &DatabaseConnection,
    session: &Session,
    listing_id: i64,
    other_user_id: &str,
) -> Result<Vec<message::Model>> {
    let me = session.user_id();
    let between = Condition::any()
        .add(
            Condition::all()
                .add(message::Column::SenderId.eq(me))
                .add(message::Column::ReceiverId.eq(other_user_id)),
        )
        .add(
            Condition::all()
                .add(message::Column::SenderId.eq(other_user_id))
                .add(message::Column::ReceiverId.eq(me)),
        );

    Message::find()
        .filter(message::Column::ListingId.eq(listing_id))
        .filter(between)
        .order_by_asc(message::Column::Timestamp)
        .order_by_asc(message::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}
