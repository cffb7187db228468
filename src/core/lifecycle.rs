//! Listing state machine.
//!
//! The table below is the single source of truth for which transitions exist. Who may
//! trigger them (giver or claimer) is checked by the operations in
//! [`crate::core::listing`] and [`crate::core::settlement`].
//!
//! | From                 | Event       | To        |
//! |----------------------|-------------|-----------|
//! | available            | claim       | claimed   |
//! | claimed              | submit code | completed |
//! | claimed              | unclaim     | available |
//! | available, claimed   | delete      | deleted   |

pub use crate::entities::ListingStatus;
use crate::entities::ListingModel;
use crate::errors::{Error, Result};

/// Something a user does to a listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingEvent {
    /// Receiver reserves the listing
    Claim,
    /// Giver enters the receiver's code
    SubmitCode,
    /// Claimer releases the reservation
    Unclaim,
    /// Giver withdraws the listing
    Delete,
}

impl ListingEvent {
    /// States from which this event is accepted, for error messages.
    #[must_use]
    pub const fn expected_states(self) -> &'static str {
        match self {
            Self::Claim => "available",
            Self::SubmitCode | Self::Unclaim => "claimed",
            Self::Delete => "available or claimed",
        }
    }
}

impl ListingStatus {
    /// `completed` and `deleted` accept no further events.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Deleted)
    }
}

/// Looks up the transition table. `None` means the event is not allowed from `from`.
#[must_use]
pub const fn next_status(from: ListingStatus, event: ListingEvent) -> Option<ListingStatus> {
    use ListingEvent as E;
    use ListingStatus as S;

    match (from, event) {
        (S::Available, E::Claim) => Some(S::Claimed),
        (S::Claimed, E::SubmitCode) => Some(S::Completed),
        (S::Claimed, E::Unclaim) => Some(S::Available),
        (S::Available | S::Claimed, E::Delete) => Some(S::Deleted),
        _ => None,
    }
}

/// Checks that `event` may be applied to `listing` and returns the resulting status.
///
/// # Errors
/// [`Error::InvalidListingState`] when the table has no entry.
pub fn ensure_transition(listing: &ListingModel, event: ListingEvent) -> Result<ListingStatus> {
    next_status(listing.status, event).ok_or(Error::InvalidListingState {
        id: listing.id,
        status: listing.status,
        expected: event.expected_states(),
    })
}
