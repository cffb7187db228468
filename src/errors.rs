//! Unified error type for the crate.
//!
//! Every fallible operation returns [`Result`]. Callers that need to decide how to
//! surface a failure (re-prompt, show a message, give up) use [`Error::kind`] instead
//! of matching on individual variants.

use crate::entities::listing::ListingStatus;
use thiserror::Error;

/// Coarse classification of failures, used by callers to pick a user-facing response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input from the caller; re-prompt.
    Validation,
    /// The target is not in the state the operation expects.
    Precondition,
    /// The caller is not allowed to perform the action.
    Permission,
    /// The referenced record does not exist.
    NotFound,
    /// A collaborator (AI service, payment provider) returned something unusable.
    Upstream,
    /// Storage, configuration or environment failure.
    Internal,
}

/// All errors produced by `replate-core`.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration file or value problem
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the problem
        message: String,
    },

    /// Underlying database failure
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Filesystem failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Missing or invalid environment variable
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    /// Integer conversion failure
    #[error("Integer conversion error: {0}")]
    IntConversion(#[from] std::num::TryFromIntError),

    /// Generic input validation failure
    #[error("Invalid input: {message}")]
    Validation {
        /// Description of what was rejected
        message: String,
    },

    /// A points amount that is zero, negative where positive is required, or otherwise unusable
    #[error("Invalid amount: {amount}")]
    InvalidAmount {
        /// The rejected amount
        amount: i64,
    },

    /// Free-text distance that could not be turned into kilometres
    #[error("Invalid distance: {input:?}")]
    InvalidDistance {
        /// The raw distance string
        input: String,
    },

    /// Claim code that is not four digits
    #[error("Claim code must be 4 digits, got {input:?}")]
    MalformedCode {
        /// The raw code
        input: String,
    },

    /// Claim code that does not match the listing's stored code
    #[error("Invalid Code")]
    InvalidCode {
        /// Listing the code was checked against
        listing_id: i64,
    },

    /// Listing lookup failed
    #[error("Listing not found: {id}")]
    ListingNotFound {
        /// Listing id
        id: i64,
    },

    /// User lookup failed
    #[error("User not found: {id}")]
    UserNotFound {
        /// User id or email
        id: String,
    },

    /// The listing is not in a state that allows the requested transition
    #[error("Listing {id} is {status:?}; expected {expected}")]
    InvalidListingState {
        /// Listing id
        id: i64,
        /// Status observed
        status: ListingStatus,
        /// Human description of the accepted states
        expected: &'static str,
    },

    /// The caller does not own the action
    #[error("Permission denied: {reason}")]
    PermissionDenied {
        /// Why the caller was rejected
        reason: String,
    },

    /// Rating submitted twice for the same hand-off
    #[error("Listing {listing_id} has already been rated")]
    AlreadyRated {
        /// Listing the rating was for
        listing_id: i64,
    },

    /// Credit listing lookup failed
    #[error("Credit listing not found: {id}")]
    CreditListingNotFound {
        /// Credit listing id
        id: i64,
    },

    /// A purchase asked for more credits than the listing still offers
    #[error("Credit listing {listing_id} has {available} credits left, requested {requested}")]
    CreditsUnavailable {
        /// Credit listing id
        listing_id: i64,
        /// Credits left on an active listing, 0 once it is closed
        available: i64,
        /// Credits requested
        requested: i64,
    },

    /// Wallet balance too low for a redemption
    #[error("Insufficient points: balance {balance}, required {required}")]
    InsufficientPoints {
        /// Balance at the time of the attempt
        balance: i64,
        /// Amount requested
        required: i64,
    },

    /// Generative-AI output that failed schema validation
    #[error("Malformed AI response: {message}")]
    MalformedAiResponse {
        /// What was wrong with the payload
        message: String,
    },
}

impl Error {
    /// Classifies the error for the caller.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. }
            | Self::InvalidAmount { .. }
            | Self::InvalidDistance { .. }
            | Self::MalformedCode { .. }
            | Self::InvalidCode { .. } => ErrorKind::Validation,
            Self::InvalidListingState { .. }
            | Self::InsufficientPoints { .. }
            | Self::AlreadyRated { .. }
            | Self::CreditsUnavailable { .. } => ErrorKind::Precondition,
            Self::PermissionDenied { .. } => ErrorKind::Permission,
            Self::ListingNotFound { .. }
            | Self::UserNotFound { .. }
            | Self::CreditListingNotFound { .. } => ErrorKind::NotFound,
            Self::MalformedAiResponse { .. } => ErrorKind::Upstream,
            Self::Config { .. }
            | Self::Database(_)
            | Self::Io(_)
            | Self::EnvVar(_)
            | Self::IntConversion(_) => ErrorKind::Internal,
        }
    }

    pub(crate) fn permission(reason: impl Into<String>) -> Self {
        Self::PermissionDenied {
            reason: reason.into(),
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
