//! Four-digit hand-off codes.
//!
//! A code is minted when a listing is claimed and read off the receiver's phone by the
//! giver at pickup. It is social friction, not authentication, so `rand`'s thread RNG is
//! enough.

use crate::errors::{Error, Result};
use rand::Rng;
use std::fmt;

/// A four-digit numeric claim code.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClaimCode(String);

impl ClaimCode {
    /// Mints a new code, uniform over `1000..=9999`.
    #[must_use]
    pub fn generate() -> Self {
        let value: u16 = rand::rng().random_range(1000..=9999);
        Self(value.to_string())
    }

    /// Validates user input. Surrounding whitespace is ignored.
    ///
    /// # Errors
    /// [`Error::MalformedCode`] unless the input is exactly four ASCII digits.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        if trimmed.len() == 4 && trimmed.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(trimmed.to_string()))
        } else {
            Err(Error::MalformedCode {
                input: input.to_string(),
            })
        }
    }

    /// The code as stored on the listing.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClaimCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<ClaimCode> for String {
    fn from(code: ClaimCode) -> Self {
        code.0
    }
}
