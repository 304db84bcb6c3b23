//! Structural validation of caller-supplied claims.
//!
//! Claims are checked for shape here, before any database round trip. Whether
//! a claim is *true* is decided by the guard queries in the gateway.

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClaimError {
    #[error("claimed name is empty")]
    EmptyName,

    #[error("'{0}' is not a date in YYYY-MM-DD form")]
    InvalidDate(String),
}

/// A trimmed, non-empty name claimed to belong to some record.
///
/// Accent and case folding is left to the database (`unaccent`), so the
/// claim keeps its original spelling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameClaim(String);

impl NameClaim {
    pub fn parse(raw: &str) -> Result<Self, ClaimError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ClaimError::EmptyName);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NameClaim {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A calendar date claimed for an activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ActivityDate(NaiveDate);

impl ActivityDate {
    pub fn parse(raw: &str) -> Result<Self, ClaimError> {
        NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
            .map(Self)
            .map_err(|_| ClaimError::InvalidDate(raw.to_string()))
    }

    pub fn date(self) -> NaiveDate {
        self.0
    }
}

impl std::fmt::Display for ActivityDate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}
