//! Compatibility dates.
//!
//! A compatibility date pins a route (or a request) to the behaviour in effect
//! as of that day. Only the strict `YYYY-MM-DD` form is accepted: exactly ten
//! characters, zero-padded, and a real calendar day.

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, Utc};
use serde::{Serialize, Serializer};

use crate::error::Error;

/// A calendar day in `YYYY-MM-DD` form.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct CompatibilityDate(NaiveDate);

impl CompatibilityDate {
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    /// Today's date in UTC.
    pub fn today() -> Self {
        Self(Utc::now().date_naive())
    }

    /// Whether this date lies after today (UTC).
    pub fn is_future(self) -> bool {
        self > Self::today()
    }

    pub fn as_naive(self) -> NaiveDate {
        self.0
    }
}

impl FromStr for CompatibilityDate {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidCompatibilityDate(s.to_owned());
        let well_formed = s.len() == 10
            && s.bytes().enumerate().all(|(i, b)| match i {
                4 | 7 => b == b'-',
                _ => b.is_ascii_digit(),
            });
        if !well_formed {
            return Err(invalid());
        }
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Self)
            .map_err(|_| invalid())
    }
}

impl fmt::Display for CompatibilityDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl Serialize for CompatibilityDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Whether a route dated `route` serves a request dated `requested`.
///
/// Undated routes serve everyone. A dated route serves only requests that
/// carry a date on or after its own.
pub(crate) fn serves(requested: Option<CompatibilityDate>, route: Option<CompatibilityDate>) -> bool {
    match (requested, route) {
        (_, None) => true,
        (None, Some(_)) => false,
        (Some(requested), Some(route)) => route <= requested,
    }
}
