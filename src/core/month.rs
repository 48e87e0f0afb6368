//! Calendar month value used to bucket activity and assignments.

use crate::errors::{Error, Result};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// A calendar month, stored as its first day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Month(NaiveDate);

impl Month {
    /// Builds a month from a year and a 1-based month number.
    pub fn new(year: i32, month: u32) -> Result<Self> {
        NaiveDate::from_ymd_opt(year, month, 1)
            .map(Self)
            .ok_or_else(|| Error::validation(format!("invalid month {year}-{month:02}")))
    }

    /// The month a date falls in.
    #[must_use]
    pub fn containing(date: NaiveDate) -> Self {
        // Day 1 exists for every month chrono can represent
        Self(date.with_day(1).unwrap_or(date))
    }

    /// First day of the month.
    #[must_use]
    pub const fn first_day(self) -> NaiveDate {
        self.0
    }

    /// The following month.
    pub fn next(self) -> Result<Self> {
        let (year, month) = if self.0.month() == 12 {
            (self.0.year() + 1, 1)
        } else {
            (self.0.year(), self.0.month() + 1)
        };
        Self::new(year, month)
    }

    /// The preceding month.
    pub fn previous(self) -> Result<Self> {
        let (year, month) = if self.0.month() == 1 {
            (self.0.year() - 1, 12)
        } else {
            (self.0.year(), self.0.month() - 1)
        };
        Self::new(year, month)
    }

    /// True if `date` falls within this month.
    #[must_use]
    pub fn contains(self, date: NaiveDate) -> bool {
        Self::containing(date) == self
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.0.year(), self.0.month())
    }
}

impl FromStr for Month {
    type Err = Error;

    /// Parses `YYYY-MM`.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::validation(format!("invalid month '{s}', expected YYYY-MM"));
        let (year, month) = s.split_once('-').ok_or_else(invalid)?;
        if year.len() != 4 || month.len() != 2 {
            return Err(invalid());
        }
        let year = year.parse::<i32>().map_err(|_| invalid())?;
        let month = month.parse::<u32>().map_err(|_| invalid())?;
        Self::new(year, month)
    }
}
