//! Month identity model.
//!
//! # Responsibility
//! - Provide the canonical `YYYY-MM` month key used by window, cache and
//!   aggregation layers.
//! - Provide month arithmetic with year rollover in both directions.
//!
//! # Invariants
//! - `year` is within `0..=9999` and `month` within `1..=12`, so the text
//!   form is always zero-padded and lexicographic order equals time order.
//! - `MonthMetadata` is immutable once created.

use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

static MONTH_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})-(\d{2})$").expect("valid month id regex"));

const MIN_YEAR: i32 = 0;
const MAX_YEAR: i32 = 9999;

/// Error returned when a month key cannot be parsed or constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonthIdError {
    /// Text is not in `YYYY-MM` form.
    Malformed(String),
    /// Year or month component is out of range.
    OutOfRange { year: i32, month: u32 },
}

impl Display for MonthIdError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Malformed(value) => write!(f, "invalid month id `{value}`; expected YYYY-MM"),
            Self::OutOfRange { year, month } => {
                write!(f, "month out of range: year={year} month={month}")
            }
        }
    }
}

impl Error for MonthIdError {}

/// Canonical month key, rendered as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct MonthId {
    year: i32,
    month: u32,
}

impl MonthId {
    /// Creates a month key from numeric parts.
    pub fn new(year: i32, month: u32) -> Result<Self, MonthIdError> {
        if !(MIN_YEAR..=MAX_YEAR).contains(&year) || !(1..=12).contains(&month) {
            return Err(MonthIdError::OutOfRange { year, month });
        }
        Ok(Self { year, month })
    }

    /// Month containing `date`.
    ///
    /// Dates outside the supported year range clamp to the nearest bound.
    pub fn from_date(date: NaiveDate) -> Self {
        if date.year() < MIN_YEAR {
            return Self {
                year: MIN_YEAR,
                month: 1,
            };
        }
        if date.year() > MAX_YEAR {
            return Self {
                year: MAX_YEAR,
                month: 12,
            };
        }
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// Returns the month `delta` months away, or `None` past the supported
    /// year range.
    pub fn checked_offset(&self, delta: i32) -> Option<Self> {
        let index = i64::from(self.year) * 12 + i64::from(self.month) - 1 + i64::from(delta);
        let year = index.div_euclid(12);
        let month = index.rem_euclid(12) + 1;
        let year = i32::try_from(year).ok()?;
        Self::new(year, month as u32).ok()
    }

    /// Next calendar month.
    pub fn next(&self) -> Option<Self> {
        self.checked_offset(1)
    }

    /// Previous calendar month.
    pub fn prev(&self) -> Option<Self> {
        self.checked_offset(-1)
    }

    /// First day of this month.
    pub fn first_day(&self) -> NaiveDate {
        // Constructor bounds keep year/month inside chrono's representable range.
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    /// Last day of this month.
    pub fn last_day(&self) -> NaiveDate {
        match self.next() {
            Some(next) => next.first_day().pred_opt().unwrap_or(NaiveDate::MAX),
            None => NaiveDate::from_ymd_opt(MAX_YEAR, 12, 31).unwrap_or(NaiveDate::MAX),
        }
    }
}

impl Display for MonthId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for MonthId {
    type Err = MonthIdError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let captures = MONTH_ID_RE
            .captures(trimmed)
            .ok_or_else(|| MonthIdError::Malformed(trimmed.to_string()))?;
        let year = captures[1]
            .parse::<i32>()
            .map_err(|_| MonthIdError::Malformed(trimmed.to_string()))?;
        let month = captures[2]
            .parse::<u32>()
            .map_err(|_| MonthIdError::Malformed(trimmed.to_string()))?;
        Self::new(year, month)
    }
}

impl From<MonthId> for String {
    fn from(value: MonthId) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for MonthId {
    type Error = MonthIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Immutable month descriptor held by the month window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct MonthMetadata {
    pub year: i32,
    pub month: u32,
    pub id: MonthId,
}

impl MonthMetadata {
    pub fn from_id(id: MonthId) -> Self {
        Self {
            year: id.year(),
            month: id.month(),
            id,
        }
    }

    /// Metadata for the month containing `date`.
    pub fn from_date(date: NaiveDate) -> Self {
        Self::from_id(MonthId::from_date(date))
    }

    /// Metadata `delta` months away; `delta == 0` returns `self`.
    pub fn checked_offset(&self, delta: i32) -> Option<Self> {
        if delta == 0 {
            return Some(*self);
        }
        self.id.checked_offset(delta).map(Self::from_id)
    }
}
