//! Inclusive day ranges and the 6-week month grid.
//!
//! # Responsibility
//! - Compute the fixed 42-day grid that renders one month.
//! - Provide the interval checks used by aggregation and adapters.
//!
//! # Invariants
//! - `start_date <= end_date` for every constructed range.
//! - Month grids start on the configured week-start day and span 42 days.

use crate::model::month::MonthId;
use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Number of days in a rendered month grid (6 weeks).
pub const GRID_DAYS: u64 = 42;

/// First day of the rendered week.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum WeekStart {
    #[default]
    Sunday,
    Monday,
}

impl WeekStart {
    /// Days since Sunday for this week-start day.
    pub fn days_from_sunday(self) -> u32 {
        match self {
            Self::Sunday => 0,
            Self::Monday => 1,
        }
    }
}

impl From<WeekStart> for u8 {
    fn from(value: WeekStart) -> Self {
        value.days_from_sunday() as u8
    }
}

impl TryFrom<u8> for WeekStart {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Sunday),
            1 => Ok(Self::Monday),
            other => Err(format!(
                "unsupported week start `{other}`; expected 0 (Sunday) or 1 (Monday)"
            )),
        }
    }
}

/// Error returned for inverted range bounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidDateRange {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl Display for InvalidDateRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "range end {} is earlier than start {}",
            self.end_date, self.start_date
        )
    }
}

impl Error for InvalidDateRange {}

/// Inclusive day range, serialized as `YYYY-MM-DD` strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl DateRange {
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> Result<Self, InvalidDateRange> {
        if end_date < start_date {
            return Err(InvalidDateRange {
                start_date,
                end_date,
            });
        }
        Ok(Self {
            start_date,
            end_date,
        })
    }

    /// Range covering exactly one day.
    pub fn single_day(date: NaiveDate) -> Self {
        Self {
            start_date: date,
            end_date: date,
        }
    }

    /// 42-day grid for `month`, anchored on day 1 and extended back to the
    /// week-start day.
    pub fn month_grid(month: MonthId, week_start: WeekStart) -> Self {
        let first = month.first_day();
        let lead = (first.weekday().num_days_from_sunday() + 7 - week_start.days_from_sunday()) % 7;
        let start_date = first
            .checked_sub_days(Days::new(u64::from(lead)))
            .unwrap_or(first);
        let end_date = start_date
            .checked_add_days(Days::new(GRID_DAYS - 1))
            .unwrap_or(NaiveDate::MAX);
        Self {
            start_date,
            end_date,
        }
    }

    /// Smallest range covering every input range; `None` for empty input.
    pub fn covering<I>(ranges: I) -> Option<Self>
    where
        I: IntoIterator<Item = Self>,
    {
        ranges.into_iter().reduce(|acc, range| Self {
            start_date: acc.start_date.min(range.start_date),
            end_date: acc.end_date.max(range.end_date),
        })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }

    /// Interval overlap test against `[start, end]`.
    pub fn overlaps(&self, start: NaiveDate, end: NaiveDate) -> bool {
        start <= self.end_date && end >= self.start_date
    }

    /// Intersection with `[start, end]`, if any.
    pub fn clamp(&self, start: NaiveDate, end: NaiveDate) -> Option<(NaiveDate, NaiveDate)> {
        if !self.overlaps(start, end) {
            return None;
        }
        Some((start.max(self.start_date), end.min(self.end_date)))
    }

    /// Number of days in the range.
    pub fn len_days(&self) -> u64 {
        (self.end_date - self.start_date).num_days() as u64 + 1
    }

    /// Every day in the range, ascending.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end_date;
        self.start_date.iter_days().take_while(move |day| *day <= end)
    }
}

impl Display for DateRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start_date, self.end_date)
    }
}

#[cfg(test)]
mod tests {
    use super::{DateRange, WeekStart, GRID_DAYS};
    use crate::model::month::MonthId;
    use chrono::{Datelike, NaiveDate, Weekday};

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn sunday_grid_starts_on_sunday_and_spans_six_weeks() {
        // 2026-01-01 is a Thursday.
        let grid = DateRange::month_grid(MonthId::new(2026, 1).unwrap(), WeekStart::Sunday);
        assert_eq!(grid.start_date, day(2025, 12, 28));
        assert_eq!(grid.start_date.weekday(), Weekday::Sun);
        assert_eq!(grid.end_date, day(2026, 2, 7));
        assert_eq!(grid.len_days(), GRID_DAYS);
    }

    #[test]
    fn monday_grid_starts_on_monday() {
        let grid = DateRange::month_grid(MonthId::new(2026, 1).unwrap(), WeekStart::Monday);
        assert_eq!(grid.start_date, day(2025, 12, 29));
        assert_eq!(grid.start_date.weekday(), Weekday::Mon);
        assert_eq!(grid.len_days(), GRID_DAYS);
    }

    #[test]
    fn grid_starts_on_day_one_when_aligned() {
        // 2026-02-01 is a Sunday.
        let grid = DateRange::month_grid(MonthId::new(2026, 2).unwrap(), WeekStart::Sunday);
        assert_eq!(grid.start_date, day(2026, 2, 1));
        assert_eq!(grid.end_date, day(2026, 3, 14));
    }

    #[test]
    fn every_grid_has_42_days_across_a_decade() {
        let mut month = MonthId::new(2020, 1).unwrap();
        for _ in 0..120 {
            for week_start in [WeekStart::Sunday, WeekStart::Monday] {
                let grid = DateRange::month_grid(month, week_start);
                assert_eq!(grid.len_days(), GRID_DAYS, "month {month}");
                assert!(grid.contains(month.first_day()));
                assert!(grid.contains(month.last_day()));
            }
            month = month.next().unwrap();
        }
    }

    #[test]
    fn covering_spans_min_start_to_max_end() {
        let a = DateRange::new(day(2026, 1, 5), day(2026, 1, 10)).unwrap();
        let b = DateRange::new(day(2025, 12, 30), day(2026, 1, 7)).unwrap();
        let c = DateRange::new(day(2026, 2, 1), day(2026, 2, 3)).unwrap();
        let covering = DateRange::covering([a, b, c]).unwrap();
        assert_eq!(covering.start_date, day(2025, 12, 30));
        assert_eq!(covering.end_date, day(2026, 2, 3));
        assert!(DateRange::covering(Vec::new()).is_none());
    }

    #[test]
    fn overlap_and_clamp_are_inclusive() {
        let range = DateRange::new(day(2026, 1, 1), day(2026, 1, 31)).unwrap();
        assert!(range.overlaps(day(2025, 12, 1), day(2026, 1, 1)));
        assert!(range.overlaps(day(2026, 1, 31), day(2026, 3, 1)));
        assert!(!range.overlaps(day(2026, 2, 1), day(2026, 2, 2)));
        assert_eq!(
            range.clamp(day(2025, 12, 20), day(2026, 1, 3)),
            Some((day(2026, 1, 1), day(2026, 1, 3)))
        );
    }

    #[test]
    fn rejects_inverted_bounds() {
        assert!(DateRange::new(day(2026, 1, 2), day(2026, 1, 1)).is_err());
    }

    #[test]
    fn week_start_round_trips_through_number() {
        assert_eq!(WeekStart::try_from(1u8), Ok(WeekStart::Monday));
        assert!(WeekStart::try_from(3u8).is_err());
        assert_eq!(u8::from(WeekStart::Sunday), 0);
    }
}
