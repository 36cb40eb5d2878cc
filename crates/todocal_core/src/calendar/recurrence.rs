//! Recurrence expansion boundary.
//!
//! # Responsibility
//! - Turn one recurring todo into its occurrence dates inside a range.
//! - Keep rule semantics behind `OccurrenceExpander` so aggregation treats
//!   expansion as a black box.
//!
//! # Invariants
//! - Returned dates are ascending, unique, inside the requested range, not
//!   before the todo anchor and not after `recurrence_end_date`.
//! - Non-recurring todos expand to no dates.

use crate::model::date_range::DateRange;
use crate::model::todo::{CalendarTodo, TodoId};
use chrono::NaiveDate;
use rrule::{RRuleSet, Tz};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Failure to interpret a stored recurrence rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecurrenceError {
    pub todo_id: TodoId,
    pub message: String,
}

impl Display for RecurrenceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid recurrence for todo {}: {}",
            self.todo_id, self.message
        )
    }
}

impl Error for RecurrenceError {}

/// Produces occurrence dates for recurring todos.
pub trait OccurrenceExpander {
    fn occurrence_dates(
        &self,
        todo: &CalendarTodo,
        range: &DateRange,
    ) -> Result<Vec<NaiveDate>, RecurrenceError>;
}

/// `rrule`-backed expander.
///
/// `recurrence` holds either a bare rule body (`FREQ=WEEKLY;BYDAY=MO`) or a
/// block of `RRULE:`/`EXDATE:` lines. The anchor date always becomes the
/// DTSTART; any stored DTSTART line is ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct RRuleExpander;

impl RRuleExpander {
    pub fn new() -> Self {
        Self
    }
}

impl OccurrenceExpander for RRuleExpander {
    fn occurrence_dates(
        &self,
        todo: &CalendarTodo,
        range: &DateRange,
    ) -> Result<Vec<NaiveDate>, RecurrenceError> {
        let Some(rule) = todo.recurrence.as_deref().filter(|r| !r.trim().is_empty()) else {
            return Ok(Vec::new());
        };
        let Some(anchor) = todo.anchor_date() else {
            return Ok(Vec::new());
        };

        let window_start = range.start_date.max(anchor);
        let window_end = match todo.recurrence_end_date {
            Some(until) => range.end_date.min(until),
            None => range.end_date,
        };
        if window_end < window_start {
            return Ok(Vec::new());
        }

        let rule_set: RRuleSet = build_rule_block(anchor, rule)
            .parse::<RRuleSet>()
            .map_err(|err| RecurrenceError {
                todo_id: todo.id,
                message: format!("{err}"),
            })?
            .limit();

        // Occurrences arrive ascending; stop at the window end, not at a count.
        let first_instant = midnight_utc(window_start);
        let mut dates: Vec<NaiveDate> = Vec::new();
        for occurrence in (&rule_set)
            .into_iter()
            .skip_while(|occurrence| *occurrence < first_instant)
        {
            let date = occurrence.date_naive();
            if date > window_end {
                break;
            }
            if dates.last() != Some(&date) {
                dates.push(date);
            }
        }
        Ok(dates)
    }
}

fn midnight_utc(date: NaiveDate) -> chrono::DateTime<Tz> {
    date.and_time(chrono::NaiveTime::MIN)
        .and_utc()
        .with_timezone(&Tz::UTC)
}

fn build_rule_block(anchor: NaiveDate, rule: &str) -> String {
    let mut lines = vec![format!("DTSTART:{}T000000Z", anchor.format("%Y%m%d"))];
    let trimmed = rule.trim();
    if trimmed.contains(':') {
        for line in trimmed.lines().map(str::trim) {
            if line.is_empty() || line.to_ascii_uppercase().starts_with("DTSTART") {
                continue;
            }
            match line.strip_prefix("RRULE:") {
                Some(body) => lines.push(format!("RRULE:{}", normalize_until(body))),
                None => lines.push(normalize_exdate(line)),
            }
        }
    } else {
        lines.push(format!("RRULE:{}", normalize_until(trimmed)));
    }
    lines.join("\n")
}

/// A date-only `UNTIL=YYYYMMDD` is widened to the last second of that UTC
/// day; rrule rejects a floating UNTIL next to a UTC DTSTART.
fn normalize_until(body: &str) -> String {
    body.split(';')
        .map(|part| match part.split_once('=') {
            Some((key, value)) if key.eq_ignore_ascii_case("UNTIL") && is_bare_date(value) => {
                format!("{key}={value}T235959Z")
            }
            _ => part.to_string(),
        })
        .collect::<Vec<_>>()
        .join(";")
}

fn is_bare_date(value: &str) -> bool {
    value.len() == 8 && value.chars().all(|c| c.is_ascii_digit())
}

/// Date-only `EXDATE:YYYYMMDD` values are widened to the UTC midnight form
/// used by DTSTART so they match generated occurrences.
fn normalize_exdate(line: &str) -> String {
    let Some(values) = line.strip_prefix("EXDATE:") else {
        return line.to_string();
    };
    let widened: Vec<String> = values
        .split(',')
        .map(str::trim)
        .map(|value| {
            if is_bare_date(value) {
                format!("{value}T000000Z")
            } else {
                value.to_string()
            }
        })
        .collect();
    format!("EXDATE:{}", widened.join(","))
}
