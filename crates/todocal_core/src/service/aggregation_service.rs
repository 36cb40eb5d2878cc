//! Batch aggregation of calendar months.
//!
//! # Responsibility
//! - Collapse N requested months into one covering date range and exactly two
//!   gateway queries.
//! - Attribute each todo to every month whose grid overlaps it, and each
//!   completion to every month whose grid contains its date.
//!
//! # Invariants
//! - Every requested month is present in the result, even with no matches
//!   and even when the gateway fails.
//! - Open-ended recurrences extend to the query horizon (the covering
//!   range's end) and never beyond it.
//! - Todos within a month are ordered by date, all-day first, then start
//!   time; the sort is stable.

use crate::model::date_range::{DateRange, WeekStart};
use crate::model::month::MonthId;
use crate::model::todo::{CalendarTodo, CompletionRecord, MonthData, TodoShape};
use crate::repo::range_gateway::{GatewayError, RangeQueryGateway};
use chrono::NaiveDate;
use log::{info, warn};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

/// Detailed result of one aggregation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchAggregation {
    /// One entry per requested month.
    pub months: BTreeMap<MonthId, MonthData>,
    /// Range passed to the gateway; `None` when no months were requested.
    pub global_range: Option<DateRange>,
    pub todo_candidates: usize,
    pub completion_candidates: usize,
    /// Candidates with no usable date, left out of every month.
    pub skipped_undated: usize,
    /// `true` when the gateway failed and every month was returned empty.
    pub degraded: bool,
    pub error: Option<String>,
}

/// Month aggregation service over an injected gateway.
pub struct BatchAggregationService<G> {
    gateway: G,
}

impl<G: RangeQueryGateway> BatchAggregationService<G> {
    pub fn new(gateway: G) -> Self {
        Self { gateway }
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Aggregates `month_ids` into per-month todo lists and completion maps.
    ///
    /// Never fails: gateway errors degrade to empty entries for every
    /// requested month.
    pub fn aggregate<I>(&self, month_ids: I, week_start: WeekStart) -> BTreeMap<MonthId, MonthData>
    where
        I: IntoIterator<Item = MonthId>,
    {
        self.aggregate_detailed(month_ids, week_start).months
    }

    /// Same as [`Self::aggregate`] with query statistics attached.
    pub fn aggregate_detailed<I>(&self, month_ids: I, week_start: WeekStart) -> BatchAggregation
    where
        I: IntoIterator<Item = MonthId>,
    {
        let started_at = Instant::now();
        let requested: BTreeSet<MonthId> = month_ids.into_iter().collect();
        let grids: Vec<(MonthId, DateRange)> = requested
            .iter()
            .map(|id| (*id, DateRange::month_grid(*id, week_start)))
            .collect();
        let empty_months: BTreeMap<MonthId, MonthData> = requested
            .iter()
            .map(|id| (*id, MonthData::default()))
            .collect();

        let Some(global_range) = DateRange::covering(grids.iter().map(|(_, grid)| *grid)) else {
            return BatchAggregation {
                months: empty_months,
                global_range: None,
                todo_candidates: 0,
                completion_candidates: 0,
                skipped_undated: 0,
                degraded: false,
                error: None,
            };
        };

        info!(
            "event=batch_aggregate module=service status=start months={} range={}",
            grids.len(),
            global_range
        );

        let (todo_rows, completion_rows) = match self.query(&global_range) {
            Ok(rows) => rows,
            Err(err) => {
                warn!(
                    "event=batch_aggregate module=service status=degraded months={} range={} duration_ms={} error={}",
                    grids.len(),
                    global_range,
                    started_at.elapsed().as_millis(),
                    err
                );
                return BatchAggregation {
                    months: empty_months,
                    global_range: Some(global_range),
                    todo_candidates: 0,
                    completion_candidates: 0,
                    skipped_undated: 0,
                    degraded: true,
                    error: Some(err.to_string()),
                };
            }
        };

        let todo_candidates = todo_rows.len();
        let completion_candidates = completion_rows.len();
        let mut months = empty_months;
        let mut skipped_undated = 0;

        for row in todo_rows {
            let todo = CalendarTodo::from(row);
            let Some((start, end)) = effective_span(&todo, &global_range) else {
                skipped_undated += 1;
                continue;
            };
            for (id, grid) in &grids {
                if grid.overlaps(start, end) {
                    if let Some(entry) = months.get_mut(id) {
                        entry.todos.push(todo.clone());
                    }
                }
            }
        }

        for row in completion_rows {
            let record = CompletionRecord::from(row);
            for (id, grid) in &grids {
                if grid.contains(record.date) {
                    if let Some(entry) = months.get_mut(id) {
                        entry.completions.insert(record.key.clone(), record.clone());
                    }
                }
            }
        }

        for entry in months.values_mut() {
            entry.todos.sort_by(compare_month_order);
        }

        info!(
            "event=batch_aggregate module=service status=ok months={} range={} todo_candidates={} completion_candidates={} skipped_undated={} duration_ms={}",
            months.len(),
            global_range,
            todo_candidates,
            completion_candidates,
            skipped_undated,
            started_at.elapsed().as_millis()
        );

        BatchAggregation {
            months,
            global_range: Some(global_range),
            todo_candidates,
            completion_candidates,
            skipped_undated,
            degraded: false,
            error: None,
        }
    }

    fn query(
        &self,
        range: &DateRange,
    ) -> Result<
        (
            Vec<crate::model::todo::TodoCandidateRow>,
            Vec<crate::model::todo::CompletionCandidateRow>,
        ),
        GatewayError,
    > {
        let todos = self.gateway.query_todo_candidates(range)?;
        let completions = self.gateway.query_completion_candidates(range)?;
        Ok((todos, completions))
    }
}

/// `[start, end]` a todo can occupy, or `None` when it has no usable date.
///
/// Recurring todos without `recurrence_end_date` end at `horizon.end_date`.
pub fn effective_span(todo: &CalendarTodo, horizon: &DateRange) -> Option<(NaiveDate, NaiveDate)> {
    match todo.shape() {
        TodoShape::Recurring => {
            let start = todo.anchor_date()?;
            let end = todo.recurrence_end_date.unwrap_or(horizon.end_date);
            (end >= start).then_some((start, end))
        }
        TodoShape::Period | TodoShape::Single => {
            let start = todo.start_date.or(todo.date)?;
            let end = todo.end_date.or(todo.date).unwrap_or(start);
            Some((start, end.max(start)))
        }
        TodoShape::Undated => None,
    }
}

/// Rendering order inside one month: date, all-day first, then start time.
///
/// Undated entries and timed entries without a start time sort last within
/// their group.
pub fn compare_month_order(a: &CalendarTodo, b: &CalendarTodo) -> Ordering {
    compare_optional_last(a.sort_date(), b.sort_date())
        .then_with(|| b.is_all_day.cmp(&a.is_all_day))
        .then_with(|| compare_optional_last(a.start_time, b.start_time))
}

fn compare_optional_last<T: Ord>(a: Option<T>, b: Option<T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::{compare_month_order, effective_span};
    use crate::model::date_range::DateRange;
    use crate::model::todo::CalendarTodo;
    use chrono::{NaiveDate, NaiveTime};
    use uuid::Uuid;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn todo_on(date: NaiveDate) -> CalendarTodo {
        CalendarTodo {
            id: Uuid::new_v4(),
            title: "t".to_string(),
            date: Some(date),
            start_date: None,
            end_date: None,
            is_all_day: true,
            start_time: None,
            end_time: None,
            recurrence: None,
            recurrence_end_date: None,
            category_id: None,
            category: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn open_recurrence_ends_at_horizon() {
        let mut todo = todo_on(day(2026, 1, 5));
        todo.recurrence = Some("FREQ=DAILY".to_string());
        let horizon = DateRange::new(day(2025, 12, 28), day(2026, 3, 14)).unwrap();
        assert_eq!(
            effective_span(&todo, &horizon),
            Some((day(2026, 1, 5), day(2026, 3, 14)))
        );

        todo.recurrence_end_date = Some(day(2026, 1, 20));
        assert_eq!(
            effective_span(&todo, &horizon),
            Some((day(2026, 1, 5), day(2026, 1, 20)))
        );
    }

    #[test]
    fn order_is_date_then_all_day_then_time() {
        let base = day(2026, 1, 5);
        let mut timed_late = todo_on(base);
        timed_late.is_all_day = false;
        timed_late.start_time = NaiveTime::from_hms_opt(15, 0, 0);
        let mut timed_early = todo_on(base);
        timed_early.is_all_day = false;
        timed_early.start_time = NaiveTime::from_hms_opt(8, 0, 0);
        let all_day = todo_on(base);
        let earlier_day = todo_on(day(2026, 1, 4));

        let mut todos = vec![
            timed_late.clone(),
            all_day.clone(),
            timed_early.clone(),
            earlier_day.clone(),
        ];
        todos.sort_by(compare_month_order);
        let ids: Vec<Uuid> = todos.iter().map(|todo| todo.id).collect();
        assert_eq!(
            ids,
            vec![earlier_day.id, all_day.id, timed_early.id, timed_late.id]
        );
    }

    #[test]
    fn equal_keys_keep_input_order() {
        let first = todo_on(day(2026, 1, 5));
        let second = todo_on(day(2026, 1, 5));
        let mut todos = vec![first.clone(), second.clone()];
        todos.sort_by(compare_month_order);
        assert_eq!(todos[0].id, first.id);
        assert_eq!(todos[1].id, second.id);
    }
}
