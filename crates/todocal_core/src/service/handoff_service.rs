//! Canonical range aggregation ("handoff") building.
//!
//! # Responsibility
//! - Run one range aggregation pass and bucket every todo occurrence by day.
//! - Join completion state by completion key and attach sync staleness.
//!
//! # Invariants
//! - A `HandoffResult` is never mutated after it is built; consumers only
//!   borrow it.
//! - Gateway failures produce `ok == false` with empty buckets; they never
//!   escape as errors.
//! - Period todos appear in every covered day bucket; recurring todos appear
//!   once per occurrence date.

use crate::calendar::recurrence::OccurrenceExpander;
use crate::model::date_range::DateRange;
use crate::model::todo::{
    completion_key, CalendarTodo, Category, CategoryId, CompletionCandidateRow, TodoId, TodoShape,
};
use crate::repo::range_gateway::RangeQueryGateway;
use crate::sync::status::{HandoffMeta, SyncStatusSource};
use chrono::{NaiveDate, NaiveTime};
use log::{info, warn};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::time::Instant;
use uuid::Uuid;

/// Which entry point built a handoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HandoffMode {
    Range,
    Date,
}

/// One todo occurrence placed in a day bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregatedItem {
    pub todo_id: TodoId,
    /// `<todoId>_<YYYY-MM-DD>` for recurring occurrences, the todo id otherwise.
    pub id: String,
    pub title: String,
    /// Occurrence date for recurring todos, the stored date otherwise.
    pub date: Option<NaiveDate>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub is_all_day: bool,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub is_recurring: bool,
    pub recurrence: Option<String>,
    pub recurrence_end_date: Option<NaiveDate>,
    pub category_id: Option<CategoryId>,
    pub category: Option<Category>,
    pub completion_key: String,
    pub completed: bool,
    pub completion_id: Option<Uuid>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Row counts collected while building one handoff.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HandoffStages {
    pub todo_candidates: usize,
    pub completion_candidates: usize,
    /// Recurring todos passed to the expander successfully.
    pub recurring_expanded: usize,
    /// Items placed across all buckets.
    pub items: usize,
}

/// Elapsed time per phase, in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HandoffTimings {
    pub query_ms: u64,
    pub expand_ms: u64,
    pub total_ms: u64,
}

/// Immutable output of one aggregation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HandoffResult {
    ok: bool,
    mode: HandoffMode,
    range: DateRange,
    target_date: Option<NaiveDate>,
    items_by_date: BTreeMap<NaiveDate, Vec<AggregatedItem>>,
    meta: HandoffMeta,
    stages: HandoffStages,
    timings: HandoffTimings,
    diagnostics: Vec<String>,
    error: Option<String>,
}

impl HandoffResult {
    pub fn ok(&self) -> bool {
        self.ok
    }

    pub fn mode(&self) -> HandoffMode {
        self.mode
    }

    /// Queried range; a single day in date mode.
    pub fn range(&self) -> &DateRange {
        &self.range
    }

    pub fn target_date(&self) -> Option<NaiveDate> {
        self.target_date
    }

    pub fn items_by_date(&self) -> &BTreeMap<NaiveDate, Vec<AggregatedItem>> {
        &self.items_by_date
    }

    /// Items of one day; empty when the day has none.
    pub fn items_on(&self, date: NaiveDate) -> &[AggregatedItem] {
        self.items_by_date
            .get(&date)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn meta(&self) -> &HandoffMeta {
        &self.meta
    }

    pub fn stages(&self) -> &HandoffStages {
        &self.stages
    }

    pub fn timings(&self) -> &HandoffTimings {
        &self.timings
    }

    pub fn diagnostics(&self) -> &[String] {
        &self.diagnostics
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

/// Builds a handoff over `range`.
pub fn build_range_handoff<G>(
    gateway: &G,
    expander: &dyn OccurrenceExpander,
    range: DateRange,
    sync: &dyn SyncStatusSource,
) -> HandoffResult
where
    G: RangeQueryGateway + ?Sized,
{
    build(gateway, expander, HandoffMode::Range, range, None, sync)
}

/// Builds a handoff for the single day `date`.
pub fn build_date_handoff<G>(
    gateway: &G,
    expander: &dyn OccurrenceExpander,
    date: NaiveDate,
    sync: &dyn SyncStatusSource,
) -> HandoffResult
where
    G: RangeQueryGateway + ?Sized,
{
    build(
        gateway,
        expander,
        HandoffMode::Date,
        DateRange::single_day(date),
        Some(date),
        sync,
    )
}

fn build<G>(
    gateway: &G,
    expander: &dyn OccurrenceExpander,
    mode: HandoffMode,
    range: DateRange,
    target_date: Option<NaiveDate>,
    sync: &dyn SyncStatusSource,
) -> HandoffResult
where
    G: RangeQueryGateway + ?Sized,
{
    let started_at = Instant::now();
    let meta = HandoffMeta::from(sync.snapshot());
    let mut result = HandoffResult {
        ok: true,
        mode,
        range,
        target_date,
        items_by_date: BTreeMap::new(),
        meta,
        stages: HandoffStages::default(),
        timings: HandoffTimings::default(),
        diagnostics: Vec::new(),
        error: None,
    };

    let queried = gateway.query_todo_candidates(&range).and_then(|todos| {
        let completions = gateway.query_completion_candidates(&range)?;
        Ok((todos, completions))
    });
    result.timings.query_ms = elapsed_ms(started_at);

    let (todo_rows, completion_rows) = match queried {
        Ok(rows) => rows,
        Err(err) => {
            result.ok = false;
            result.error = Some(err.to_string());
            result.timings.total_ms = elapsed_ms(started_at);
            warn!(
                "event=handoff_build module=service status=degraded mode={:?} range={} stale={} error={}",
                mode, range, meta.is_stale, err
            );
            return result;
        }
    };

    result.stages.todo_candidates = todo_rows.len();
    result.stages.completion_candidates = completion_rows.len();
    let completions: HashMap<String, CompletionCandidateRow> = completion_rows
        .into_iter()
        .map(|row| (row.key.clone(), row))
        .collect();

    let expand_started_at = Instant::now();
    for row in todo_rows {
        let todo = CalendarTodo::from(row);
        match todo.shape() {
            TodoShape::Recurring => match expander.occurrence_dates(&todo, &range) {
                Ok(dates) => {
                    result.stages.recurring_expanded += 1;
                    for date in dates {
                        place(&mut result, &todo, date, Some(date), &completions);
                    }
                }
                Err(err) => {
                    result.diagnostics.push(format!(
                        "recurrence_skipped todo={} reason={}",
                        todo.id, err.message
                    ));
                }
            },
            TodoShape::Period => {
                let (Some(start), Some(end)) = (todo.start_date, todo.end_date) else {
                    continue;
                };
                if let Some((from, to)) = range.clamp(start, end) {
                    for day in from.iter_days().take_while(|day| *day <= to) {
                        place(&mut result, &todo, day, None, &completions);
                    }
                }
            }
            TodoShape::Single => {
                if let Some(day) = todo.date.or(todo.start_date) {
                    if range.contains(day) {
                        place(&mut result, &todo, day, None, &completions);
                    }
                }
            }
            TodoShape::Undated => {
                result
                    .diagnostics
                    .push(format!("undated_skipped todo={}", todo.id));
            }
        }
    }
    result.timings.expand_ms = elapsed_ms(expand_started_at);

    for items in result.items_by_date.values_mut() {
        items.sort_by(compare_day_order);
    }
    result.timings.total_ms = elapsed_ms(started_at);

    info!(
        "event=handoff_build module=service status=ok mode={:?} range={} todo_candidates={} completion_candidates={} recurring_expanded={} items={} diagnostics={} stale={} duration_ms={}",
        mode,
        range,
        result.stages.todo_candidates,
        result.stages.completion_candidates,
        result.stages.recurring_expanded,
        result.stages.items,
        result.diagnostics.len(),
        meta.is_stale,
        result.timings.total_ms
    );
    result
}

fn place(
    result: &mut HandoffResult,
    todo: &CalendarTodo,
    bucket: NaiveDate,
    occurrence: Option<NaiveDate>,
    completions: &HashMap<String, CompletionCandidateRow>,
) {
    let item = aggregated_item(todo, occurrence, completions);
    result.items_by_date.entry(bucket).or_default().push(item);
    result.stages.items += 1;
}

fn aggregated_item(
    todo: &CalendarTodo,
    occurrence: Option<NaiveDate>,
    completions: &HashMap<String, CompletionCandidateRow>,
) -> AggregatedItem {
    let is_recurring = occurrence.is_some();
    let (id, key) = match occurrence {
        Some(date) => (
            format!("{}_{}", todo.id, date.format("%Y-%m-%d")),
            todo.completion_key(date),
        ),
        None => (todo.id.to_string(), completion_key(todo.id, None)),
    };
    let completion = completions.get(&key);
    AggregatedItem {
        todo_id: todo.id,
        id,
        title: todo.title.clone(),
        date: occurrence.or(todo.date),
        start_date: todo.start_date,
        end_date: todo.end_date,
        is_all_day: todo.is_all_day,
        start_time: todo.start_time,
        end_time: todo.end_time,
        is_recurring,
        recurrence: todo.recurrence.clone(),
        recurrence_end_date: todo.recurrence_end_date,
        category_id: todo.category_id,
        category: todo.category.clone(),
        completion_key: key,
        completed: completion.is_some(),
        completion_id: completion.map(|row| row.id),
        created_at: todo.created_at,
        updated_at: todo.updated_at,
    }
}

/// All-day first, then by start time (untimed last), then title.
fn compare_day_order(a: &AggregatedItem, b: &AggregatedItem) -> Ordering {
    b.is_all_day
        .cmp(&a.is_all_day)
        .then_with(|| match (a.start_time, b.start_time) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| a.title.cmp(&b.title))
}

fn elapsed_ms(since: Instant) -> u64 {
    u64::try_from(since.elapsed().as_millis()).unwrap_or(u64::MAX)
}
