//! Month grid adapter.
//!
//! # Invariants
//! - Every requested month is present in the output, also when the handoff
//!   failed.
//! - Within one month an item appears at most once per
//!   `(id, occurrence_date)`, even when several day buckets of the handoff
//!   fall into that month's grid.

use super::category_color;
use crate::model::date_range::{DateRange, WeekStart};
use crate::model::month::MonthId;
use crate::model::todo::TodoId;
use crate::service::handoff_service::{AggregatedItem, HandoffResult};
use crate::sync::status::HandoffMeta;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use uuid::Uuid;

/// Handoff item normalized for grid rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GridItem {
    #[serde(flatten)]
    pub item: AggregatedItem,
    /// Occurrence date for recurring items, start day for periods.
    pub occurrence_date: NaiveDate,
    pub category_color: String,
}

/// Completion lookup value, keyed by completion key in [`GridMonth`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GridCompletion {
    pub completion_id: Option<Uuid>,
    pub todo_id: TodoId,
    pub occurrence_date: NaiveDate,
    pub completed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GridMonth {
    pub todos: Vec<GridItem>,
    pub completions: BTreeMap<String, GridCompletion>,
}

/// Grid view over a set of months.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GridView {
    pub ok: bool,
    pub months: BTreeMap<MonthId, GridMonth>,
    pub meta: HandoffMeta,
    pub error: Option<String>,
}

/// Redistributes `handoff` into the grids of `months`.
pub fn adapt_grid(handoff: &HandoffResult, months: &[MonthId], week_start: WeekStart) -> GridView {
    let grids: Vec<(MonthId, DateRange)> = months
        .iter()
        .map(|id| (*id, DateRange::month_grid(*id, week_start)))
        .collect();
    let mut out: BTreeMap<MonthId, GridMonth> = months
        .iter()
        .map(|id| (*id, GridMonth::default()))
        .collect();

    if handoff.ok() {
        let mut seen: BTreeMap<MonthId, HashSet<(String, NaiveDate)>> = BTreeMap::new();
        for (bucket, items) in handoff.items_by_date() {
            for item in items {
                let normalized = normalize(item, *bucket);
                for (id, grid) in &grids {
                    if !grid.contains(*bucket) {
                        continue;
                    }
                    let dedupe_key = (normalized.item.id.clone(), normalized.occurrence_date);
                    if !seen.entry(*id).or_default().insert(dedupe_key) {
                        continue;
                    }
                    let Some(month) = out.get_mut(id) else {
                        continue;
                    };
                    if normalized.item.completed {
                        month.completions.insert(
                            normalized.item.completion_key.clone(),
                            GridCompletion {
                                completion_id: normalized.item.completion_id,
                                todo_id: normalized.item.todo_id,
                                occurrence_date: normalized.occurrence_date,
                                completed: true,
                            },
                        );
                    }
                    month.todos.push(normalized.clone());
                }
            }
        }
    }

    GridView {
        ok: handoff.ok(),
        months: out,
        meta: *handoff.meta(),
        error: handoff.error().map(str::to_string),
    }
}

fn normalize(item: &AggregatedItem, bucket: NaiveDate) -> GridItem {
    let occurrence_date = if item.is_recurring {
        item.date.unwrap_or(bucket)
    } else {
        item.start_date.or(item.date).unwrap_or(bucket)
    };
    GridItem {
        item: item.clone(),
        occurrence_date,
        category_color: category_color(item).to_string(),
    }
}
