//! Todo, category and completion records.
//!
//! # Responsibility
//! - Define the raw rows returned by the range query gateway.
//! - Define the lightweight per-month records stored in the calendar cache.
//! - Classify a todo into one of its temporal shapes.
//!
//! # Invariants
//! - A todo with a non-blank `recurrence` is recurring, regardless of its
//!   other date fields.
//! - Completion keys are `<todoId>_<YYYY-MM-DD>` for recurring occurrences and
//!   `<todoId>_null` for everything else.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Stable identifier of a todo.
pub type TodoId = Uuid;
/// Stable identifier of a category.
pub type CategoryId = Uuid;

/// Category attached to a todo, joined in by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    /// Display color, typically `#RRGGBB`.
    pub color: String,
    pub icon: Option<String>,
}

/// Temporal shape of one todo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TodoShape {
    /// Single `date`.
    Single,
    /// `[start_date, end_date]` interval, possibly spanning months.
    Period,
    /// Recurrence rule anchored at `start_date` (or `date`).
    Recurring,
    /// No usable date at all; never placed on the calendar.
    Undated,
}

/// Todo row returned by `RangeQueryGateway::query_todo_candidates`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoCandidateRow {
    pub id: TodoId,
    pub title: String,
    pub date: Option<NaiveDate>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub is_all_day: bool,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub recurrence: Option<String>,
    pub recurrence_end_date: Option<NaiveDate>,
    pub category_id: Option<CategoryId>,
    pub category: Option<Category>,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    /// Unix epoch milliseconds.
    pub updated_at: i64,
    /// Soft-delete tombstone; gateways must not return rows where this is set.
    pub deleted_at: Option<i64>,
}

/// Completion row returned by `RangeQueryGateway::query_completion_candidates`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionCandidateRow {
    pub id: Uuid,
    pub key: String,
    pub todo_id: TodoId,
    pub date: NaiveDate,
    /// Unix epoch milliseconds.
    pub completed_at: i64,
}

/// Lightweight todo copy held per month by the calendar cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarTodo {
    pub id: TodoId,
    pub title: String,
    pub date: Option<NaiveDate>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub is_all_day: bool,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub recurrence: Option<String>,
    pub recurrence_end_date: Option<NaiveDate>,
    pub category_id: Option<CategoryId>,
    pub category: Option<Category>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl CalendarTodo {
    pub fn is_recurring(&self) -> bool {
        self.recurrence
            .as_deref()
            .is_some_and(|rule| !rule.trim().is_empty())
    }

    pub fn shape(&self) -> TodoShape {
        if self.is_recurring() {
            if self.anchor_date().is_some() {
                return TodoShape::Recurring;
            }
            return TodoShape::Undated;
        }
        match (self.date, self.start_date, self.end_date) {
            (_, Some(_), Some(_)) => TodoShape::Period,
            (Some(_), _, _) => TodoShape::Single,
            (None, Some(_), None) => TodoShape::Single,
            _ => TodoShape::Undated,
        }
    }

    /// First day this todo can appear on: `start_date`, else `date`.
    pub fn anchor_date(&self) -> Option<NaiveDate> {
        self.start_date.or(self.date)
    }

    /// Day used as the primary sort key inside one month.
    pub fn sort_date(&self) -> Option<NaiveDate> {
        self.date.or(self.start_date)
    }

    /// Completion key for the occurrence on `occurrence_date`.
    pub fn completion_key(&self, occurrence_date: NaiveDate) -> String {
        if self.is_recurring() {
            completion_key(self.id, Some(occurrence_date))
        } else {
            completion_key(self.id, None)
        }
    }
}

impl From<TodoCandidateRow> for CalendarTodo {
    fn from(row: TodoCandidateRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            date: row.date,
            start_date: row.start_date,
            end_date: row.end_date,
            is_all_day: row.is_all_day,
            start_time: row.start_time,
            end_time: row.end_time,
            recurrence: row.recurrence,
            recurrence_end_date: row.recurrence_end_date,
            category_id: row.category_id,
            category: row.category,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Completion record held per month by the calendar cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionRecord {
    pub id: Uuid,
    pub key: String,
    pub todo_id: TodoId,
    pub date: NaiveDate,
    pub completed_at: i64,
}

impl From<CompletionCandidateRow> for CompletionRecord {
    fn from(row: CompletionCandidateRow) -> Self {
        Self {
            id: row.id,
            key: row.key,
            todo_id: row.todo_id,
            date: row.date,
            completed_at: row.completed_at,
        }
    }
}

/// Cached aggregation result for one month.
///
/// An empty value is a complete answer ("nothing this month"), not a miss.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MonthData {
    /// Ordered by date, all-day first, then start time.
    pub todos: Vec<CalendarTodo>,
    /// Keyed by completion key.
    pub completions: BTreeMap<String, CompletionRecord>,
}

impl MonthData {
    pub fn is_empty(&self) -> bool {
        self.todos.is_empty() && self.completions.is_empty()
    }
}

/// Builds the completion key for a todo occurrence.
///
/// `None` is used for non-recurring todos, which complete once.
pub fn completion_key(todo_id: TodoId, occurrence_date: Option<NaiveDate>) -> String {
    match occurrence_date {
        Some(date) => format!("{todo_id}_{}", date.format("%Y-%m-%d")),
        None => format!("{todo_id}_null"),
    }
}
