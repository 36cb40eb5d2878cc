#![allow(dead_code)]

use chrono::NaiveDate;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use todocal_core::{
    Category, CompletionCandidateRow, DateRange, GatewayError, GatewayResult, MonthId,
    RangeQueryGateway, TodoCandidateRow,
};
use uuid::Uuid;

pub fn day(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

pub fn month(year: i32, month: u32) -> MonthId {
    MonthId::new(year, month).unwrap()
}

pub fn todo_row(title: &str) -> TodoCandidateRow {
    TodoCandidateRow {
        id: Uuid::new_v4(),
        title: title.to_string(),
        date: None,
        start_date: None,
        end_date: None,
        is_all_day: true,
        start_time: None,
        end_time: None,
        recurrence: None,
        recurrence_end_date: None,
        category_id: None,
        category: None,
        created_at: 1_767_225_600_000,
        updated_at: 1_767_225_600_000,
        deleted_at: None,
    }
}

pub fn single_row(title: &str, date: NaiveDate) -> TodoCandidateRow {
    TodoCandidateRow {
        date: Some(date),
        ..todo_row(title)
    }
}

pub fn period_row(title: &str, start: NaiveDate, end: NaiveDate) -> TodoCandidateRow {
    TodoCandidateRow {
        start_date: Some(start),
        end_date: Some(end),
        ..todo_row(title)
    }
}

pub fn recurring_row(title: &str, anchor: NaiveDate, rule: &str) -> TodoCandidateRow {
    TodoCandidateRow {
        start_date: Some(anchor),
        recurrence: Some(rule.to_string()),
        ..todo_row(title)
    }
}

pub fn with_color(mut row: TodoCandidateRow, color: &str) -> TodoCandidateRow {
    let id = Uuid::new_v4();
    row.category_id = Some(id);
    row.category = Some(Category {
        id,
        name: format!("category {color}"),
        color: color.to_string(),
        icon: None,
    });
    row
}

pub fn completion_row(key: String, todo_id: Uuid, date: NaiveDate) -> CompletionCandidateRow {
    CompletionCandidateRow {
        id: Uuid::new_v4(),
        key,
        todo_id,
        date,
        completed_at: 1_767_225_600_000,
    }
}

/// In-memory gateway that records every call and can be switched to failing.
#[derive(Default)]
pub struct FakeGateway {
    todos: Mutex<Vec<TodoCandidateRow>>,
    completions: Mutex<Vec<CompletionCandidateRow>>,
    failing: AtomicBool,
    todo_calls: AtomicUsize,
    completion_calls: AtomicUsize,
    ranges: Mutex<Vec<DateRange>>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_todos(todos: Vec<TodoCandidateRow>) -> Self {
        let gateway = Self::new();
        *gateway.todos.lock().unwrap() = todos;
        gateway
    }

    pub fn failing() -> Self {
        let gateway = Self::new();
        gateway.set_failing(true);
        gateway
    }

    pub fn push_todo(&self, row: TodoCandidateRow) {
        self.todos.lock().unwrap().push(row);
    }

    pub fn push_completion(&self, row: CompletionCandidateRow) {
        self.completions.lock().unwrap().push(row);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Total calls across both queries.
    pub fn calls(&self) -> usize {
        self.todo_calls.load(Ordering::SeqCst) + self.completion_calls.load(Ordering::SeqCst)
    }

    pub fn todo_calls(&self) -> usize {
        self.todo_calls.load(Ordering::SeqCst)
    }

    pub fn ranges(&self) -> Vec<DateRange> {
        self.ranges.lock().unwrap().clone()
    }

    fn check(&self) -> GatewayResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(GatewayError::Unavailable("fake gateway offline".to_string()));
        }
        Ok(())
    }
}

impl RangeQueryGateway for FakeGateway {
    fn query_todo_candidates(&self, range: &DateRange) -> GatewayResult<Vec<TodoCandidateRow>> {
        self.todo_calls.fetch_add(1, Ordering::SeqCst);
        self.ranges.lock().unwrap().push(*range);
        self.check()?;
        Ok(self.todos.lock().unwrap().clone())
    }

    fn query_completion_candidates(
        &self,
        range: &DateRange,
    ) -> GatewayResult<Vec<CompletionCandidateRow>> {
        self.completion_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(self
            .completions
            .lock()
            .unwrap()
            .iter()
            .filter(|row| range.contains(row.date))
            .cloned()
            .collect())
    }
}
