//! Todo write-side repository.
//!
//! # Responsibility
//! - Persist categories, todos and completions into the local store.
//! - Report which calendar months each mutation touches, so callers can feed
//!   the calendar cache invalidation hooks.
//!
//! # Invariants
//! - Write paths call `NewTodo::validate()` before SQL mutations.
//! - Deletion is a soft-delete tombstone (`deleted_at`), never a hard delete.

use crate::db::DbError;
use crate::model::month::MonthId;
use crate::model::todo::{completion_key, Category, CategoryId, TodoId};
use crate::repo::range_gateway::{format_date, format_time, DATE_FORMAT};
use chrono::{NaiveDate, NaiveTime};
use rusqlite::{params, Connection, OptionalExtension};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type RepoResult<T> = Result<T, RepoError>;

/// Validation failures for todo input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TodoValidationError {
    BlankTitle,
    /// Neither `date` nor `start_date` is set.
    MissingDate,
    /// `end_date` given without `start_date`.
    EndWithoutStart,
    /// `end_date` is earlier than `start_date`.
    InvertedPeriod {
        start_date: NaiveDate,
        end_date: NaiveDate,
    },
    /// `recurrence_end_date` is earlier than the recurrence anchor.
    RecurrenceEndsBeforeStart,
    /// Timed todo whose end time precedes its start time.
    InvertedTimes,
}

impl Display for TodoValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankTitle => write!(f, "todo title must not be blank"),
            Self::MissingDate => write!(f, "todo requires `date` or `start_date`"),
            Self::EndWithoutStart => write!(f, "`end_date` requires `start_date`"),
            Self::InvertedPeriod {
                start_date,
                end_date,
            } => write!(f, "end_date {end_date} is earlier than start_date {start_date}"),
            Self::RecurrenceEndsBeforeStart => {
                write!(f, "recurrence_end_date is earlier than the first occurrence")
            }
            Self::InvertedTimes => write!(f, "end_time is earlier than start_time"),
        }
    }
}

impl Error for TodoValidationError {}

/// Repository error for todo writes.
#[derive(Debug)]
pub enum RepoError {
    Validation(TodoValidationError),
    Db(DbError),
    NotFound(TodoId),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "todo not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted todo data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::NotFound(_) | Self::InvalidData(_) => None,
        }
    }
}

impl From<TodoValidationError> for RepoError {
    fn from(value: TodoValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Input for creating one todo.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NewTodo {
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
}

impl NewTodo {
    /// All-day todo on one date.
    pub fn on_date(title: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            title: title.into(),
            date: Some(date),
            is_all_day: true,
            ..Self::default()
        }
    }

    /// All-day todo spanning `[start_date, end_date]`.
    pub fn period(title: impl Into<String>, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            title: title.into(),
            start_date: Some(start_date),
            end_date: Some(end_date),
            is_all_day: true,
            ..Self::default()
        }
    }

    /// All-day recurring todo anchored on `start_date`.
    pub fn recurring(
        title: impl Into<String>,
        start_date: NaiveDate,
        rule: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            start_date: Some(start_date),
            recurrence: Some(rule.into()),
            is_all_day: true,
            ..Self::default()
        }
    }

    fn is_recurring(&self) -> bool {
        self.recurrence
            .as_deref()
            .is_some_and(|rule| !rule.trim().is_empty())
    }

    /// Validates field combinations before persistence.
    pub fn validate(&self) -> Result<(), TodoValidationError> {
        if self.title.trim().is_empty() {
            return Err(TodoValidationError::BlankTitle);
        }
        let anchor = self.start_date.or(self.date);
        let Some(anchor) = anchor else {
            if self.end_date.is_some() {
                return Err(TodoValidationError::EndWithoutStart);
            }
            return Err(TodoValidationError::MissingDate);
        };
        if let (None, Some(_)) = (self.start_date, self.end_date) {
            return Err(TodoValidationError::EndWithoutStart);
        }
        if let (Some(start_date), Some(end_date)) = (self.start_date, self.end_date) {
            if end_date < start_date {
                return Err(TodoValidationError::InvertedPeriod {
                    start_date,
                    end_date,
                });
            }
        }
        if self.is_recurring() {
            if let Some(until) = self.recurrence_end_date {
                if until < anchor {
                    return Err(TodoValidationError::RecurrenceEndsBeforeStart);
                }
            }
        }
        if !self.is_all_day {
            if let (Some(start), Some(end)) = (self.start_time, self.end_time) {
                if end < start {
                    return Err(TodoValidationError::InvertedTimes);
                }
            }
        }
        Ok(())
    }
}

/// Calendar months a mutation can change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationScope {
    /// Only these months (ascending, de-duplicated).
    Months(Vec<MonthId>),
    /// Unbounded (recurring todos); callers should drop the whole cache.
    All,
}

/// Result of a todo write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TodoMutation {
    pub todo_id: TodoId,
    pub scope: MutationScope,
}

/// SQLite-backed todo write repository.
pub struct SqliteTodoRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTodoRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Creates one category with a generated stable id.
    pub fn create_category(
        &self,
        name: &str,
        color: &str,
        icon: Option<&str>,
    ) -> RepoResult<Category> {
        let category = Category {
            id: Uuid::new_v4(),
            name: name.trim().to_string(),
            color: color.trim().to_string(),
            icon: icon.map(str::to_string),
        };
        self.conn.execute(
            "INSERT INTO categories (id, name, color, icon) VALUES (?1, ?2, ?3, ?4);",
            params![
                category.id.to_string(),
                category.name.as_str(),
                category.color.as_str(),
                category.icon.as_deref(),
            ],
        )?;
        Ok(category)
    }

    /// Creates one todo and returns its id plus the months it touches.
    pub fn create_todo(&self, todo: &NewTodo) -> RepoResult<TodoMutation> {
        todo.validate()?;
        let todo_id = Uuid::new_v4();

        self.conn.execute(
            "INSERT INTO todos (
                id,
                title,
                date,
                start_date,
                end_date,
                is_all_day,
                start_time,
                end_time,
                recurrence,
                recurrence_end_date,
                category_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11);",
            params![
                todo_id.to_string(),
                todo.title.trim(),
                todo.date.map(format_date),
                todo.start_date.map(format_date),
                todo.end_date.map(format_date),
                i64::from(todo.is_all_day),
                todo.start_time.map(format_time),
                todo.end_time.map(format_time),
                todo.recurrence.as_deref(),
                todo.recurrence_end_date.map(format_date),
                todo.category_id.map(|id| id.to_string()),
            ],
        )?;

        Ok(TodoMutation {
            todo_id,
            scope: mutation_scope(
                todo.is_recurring(),
                todo.date,
                todo.start_date,
                todo.end_date,
            ),
        })
    }

    /// Soft-deletes one todo. Idempotent for already-deleted rows.
    pub fn soft_delete_todo(&self, todo_id: TodoId) -> RepoResult<TodoMutation> {
        let scope = self.load_scope(todo_id)?;
        self.conn.execute(
            "UPDATE todos
             SET
                deleted_at = COALESCE(deleted_at, strftime('%s', 'now') * 1000),
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            [todo_id.to_string()],
        )?;
        Ok(TodoMutation { todo_id, scope })
    }

    /// Marks the occurrence of `todo_id` on `occurrence_date` as completed.
    ///
    /// Replaces an existing completion with the same key.
    pub fn complete(
        &self,
        todo_id: TodoId,
        occurrence_date: NaiveDate,
    ) -> RepoResult<TodoMutation> {
        let recurring = self.is_recurring(todo_id)?;
        let key = completion_key(todo_id, recurring.then_some(occurrence_date));
        self.conn.execute(
            "INSERT INTO completions (id, key, todo_id, date)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(key) DO UPDATE SET
                date = excluded.date,
                completed_at = (strftime('%s', 'now') * 1000);",
            params![
                Uuid::new_v4().to_string(),
                key,
                todo_id.to_string(),
                format_date(occurrence_date),
            ],
        )?;
        Ok(TodoMutation {
            todo_id,
            scope: MutationScope::Months(vec![MonthId::from_date(occurrence_date)]),
        })
    }

    /// Removes the completion of one occurrence, if any.
    pub fn uncomplete(
        &self,
        todo_id: TodoId,
        occurrence_date: NaiveDate,
    ) -> RepoResult<TodoMutation> {
        let recurring = self.is_recurring(todo_id)?;
        let key = completion_key(todo_id, recurring.then_some(occurrence_date));
        self.conn
            .execute("DELETE FROM completions WHERE key = ?1;", [key])?;
        Ok(TodoMutation {
            todo_id,
            scope: MutationScope::Months(vec![MonthId::from_date(occurrence_date)]),
        })
    }

    fn is_recurring(&self, todo_id: TodoId) -> RepoResult<bool> {
        let recurrence: Option<Option<String>> = self
            .conn
            .query_row(
                "SELECT recurrence FROM todos WHERE id = ?1 AND deleted_at IS NULL;",
                [todo_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        match recurrence {
            Some(rule) => Ok(rule.is_some_and(|value| !value.trim().is_empty())),
            None => Err(RepoError::NotFound(todo_id)),
        }
    }

    fn load_scope(&self, todo_id: TodoId) -> RepoResult<MutationScope> {
        type ScopeRow = (Option<String>, Option<String>, Option<String>, Option<String>);
        let row: Option<ScopeRow> = self
            .conn
            .query_row(
                "SELECT recurrence, date, start_date, end_date FROM todos WHERE id = ?1;",
                [todo_id.to_string()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?;
        let Some((recurrence, date, start_date, end_date)) = row else {
            return Err(RepoError::NotFound(todo_id));
        };
        let recurring = recurrence.is_some_and(|rule| !rule.trim().is_empty());
        Ok(mutation_scope(
            recurring,
            parse_stored_date(date)?,
            parse_stored_date(start_date)?,
            parse_stored_date(end_date)?,
        ))
    }
}

fn parse_stored_date(value: Option<String>) -> RepoResult<Option<NaiveDate>> {
    value
        .map(|text| {
            NaiveDate::parse_from_str(&text, DATE_FORMAT)
                .map_err(|_| RepoError::InvalidData(format!("invalid date value `{text}`")))
        })
        .transpose()
}

fn mutation_scope(
    recurring: bool,
    date: Option<NaiveDate>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
) -> MutationScope {
    if recurring {
        return MutationScope::All;
    }
    let first = start_date.or(date);
    let last = end_date.or(date).or(start_date);
    let (Some(first), Some(last)) = (first, last) else {
        return MutationScope::Months(Vec::new());
    };

    let mut months = Vec::new();
    let mut cursor = Some(MonthId::from_date(first.min(last)));
    let end = MonthId::from_date(first.max(last));
    while let Some(month) = cursor {
        if month > end {
            break;
        }
        months.push(month);
        cursor = month.next();
    }
    MutationScope::Months(months)
}

#[cfg(test)]
mod tests {
    use super::{mutation_scope, MutationScope, NewTodo, TodoValidationError};
    use chrono::{NaiveDate, NaiveTime};

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn validate_rejects_invalid_combinations() {
        let mut blank = NewTodo::on_date("  ", day(2026, 1, 1));
        assert_eq!(blank.validate(), Err(TodoValidationError::BlankTitle));
        blank.title = "ok".to_string();
        assert_eq!(blank.validate(), Ok(()));

        let inverted = NewTodo::period("trip", day(2026, 2, 5), day(2026, 1, 28));
        assert!(matches!(
            inverted.validate(),
            Err(TodoValidationError::InvertedPeriod { .. })
        ));

        let undated = NewTodo {
            title: "floating".to_string(),
            ..NewTodo::default()
        };
        assert_eq!(undated.validate(), Err(TodoValidationError::MissingDate));

        let mut recurring = NewTodo::recurring("gym", day(2026, 1, 5), "FREQ=WEEKLY");
        recurring.recurrence_end_date = Some(day(2025, 12, 1));
        assert_eq!(
            recurring.validate(),
            Err(TodoValidationError::RecurrenceEndsBeforeStart)
        );

        let mut timed = NewTodo::on_date("call", day(2026, 1, 1));
        timed.is_all_day = false;
        timed.start_time = NaiveTime::from_hms_opt(10, 0, 0);
        timed.end_time = NaiveTime::from_hms_opt(9, 0, 0);
        assert_eq!(timed.validate(), Err(TodoValidationError::InvertedTimes));
    }

    #[test]
    fn scope_covers_every_month_of_a_period() {
        let scope = mutation_scope(false, None, Some(day(2025, 12, 28)), Some(day(2026, 2, 5)));
        let MutationScope::Months(months) = scope else {
            panic!("period scope should be bounded");
        };
        let texts: Vec<String> = months.iter().map(ToString::to_string).collect();
        assert_eq!(texts, vec!["2025-12", "2026-01", "2026-02"]);
    }

    #[test]
    fn scope_is_unbounded_for_recurring_todos() {
        assert_eq!(
            mutation_scope(true, None, Some(day(2026, 1, 1)), None),
            MutationScope::All
        );
    }
}
