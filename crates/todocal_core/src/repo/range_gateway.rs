//! Range query gateway contract and SQLite implementation.
//!
//! # Responsibility
//! - Define the two range-scoped reads the aggregation layer depends on.
//! - Run those reads against the local store with a single query each.
//!
//! # Invariants
//! - Soft-deleted todos (`deleted_at IS NOT NULL`) are never returned.
//! - A todo is a candidate when its single date is in range, its
//!   `[start_date, end_date]` interval overlaps the range, or it recurs from
//!   an anchor `<= range.end` with no end or an end `>= range.start`.
//! - Read paths reject malformed persisted rows instead of masking them.

use crate::db::migrations::{latest_version, schema_version};
use crate::db::DbError;
use crate::model::date_range::DateRange;
use crate::model::todo::{Category, CompletionCandidateRow, TodoCandidateRow};
use chrono::{NaiveDate, NaiveTime};
use rusqlite::{params, Connection, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use uuid::Uuid;

pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";
pub(crate) const TIME_FORMAT: &str = "%H:%M";

const TODO_CANDIDATES_SQL: &str = "SELECT
    t.id,
    t.title,
    t.date,
    t.start_date,
    t.end_date,
    t.is_all_day,
    t.start_time,
    t.end_time,
    t.recurrence,
    t.recurrence_end_date,
    t.category_id,
    t.created_at,
    t.updated_at,
    t.deleted_at,
    c.id AS category_ref,
    c.name AS category_name,
    c.color AS category_color,
    c.icon AS category_icon
FROM todos t
LEFT JOIN categories c
    ON c.id = t.category_id
   AND c.deleted_at IS NULL
WHERE t.deleted_at IS NULL
  AND (
        (t.date IS NOT NULL AND t.date BETWEEN ?1 AND ?2)
     OR (t.start_date IS NOT NULL AND t.end_date IS NOT NULL
         AND t.start_date <= ?2 AND t.end_date >= ?1)
     OR (t.date IS NULL AND t.end_date IS NULL
         AND t.start_date BETWEEN ?1 AND ?2)
     OR (t.recurrence IS NOT NULL AND trim(t.recurrence) <> ''
         AND COALESCE(t.start_date, t.date) <= ?2
         AND (t.recurrence_end_date IS NULL OR t.recurrence_end_date >= ?1))
  )
ORDER BY COALESCE(t.date, t.start_date) ASC, t.id ASC;";

const COMPLETION_CANDIDATES_SQL: &str = "SELECT
    id,
    key,
    todo_id,
    date,
    completed_at
FROM completions
WHERE date BETWEEN ?1 AND ?2
ORDER BY date ASC, key ASC;";

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Failure reported by a range query gateway.
#[derive(Debug)]
pub enum GatewayError {
    Db(DbError),
    /// Connection schema is not migrated to the version this binary reads.
    SchemaNotReady { found: u32, expected: u32 },
    /// Persisted row could not be decoded.
    InvalidData(String),
    /// Store is unreachable (used by remote-backed or test gateways).
    Unavailable(String),
}

impl Display for GatewayError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::SchemaNotReady { found, expected } => write!(
                f,
                "store schema version {found} does not match expected {expected}"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted calendar row: {message}"),
            Self::Unavailable(message) => write!(f, "range query store unavailable: {message}"),
        }
    }
}

impl Error for GatewayError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for GatewayError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for GatewayError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Range-scoped reads consumed by aggregation and handoff building.
pub trait RangeQueryGateway {
    /// Todos that may occur inside `range` (single, period or recurring).
    fn query_todo_candidates(&self, range: &DateRange) -> GatewayResult<Vec<TodoCandidateRow>>;
    /// Completions whose date falls inside `range`.
    fn query_completion_candidates(
        &self,
        range: &DateRange,
    ) -> GatewayResult<Vec<CompletionCandidateRow>>;
}

impl<G: RangeQueryGateway + ?Sized> RangeQueryGateway for &G {
    fn query_todo_candidates(&self, range: &DateRange) -> GatewayResult<Vec<TodoCandidateRow>> {
        (**self).query_todo_candidates(range)
    }

    fn query_completion_candidates(
        &self,
        range: &DateRange,
    ) -> GatewayResult<Vec<CompletionCandidateRow>> {
        (**self).query_completion_candidates(range)
    }
}

impl<G: RangeQueryGateway + ?Sized> RangeQueryGateway for Arc<G> {
    fn query_todo_candidates(&self, range: &DateRange) -> GatewayResult<Vec<TodoCandidateRow>> {
        (**self).query_todo_candidates(range)
    }

    fn query_completion_candidates(
        &self,
        range: &DateRange,
    ) -> GatewayResult<Vec<CompletionCandidateRow>> {
        (**self).query_completion_candidates(range)
    }
}

/// SQLite-backed range query gateway.
pub struct SqliteRangeGateway<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRangeGateway<'conn> {
    /// Wraps a connection returned by `open_db`/`open_db_in_memory`.
    ///
    /// # Errors
    /// - `SchemaNotReady` when the connection has not been migrated.
    pub fn try_new(conn: &'conn Connection) -> GatewayResult<Self> {
        let found = schema_version(conn)?;
        let expected = latest_version();
        if found != expected {
            return Err(GatewayError::SchemaNotReady { found, expected });
        }
        Ok(Self { conn })
    }
}

impl RangeQueryGateway for SqliteRangeGateway<'_> {
    fn query_todo_candidates(&self, range: &DateRange) -> GatewayResult<Vec<TodoCandidateRow>> {
        let mut stmt = self.conn.prepare_cached(TODO_CANDIDATES_SQL)?;
        let mut rows = stmt.query(params![
            format_date(range.start_date),
            format_date(range.end_date)
        ])?;

        let mut todos = Vec::new();
        while let Some(row) = rows.next()? {
            todos.push(parse_todo_row(row)?);
        }
        Ok(todos)
    }

    fn query_completion_candidates(
        &self,
        range: &DateRange,
    ) -> GatewayResult<Vec<CompletionCandidateRow>> {
        let mut stmt = self.conn.prepare_cached(COMPLETION_CANDIDATES_SQL)?;
        let mut rows = stmt.query(params![
            format_date(range.start_date),
            format_date(range.end_date)
        ])?;

        let mut completions = Vec::new();
        while let Some(row) = rows.next()? {
            completions.push(CompletionCandidateRow {
                id: parse_uuid_column(row, "id", "completions.id")?,
                key: row.get("key")?,
                todo_id: parse_uuid_column(row, "todo_id", "completions.todo_id")?,
                date: parse_date(&row.get::<_, String>("date")?, "completions.date")?,
                completed_at: row.get("completed_at")?,
            });
        }
        Ok(completions)
    }
}

fn parse_todo_row(row: &Row<'_>) -> GatewayResult<TodoCandidateRow> {
    let is_all_day = match row.get::<_, i64>("is_all_day")? {
        0 => false,
        1 => true,
        other => {
            return Err(GatewayError::InvalidData(format!(
                "invalid is_all_day value `{other}` in todos.is_all_day"
            )));
        }
    };

    let category_id = parse_optional_uuid_column(row, "category_id", "todos.category_id")?;
    let category = match row.get::<_, Option<String>>("category_ref")? {
        Some(_) => Some(Category {
            id: parse_uuid_column(row, "category_ref", "categories.id")?,
            name: row.get("category_name")?,
            color: row.get("category_color")?,
            icon: row.get("category_icon")?,
        }),
        None => None,
    };

    Ok(TodoCandidateRow {
        id: parse_uuid_column(row, "id", "todos.id")?,
        title: row.get("title")?,
        date: parse_optional_date(row.get("date")?, "todos.date")?,
        start_date: parse_optional_date(row.get("start_date")?, "todos.start_date")?,
        end_date: parse_optional_date(row.get("end_date")?, "todos.end_date")?,
        is_all_day,
        start_time: parse_optional_time(row.get("start_time")?, "todos.start_time")?,
        end_time: parse_optional_time(row.get("end_time")?, "todos.end_time")?,
        recurrence: row.get("recurrence")?,
        recurrence_end_date: parse_optional_date(
            row.get("recurrence_end_date")?,
            "todos.recurrence_end_date",
        )?,
        category_id,
        category,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        deleted_at: row.get("deleted_at")?,
    })
}

pub(crate) fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub(crate) fn format_time(time: NaiveTime) -> String {
    time.format(TIME_FORMAT).to_string()
}

fn parse_date(value: &str, column: &str) -> GatewayResult<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|_| {
        GatewayError::InvalidData(format!("invalid date value `{value}` in {column}"))
    })
}

fn parse_optional_date(value: Option<String>, column: &str) -> GatewayResult<Option<NaiveDate>> {
    value.map(|text| parse_date(&text, column)).transpose()
}

fn parse_optional_time(value: Option<String>, column: &str) -> GatewayResult<Option<NaiveTime>> {
    value
        .map(|text| {
            NaiveTime::parse_from_str(&text, TIME_FORMAT)
                .or_else(|_| NaiveTime::parse_from_str(&text, "%H:%M:%S"))
                .map_err(|_| {
                    GatewayError::InvalidData(format!("invalid time value `{text}` in {column}"))
                })
        })
        .transpose()
}

fn parse_uuid_column(row: &Row<'_>, name: &str, column: &str) -> GatewayResult<Uuid> {
    let text: String = row.get(name)?;
    Uuid::parse_str(&text)
        .map_err(|_| GatewayError::InvalidData(format!("invalid uuid value `{text}` in {column}")))
}

fn parse_optional_uuid_column(
    row: &Row<'_>,
    name: &str,
    column: &str,
) -> GatewayResult<Option<Uuid>> {
    match row.get::<_, Option<String>>(name)? {
        Some(text) => Uuid::parse_str(&text).map(Some).map_err(|_| {
            GatewayError::InvalidData(format!("invalid uuid value `{text}` in {column}"))
        }),
        None => Ok(None),
    }
}
