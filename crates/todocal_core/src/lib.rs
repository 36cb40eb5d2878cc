//! Core engine of the todo calendar.
//!
//! Owns the month scroll window, batch aggregation of todos per month, the
//! month-keyed cache and the view adapters built on one range handoff.

pub mod adapter;
pub mod calendar;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod sync;

pub use adapter::grid::{adapt_grid, GridCompletion, GridItem, GridMonth, GridView};
pub use adapter::strip::{summarize_strip, StripSummary, DEFAULT_MAX_DOTS};
pub use calendar::cache::{CacheChange, CalendarDataCache, ListenerId};
pub use calendar::recurrence::{OccurrenceExpander, RRuleExpander, RecurrenceError};
pub use calendar::window::{MonthWindow, MonthWindowManager};
pub use config::{CalendarConfig, ConfigError};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::date_range::{DateRange, WeekStart};
pub use model::month::{MonthId, MonthIdError, MonthMetadata};
pub use model::todo::{
    completion_key, CalendarTodo, Category, CompletionCandidateRow, CompletionRecord, MonthData,
    TodoCandidateRow, TodoId,
};
pub use repo::range_gateway::{GatewayError, GatewayResult, RangeQueryGateway, SqliteRangeGateway};
pub use repo::todo_repo::{
    MutationScope, NewTodo, RepoError, RepoResult, SqliteTodoRepository, TodoMutation,
};
pub use service::aggregation_service::{BatchAggregation, BatchAggregationService};
pub use service::calendar_session::CalendarSession;
pub use service::fetch_orchestrator::{FetchOrchestrator, FetchOutcome};
pub use service::handoff_service::{
    build_date_handoff, build_range_handoff, AggregatedItem, HandoffMode, HandoffResult,
};
pub use sync::status::{
    HandoffMeta, SharedSyncStatus, StaleReason, SyncSnapshot, SyncState, SyncStatusSource,
};

/// Health-check probe used by the CLI.
pub fn ping() -> &'static str {
    "pong"
}

pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
