//! Calendar domain model shared by aggregation, caching and view adapters.
//!
//! # Responsibility
//! - Define month identity (`MonthId`, `MonthMetadata`) and grid date ranges.
//! - Define the rows consumed from storage and the lightweight per-month
//!   records held by the calendar cache.
//!
//! # Invariants
//! - `MonthId` ordering matches chronological order.
//! - Every `DateRange` produced for a month grid spans exactly 42 days.

pub mod date_range;
pub mod month;
pub mod todo;
