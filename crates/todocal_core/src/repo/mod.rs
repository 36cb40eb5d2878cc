//! Storage-facing contracts and SQLite implementations.
//!
//! # Responsibility
//! - Define the range query gateway consumed by aggregation.
//! - Isolate SQL details from calendar orchestration.
//!
//! # Invariants
//! - Gateways exclude soft-deleted todos themselves; aggregation never
//!   filters tombstones.
//! - Write paths validate input before SQL mutations.

pub mod range_gateway;
pub mod todo_repo;
