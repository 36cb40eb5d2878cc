//! Aggregation, handoff building, fetch orchestration and the session facade.

pub mod aggregation_service;
pub mod calendar_session;
pub mod fetch_orchestrator;
pub mod handoff_service;
