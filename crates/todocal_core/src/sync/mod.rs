//! Sync status boundary consumed by handoff building.

pub mod status;
