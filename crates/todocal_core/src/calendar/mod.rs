//! Calendar state: month window, per-month cache and recurrence expansion.

pub mod cache;
pub mod recurrence;
pub mod window;
