//! Ordered schema migrations.
//!
//! # Invariants
//! - Versions are strictly increasing, starting at 1.
//! - All pending steps run in one transaction; a failed step leaves the
//!   schema untouched.

use crate::db::{DbError, DbResult};
use log::info;
use rusqlite::Connection;

struct Step {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const STEPS: [Step; 3] = [
    Step {
        version: 1,
        name: "init",
        sql: include_str!("0001_init.sql"),
    },
    Step {
        version: 2,
        name: "completions",
        sql: include_str!("0002_completions.sql"),
    },
    Step {
        version: 3,
        name: "range_indexes",
        sql: include_str!("0003_range_indexes.sql"),
    },
];

/// Schema version this build reads and writes.
pub fn latest_version() -> u32 {
    STEPS.last().map_or(0, |step| step.version)
}

/// Schema version recorded on `conn`.
pub fn schema_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get::<_, u32>(0))?)
}

/// Brings `conn` to [`latest_version`].
///
/// # Errors
/// - `DbError::SchemaTooNew` when the store is ahead of this build.
/// - `DbError::Sqlite` when a step fails; nothing is applied in that case.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let found = schema_version(conn)?;
    let supported = latest_version();
    if found > supported {
        return Err(DbError::SchemaTooNew { found, supported });
    }

    let pending: Vec<&Step> = STEPS.iter().filter(|step| step.version > found).collect();
    if pending.is_empty() {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for step in &pending {
        tx.execute_batch(step.sql)?;
        tx.pragma_update(None, "user_version", step.version)?;
    }
    tx.commit()?;

    for step in pending {
        info!(
            "event=db_migrate module=db status=ok version={} name={}",
            step.version, step.name
        );
    }
    Ok(())
}
