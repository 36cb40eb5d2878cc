//! Read-only sync status snapshots and staleness metadata.
//!
//! # Responsibility
//! - Expose the current sync state to the calendar without coupling it to a
//!   concrete sync engine.
//! - Derive the staleness metadata attached to every handoff result.
//!
//! # Invariants
//! - Data is stale exactly when a sync is running or the last one failed.
//! - Reading a snapshot never blocks on the sync engine.

use serde::Serialize;
use std::sync::{Mutex, PoisonError};

/// Coarse state of the external sync engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    #[default]
    Idle,
    InProgress,
    Failed,
}

/// Point-in-time sync status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncSnapshot {
    pub state: SyncState,
    /// Epoch milliseconds of the last successful sync.
    pub last_sync_time: Option<i64>,
}

/// Why a handoff result may not reflect the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StaleReason {
    SyncInProgress,
    SyncFailed,
}

/// Staleness metadata attached to handoff results and views.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HandoffMeta {
    pub is_stale: bool,
    pub stale_reason: Option<StaleReason>,
    pub last_sync_time: Option<i64>,
}

impl From<SyncSnapshot> for HandoffMeta {
    fn from(snapshot: SyncSnapshot) -> Self {
        let stale_reason = match snapshot.state {
            SyncState::Idle => None,
            SyncState::InProgress => Some(StaleReason::SyncInProgress),
            SyncState::Failed => Some(StaleReason::SyncFailed),
        };
        Self {
            is_stale: stale_reason.is_some(),
            stale_reason,
            last_sync_time: snapshot.last_sync_time,
        }
    }
}

/// Source of sync status snapshots.
pub trait SyncStatusSource {
    fn snapshot(&self) -> SyncSnapshot;
}

impl SyncStatusSource for SyncSnapshot {
    fn snapshot(&self) -> SyncSnapshot {
        *self
    }
}

/// Mutable, thread-safe status holder updated by the sync engine.
#[derive(Debug, Default)]
pub struct SharedSyncStatus {
    inner: Mutex<SyncSnapshot>,
}

impl SharedSyncStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_state(&self, state: SyncState) {
        self.lock().state = state;
    }

    /// Records a successful sync at `epoch_ms` and returns to idle.
    pub fn mark_synced(&self, epoch_ms: i64) {
        let mut guard = self.lock();
        guard.state = SyncState::Idle;
        guard.last_sync_time = Some(epoch_ms);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SyncSnapshot> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SyncStatusSource for SharedSyncStatus {
    fn snapshot(&self) -> SyncSnapshot {
        *self.lock()
    }
}
