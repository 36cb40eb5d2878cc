//! Month-keyed calendar data cache.
//!
//! # Responsibility
//! - Own every cached `MonthData` and answer cache-hit checks.
//! - Apply replace-semantics writes, invalidations and window pruning.
//! - Notify subscribed observers about effective changes.
//!
//! # Invariants
//! - A month is cached iff an entry exists; an empty entry is a hit.
//! - Every entry comes from exactly one write; entries are never merged.
//! - One batch write replaces all of its months under a single lock, so
//!   todos and completions from different passes never interleave.
//! - Operations that change nothing notify nobody.

use crate::model::month::MonthId;
use crate::model::todo::{CalendarTodo, CompletionRecord, MonthData};
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Effective change applied to the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheChange {
    /// Months (re)written by a single or batch write.
    Written(Vec<MonthId>),
    /// Months removed by `invalidate_month`/`invalidate_adjacent`.
    Invalidated(Vec<MonthId>),
    /// Months removed by `prune_to_window`.
    Pruned(Vec<MonthId>),
    /// Every month removed by `clear_all`.
    Cleared(Vec<MonthId>),
}

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Arc<dyn Fn(&CacheChange) + Send + Sync>;

/// Shared calendar cache.
#[derive(Default)]
pub struct CalendarDataCache {
    months: Mutex<BTreeMap<MonthId, MonthData>>,
    listeners: Mutex<Vec<(ListenerId, Listener)>>,
    next_listener_id: AtomicU64,
}

impl CalendarDataCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `id` has an entry, empty or not.
    pub fn has_month(&self, id: MonthId) -> bool {
        self.lock_months().contains_key(&id)
    }

    /// Snapshot of one cached month.
    pub fn month_data(&self, id: MonthId) -> Option<MonthData> {
        self.lock_months().get(&id).cloned()
    }

    /// Cached month ids, ascending.
    pub fn cached_months(&self) -> Vec<MonthId> {
        self.lock_months().keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.lock_months().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_months().is_empty()
    }

    /// Replaces one month.
    pub fn set_month_data(
        &self,
        id: MonthId,
        todos: Vec<CalendarTodo>,
        completions: BTreeMap<String, CompletionRecord>,
    ) {
        self.lock_months()
            .insert(id, MonthData { todos, completions });
        debug!("event=cache_write module=calendar status=ok months=1 month={id}");
        self.notify(&CacheChange::Written(vec![id]));
    }

    /// Replaces every month present in either map in one transaction.
    ///
    /// A month present in only one map gets an empty value for the other.
    pub fn set_batch_month_data(
        &self,
        todos_by_month: BTreeMap<MonthId, Vec<CalendarTodo>>,
        completions_by_month: BTreeMap<MonthId, BTreeMap<String, CompletionRecord>>,
    ) {
        let mut batch: BTreeMap<MonthId, MonthData> = todos_by_month
            .into_iter()
            .map(|(id, todos)| {
                (
                    id,
                    MonthData {
                        todos,
                        completions: BTreeMap::new(),
                    },
                )
            })
            .collect();
        for (id, completions) in completions_by_month {
            batch.entry(id).or_default().completions = completions;
        }
        self.write_batch(batch);
    }

    /// Replaces every month in `batch` in one transaction.
    pub fn write_batch(&self, batch: BTreeMap<MonthId, MonthData>) {
        if batch.is_empty() {
            return;
        }
        let written: Vec<MonthId> = batch.keys().copied().collect();
        {
            let mut months = self.lock_months();
            for (id, data) in batch {
                months.insert(id, data);
            }
        }
        info!(
            "event=cache_write module=calendar status=ok months={} first={} last={}",
            written.len(),
            written[0],
            written[written.len() - 1]
        );
        self.notify(&CacheChange::Written(written));
    }

    /// Removes one month; returns whether an entry existed.
    pub fn invalidate_month(&self, id: MonthId) -> bool {
        let removed = self.lock_months().remove(&id).is_some();
        if removed {
            info!("event=cache_invalidate module=calendar status=ok months=1 month={id}");
            self.notify(&CacheChange::Invalidated(vec![id]));
        }
        removed
    }

    /// Removes `month - 1`, `month` and `month + 1`.
    ///
    /// A single-day change can alter the padding days of the neighbouring
    /// months' 6-week grids, so all three are dropped. Returns the months
    /// that actually had entries.
    pub fn invalidate_adjacent(&self, year: i32, month: u32) -> Vec<MonthId> {
        let center = match MonthId::new(year, month) {
            Ok(center) => center,
            Err(err) => {
                warn!(
                    "event=cache_invalidate module=calendar status=skip reason=invalid_month error={err}"
                );
                return Vec::new();
            }
        };
        let targets: Vec<MonthId> = [center.prev(), Some(center), center.next()]
            .into_iter()
            .flatten()
            .collect();

        let removed: Vec<MonthId> = {
            let mut months = self.lock_months();
            targets
                .into_iter()
                .filter(|id| months.remove(id).is_some())
                .collect()
        };
        if !removed.is_empty() {
            info!(
                "event=cache_invalidate module=calendar status=ok months={} center={}",
                removed.len(),
                center
            );
            self.notify(&CacheChange::Invalidated(removed.clone()));
        }
        removed
    }

    /// Drops every month outside `[start, end]`; returns the dropped months.
    pub fn prune_to_window(&self, start: MonthId, end: MonthId) -> Vec<MonthId> {
        let pruned: Vec<MonthId> = {
            let mut months = self.lock_months();
            let outside: Vec<MonthId> = months
                .keys()
                .copied()
                .filter(|id| *id < start || *id > end)
                .collect();
            for id in &outside {
                months.remove(id);
            }
            outside
        };
        if pruned.is_empty() {
            return pruned;
        }
        info!(
            "event=cache_prune module=calendar status=ok removed={} window={}..{}",
            pruned.len(),
            start,
            end
        );
        self.notify(&CacheChange::Pruned(pruned.clone()));
        pruned
    }

    /// Drops every month.
    pub fn clear_all(&self) {
        let cleared: Vec<MonthId> = {
            let mut months = self.lock_months();
            let ids = months.keys().copied().collect();
            months.clear();
            ids
        };
        info!(
            "event=cache_clear module=calendar status=ok removed={}",
            cleared.len()
        );
        if !cleared.is_empty() {
            self.notify(&CacheChange::Cleared(cleared));
        }
    }

    /// Registers a change observer.
    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&CacheChange) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_listener_id.fetch_add(1, Ordering::Relaxed));
        self.lock_listeners().push((id, Arc::new(listener)));
        id
    }

    /// Removes an observer; returns whether it was registered.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.lock_listeners();
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }

    fn notify(&self, change: &CacheChange) {
        // Listeners run without any cache lock held so they may read the cache.
        let listeners: Vec<Listener> = self
            .lock_listeners()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(change);
        }
    }

    fn lock_months(&self) -> MutexGuard<'_, BTreeMap<MonthId, MonthData>> {
        self.months.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_listeners(&self) -> MutexGuard<'_, Vec<(ListenerId, Listener)>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
