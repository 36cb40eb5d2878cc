//! Visibility-driven fetching of uncached months.
//!
//! # Responsibility
//! - Turn "these months are visible" into at most one aggregation call for
//!   the months (plus prefetch buffer) the cache does not hold.
//! - Replay the last visible set on screen refocus so invalidated months are
//!   refetched.
//!
//! # Invariants
//! - At most one fetch is in flight; requests arriving meanwhile are dropped,
//!   not queued.
//! - The in-flight flag is always cleared when a fetch ends, including by
//!   unwinding.
//! - A finished fetch always writes every fetched month to the cache, also
//!   when aggregation degraded to empty results.

use crate::calendar::cache::CalendarDataCache;
use crate::model::date_range::WeekStart;
use crate::model::month::MonthId;
use crate::repo::range_gateway::RangeQueryGateway;
use crate::service::aggregation_service::BatchAggregationService;
use log::{debug, info};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

/// Result of one visibility or refocus event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Another fetch was running; this request was dropped.
    InFlight,
    /// Every needed month was already cached.
    AllCached,
    /// No visible months are known yet.
    NothingVisible,
    /// Months fetched and written to the cache.
    Fetched { months: Vec<MonthId>, degraded: bool },
}

/// Clears the in-flight flag when dropped.
struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> InFlightGuard<'a> {
    fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

#[derive(Debug, Clone)]
struct VisibleSet {
    months: Vec<MonthId>,
    buffer: u32,
}

/// Fetch state machine for one screen session.
pub struct FetchOrchestrator<G> {
    service: BatchAggregationService<G>,
    cache: Arc<CalendarDataCache>,
    week_start: WeekStart,
    fetching: AtomicBool,
    last_visible: Mutex<Option<VisibleSet>>,
}

impl<G: RangeQueryGateway> FetchOrchestrator<G> {
    pub fn new(
        service: BatchAggregationService<G>,
        cache: Arc<CalendarDataCache>,
        week_start: WeekStart,
    ) -> Self {
        Self {
            service,
            cache,
            week_start,
            fetching: AtomicBool::new(false),
            last_visible: Mutex::new(None),
        }
    }

    pub fn service(&self) -> &BatchAggregationService<G> {
        &self.service
    }

    pub fn cache(&self) -> &Arc<CalendarDataCache> {
        &self.cache
    }

    pub fn week_start(&self) -> WeekStart {
        self.week_start
    }

    pub fn is_fetching(&self) -> bool {
        self.fetching.load(Ordering::Acquire)
    }

    /// Last visible months reported, if any.
    pub fn last_visible(&self) -> Option<Vec<MonthId>> {
        self.lock_visible().as_ref().map(|set| set.months.clone())
    }

    /// Records `visible` and fetches the uncached months within `buffer`.
    ///
    /// The visible set is recorded even when the request is dropped, so a
    /// later refocus replays the newest position.
    pub fn on_visible_months_changed(&self, visible: &[MonthId], buffer: u32) -> FetchOutcome {
        *self.lock_visible() = Some(VisibleSet {
            months: visible.to_vec(),
            buffer,
        });
        self.fetch_missing(visible, buffer, "visible")
    }

    /// Replays the last visible set through miss detection.
    pub fn on_screen_focus(&self) -> FetchOutcome {
        let Some(last) = self.lock_visible().clone() else {
            debug!(
                "event=visible_fetch module=service status=skip trigger=focus reason=no_visible_months"
            );
            return FetchOutcome::NothingVisible;
        };
        self.fetch_missing(&last.months, last.buffer, "focus")
    }

    fn fetch_missing(&self, visible: &[MonthId], buffer: u32, trigger: &str) -> FetchOutcome {
        if visible.is_empty() {
            return FetchOutcome::NothingVisible;
        }
        let Some(_guard) = InFlightGuard::try_acquire(&self.fetching) else {
            info!(
                "event=visible_fetch module=service status=skip trigger={} reason=in_flight",
                trigger
            );
            return FetchOutcome::InFlight;
        };

        let missing: Vec<MonthId> = with_buffer(visible, buffer)
            .into_iter()
            .filter(|id| !self.cache.has_month(*id))
            .collect();
        if missing.is_empty() {
            debug!(
                "event=visible_fetch module=service status=skip trigger={} reason=all_cached",
                trigger
            );
            return FetchOutcome::AllCached;
        }

        let started_at = Instant::now();
        info!(
            "event=visible_fetch module=service status=start trigger={} missing={}",
            trigger,
            missing.len()
        );
        let aggregation = self
            .service
            .aggregate_detailed(missing.iter().copied(), self.week_start);
        let degraded = aggregation.degraded;
        self.cache.write_batch(aggregation.months);
        info!(
            "event=visible_fetch module=service status=ok trigger={} months={} degraded={} duration_ms={}",
            trigger,
            missing.len(),
            degraded,
            started_at.elapsed().as_millis()
        );
        FetchOutcome::Fetched {
            months: missing,
            degraded,
        }
    }

    fn lock_visible(&self) -> std::sync::MutexGuard<'_, Option<VisibleSet>> {
        self.last_visible
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Visible months widened by `buffer` months on each side, ascending.
pub fn with_buffer(visible: &[MonthId], buffer: u32) -> BTreeSet<MonthId> {
    let reach = i32::try_from(buffer).unwrap_or(i32::MAX);
    visible
        .iter()
        .flat_map(|id| (-reach..=reach).filter_map(move |delta| id.checked_offset(delta)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::with_buffer;
    use crate::model::month::MonthId;

    #[test]
    fn buffer_widens_both_sides_across_years() {
        let visible = [MonthId::new(2026, 1).unwrap()];
        let ids: Vec<String> = with_buffer(&visible, 2)
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(ids, vec!["2025-11", "2025-12", "2026-01", "2026-02", "2026-03"]);
    }

    #[test]
    fn overlapping_buffers_are_merged() {
        let visible = [MonthId::new(2026, 5).unwrap(), MonthId::new(2026, 6).unwrap()];
        assert_eq!(with_buffer(&visible, 2).len(), 6);
        assert_eq!(with_buffer(&visible, 0).len(), 2);
    }
}
