//! Calendar session facade.
//!
//! # Responsibility
//! - Wire config, window, cache, orchestrator, expander and sync status into
//!   the surface used by the UI and the CRUD layer.
//!
//! # Invariants
//! - Every window change prunes the cache to the new window bounds.
//! - CRUD notifications only invalidate; refetching happens on the next
//!   visibility or refocus event.

use crate::adapter::grid::{adapt_grid, GridView};
use crate::adapter::strip::{summarize_strip, StripSummary};
use crate::calendar::cache::{CacheChange, CalendarDataCache, ListenerId};
use crate::calendar::recurrence::{OccurrenceExpander, RRuleExpander};
use crate::calendar::window::{MonthWindow, MonthWindowManager};
use crate::config::{CalendarConfig, ConfigError};
use crate::model::date_range::DateRange;
use crate::model::month::MonthId;
use crate::model::todo::MonthData;
use crate::repo::range_gateway::RangeQueryGateway;
use crate::repo::todo_repo::{MutationScope, TodoMutation};
use crate::service::aggregation_service::BatchAggregationService;
use crate::service::fetch_orchestrator::{FetchOrchestrator, FetchOutcome};
use crate::service::handoff_service::{build_date_handoff, build_range_handoff, HandoffResult};
use crate::sync::status::{HandoffMeta, SyncSnapshot, SyncStatusSource};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// One calendar screen session over a range query gateway.
pub struct CalendarSession<G> {
    config: CalendarConfig,
    window: Mutex<MonthWindowManager>,
    cache: Arc<CalendarDataCache>,
    orchestrator: FetchOrchestrator<G>,
    expander: Box<dyn OccurrenceExpander + Send + Sync>,
    sync_status: Arc<dyn SyncStatusSource + Send + Sync>,
}

impl<G: RangeQueryGateway> CalendarSession<G> {
    /// Creates a session with a fresh cache and an empty window.
    pub fn new(gateway: G, config: CalendarConfig) -> Result<Self, ConfigError> {
        Self::with_cache(gateway, config, Arc::new(CalendarDataCache::new()))
    }

    /// Creates a session sharing `cache` with other consumers.
    pub fn with_cache(
        gateway: G,
        config: CalendarConfig,
        cache: Arc<CalendarDataCache>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let window = MonthWindowManager::with_limits(
            config.window_ceiling,
            config.window_retention,
            config.initial_span,
        );
        let orchestrator = FetchOrchestrator::new(
            BatchAggregationService::new(gateway),
            Arc::clone(&cache),
            config.week_start,
        );
        Ok(Self {
            config,
            window: Mutex::new(window),
            cache,
            orchestrator,
            expander: Box::new(RRuleExpander::new()),
            sync_status: Arc::new(SyncSnapshot::default()),
        })
    }

    pub fn with_expander<E>(mut self, expander: E) -> Self
    where
        E: OccurrenceExpander + Send + Sync + 'static,
    {
        self.expander = Box::new(expander);
        self
    }

    pub fn with_sync_status(mut self, source: Arc<dyn SyncStatusSource + Send + Sync>) -> Self {
        self.sync_status = source;
        self
    }

    pub fn config(&self) -> &CalendarConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<CalendarDataCache> {
        &self.cache
    }

    pub fn orchestrator(&self) -> &FetchOrchestrator<G> {
        &self.orchestrator
    }

    pub fn get_month_window(&self) -> MonthWindow {
        self.lock_window().window().clone()
    }

    /// Resets the window around `today` and prunes the cache to it.
    pub fn initialize_window(&self, today: NaiveDate) -> MonthWindow {
        let window = self.lock_window().initialize(today).clone();
        self.prune_to(&window);
        window
    }

    pub fn extend_future(&self, count: i32) -> MonthWindow {
        let window = self.lock_window().append_future(count).clone();
        self.prune_to(&window);
        window
    }

    pub fn extend_past(&self, count: i32) -> MonthWindow {
        let window = self.lock_window().prepend_past(count).clone();
        self.prune_to(&window);
        window
    }

    /// Fetches uncached months around `visible`; `None` uses the configured
    /// prefetch buffer. Explicit buffers are capped at the window ceiling.
    pub fn on_visible_months_changed(
        &self,
        visible: &[MonthId],
        buffer: Option<u32>,
    ) -> FetchOutcome {
        let buffer = buffer
            .unwrap_or(self.config.prefetch_buffer)
            .min(self.config.max_half_span());
        self.orchestrator.on_visible_months_changed(visible, buffer)
    }

    pub fn on_screen_focus(&self) -> FetchOutcome {
        self.orchestrator.on_screen_focus()
    }

    /// Cached data of `month`; `None` means not cached (a miss), never "empty".
    pub fn get_grid_view(&self, month: MonthId) -> Option<MonthData> {
        self.cache.month_data(month)
    }

    /// Dot summaries for every day of `range`; `None` uses the configured cap.
    pub fn get_strip_summary(
        &self,
        range: DateRange,
        max_dots: Option<usize>,
    ) -> BTreeMap<NaiveDate, StripSummary> {
        let handoff = self.range_handoff(range);
        summarize_strip(&handoff, max_dots.unwrap_or(self.config.max_dots))
    }

    /// Grid view of `months` built from one range handoff over their grids.
    pub fn grid_view_for_months(&self, months: &[MonthId]) -> GridView {
        let week_start = self.config.week_start;
        let Some(range) = DateRange::covering(
            months
                .iter()
                .map(|id| DateRange::month_grid(*id, week_start)),
        ) else {
            return GridView {
                ok: true,
                months: BTreeMap::new(),
                meta: HandoffMeta::from(self.sync_status.snapshot()),
                error: None,
            };
        };
        let handoff = self.range_handoff(range);
        adapt_grid(&handoff, months, week_start)
    }

    pub fn range_handoff(&self, range: DateRange) -> HandoffResult {
        build_range_handoff(
            self.orchestrator.service().gateway(),
            self.expander.as_ref(),
            range,
            self.sync_status.as_ref(),
        )
    }

    pub fn date_handoff(&self, date: NaiveDate) -> HandoffResult {
        build_date_handoff(
            self.orchestrator.service().gateway(),
            self.expander.as_ref(),
            date,
            self.sync_status.as_ref(),
        )
    }

    /// Invalidates the mutated month and its neighbours.
    pub fn notify_todo_mutated(&self, year: i32, month: u32) -> Vec<MonthId> {
        self.cache.invalidate_adjacent(year, month)
    }

    /// Applies the invalidation a repository write reported.
    pub fn notify_mutation(&self, mutation: &TodoMutation) {
        match &mutation.scope {
            MutationScope::Months(months) => {
                for id in months {
                    self.cache.invalidate_adjacent(id.year(), id.month());
                }
            }
            MutationScope::All => self.cache.clear_all(),
        }
    }

    /// Drops the whole cache (sync finished, logout).
    pub fn notify_bulk_invalidate(&self) {
        self.cache.clear_all();
    }

    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&CacheChange) + Send + Sync + 'static,
    {
        self.cache.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.cache.unsubscribe(id)
    }

    fn prune_to(&self, window: &MonthWindow) {
        if let Some((first, last)) = window.bounds() {
            self.cache.prune_to_window(first, last);
        }
    }

    fn lock_window(&self) -> MutexGuard<'_, MonthWindowManager> {
        self.window.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
