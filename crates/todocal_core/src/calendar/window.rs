//! Month scroll window bookkeeping.
//!
//! # Responsibility
//! - Maintain the ordered sequence of months the calendar can scroll over.
//! - Grow the window forward/backward and bound its memory footprint.
//!
//! # Invariants
//! - The window is strictly contiguous, ascending and free of duplicates.
//! - After any mutation, `len() <= ceiling`; a trim always leaves exactly
//!   `retention` months, keeping the end that was just extended.
//! - Growing an empty window is a logged no-op, never an error.

use crate::model::month::{MonthId, MonthMetadata};
use chrono::NaiveDate;
use log::{info, warn};
use serde::Serialize;

/// Months kept before a trim is forced.
pub const MEMORY_CEILING: usize = 100;
/// Months kept after a trim.
pub const RETENTION_COUNT: usize = 50;
/// Months on each side of "now" created by `initialize`.
pub const INITIAL_SPAN: u32 = 2;

/// Direction of the last window extension; decides which end a trim keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrimBias {
    /// Keep the newest months (forward scrolling).
    KeepLatest,
    /// Keep the oldest months (backward scrolling).
    KeepEarliest,
}

/// Ordered, contiguous month sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct MonthWindow {
    months: Vec<MonthMetadata>,
}

impl MonthWindow {
    pub fn months(&self) -> &[MonthMetadata] {
        &self.months
    }

    pub fn len(&self) -> usize {
        self.months.len()
    }

    pub fn is_empty(&self) -> bool {
        self.months.is_empty()
    }

    pub fn first(&self) -> Option<&MonthMetadata> {
        self.months.first()
    }

    pub fn last(&self) -> Option<&MonthMetadata> {
        self.months.last()
    }

    pub fn ids(&self) -> Vec<MonthId> {
        self.months.iter().map(|meta| meta.id).collect()
    }

    /// `(first, last)` month ids, if the window is non-empty.
    pub fn bounds(&self) -> Option<(MonthId, MonthId)> {
        Some((self.first()?.id, self.last()?.id))
    }

    pub fn contains(&self, id: MonthId) -> bool {
        self.bounds()
            .is_some_and(|(first, last)| first <= id && id <= last)
    }
}

/// Owner of the calendar's month window.
#[derive(Debug, Clone)]
pub struct MonthWindowManager {
    window: MonthWindow,
    ceiling: usize,
    retention: usize,
    initial_span: u32,
}

impl Default for MonthWindowManager {
    fn default() -> Self {
        Self::new()
    }
}

impl MonthWindowManager {
    /// Manager with the default ceiling (100) and retention (50).
    pub fn new() -> Self {
        Self::with_limits(MEMORY_CEILING, RETENTION_COUNT, INITIAL_SPAN)
    }

    /// Manager with explicit limits; `retention` is clamped to `1..=ceiling`.
    pub fn with_limits(ceiling: usize, retention: usize, initial_span: u32) -> Self {
        let ceiling = ceiling.max(1);
        Self {
            window: MonthWindow::default(),
            ceiling,
            retention: retention.clamp(1, ceiling),
            initial_span,
        }
    }

    pub fn window(&self) -> &MonthWindow {
        &self.window
    }

    /// Replaces the window with the months `now - span ..= now + span`.
    pub fn initialize(&mut self, now: NaiveDate) -> &MonthWindow {
        let center = MonthMetadata::from_date(now);
        let span = i32::try_from(self.initial_span).unwrap_or(i32::MAX);
        let months: Vec<MonthMetadata> = (-span..=span)
            .filter_map(|delta| center.checked_offset(delta))
            .collect();
        self.window = MonthWindow { months };
        info!(
            "event=window_init module=calendar status=ok center={} len={}",
            center.id,
            self.window.len()
        );
        self.enforce_ceiling_with(TrimBias::KeepLatest);
        &self.window
    }

    /// Appends `count` months after the current last month.
    pub fn append_future(&mut self, count: i32) -> &MonthWindow {
        if count <= 0 {
            return &self.window;
        }
        let Some(last) = self.window.last().copied() else {
            warn!(
                "event=window_extend module=calendar status=skip direction=future reason=empty_window"
            );
            return &self.window;
        };

        let later: Vec<MonthMetadata> = (1..=count)
            .map_while(|delta| last.checked_offset(delta))
            .collect();
        let added = later.len();
        self.window.months.extend(later);
        info!(
            "event=window_extend module=calendar status=ok direction=future added={} len={}",
            added,
            self.window.len()
        );
        self.enforce_ceiling_with(TrimBias::KeepLatest);
        &self.window
    }

    /// Prepends `count` months before the current first month.
    pub fn prepend_past(&mut self, count: i32) -> &MonthWindow {
        if count <= 0 {
            return &self.window;
        }
        let Some(first) = self.window.first().copied() else {
            warn!(
                "event=window_extend module=calendar status=skip direction=past reason=empty_window"
            );
            return &self.window;
        };

        let mut earlier: Vec<MonthMetadata> = (1..=count)
            .map_while(|delta| first.checked_offset(-delta))
            .collect();
        earlier.reverse();
        let added = earlier.len();
        earlier.append(&mut self.window.months);
        self.window.months = earlier;
        info!(
            "event=window_extend module=calendar status=ok direction=past added={} len={}",
            added,
            self.window.len()
        );
        self.enforce_ceiling_with(TrimBias::KeepEarliest);
        &self.window
    }

    /// Trims to `retention` months when over the ceiling, keeping the newest.
    pub fn enforce_ceiling(&mut self) -> &MonthWindow {
        self.enforce_ceiling_with(TrimBias::KeepLatest);
        &self.window
    }

    fn enforce_ceiling_with(&mut self, bias: TrimBias) {
        let len = self.window.len();
        if len <= self.ceiling {
            return;
        }
        match bias {
            TrimBias::KeepLatest => {
                self.window.months.drain(..len - self.retention);
            }
            TrimBias::KeepEarliest => {
                self.window.months.truncate(self.retention);
            }
        }
        info!(
            "event=window_trim module=calendar status=ok before={} after={} bias={:?}",
            len,
            self.window.len(),
            bias
        );
    }
}
