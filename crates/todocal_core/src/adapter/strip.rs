//! Per-day dot summary adapter for the compact strip view.

use super::category_color;
use crate::service::handoff_service::HandoffResult;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

pub const DEFAULT_MAX_DOTS: usize = 3;

/// Dot summary for one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StripSummary {
    pub date: NaiveDate,
    pub has_todo: bool,
    /// Distinct category colors on this day.
    pub dot_count: usize,
    /// Dots hidden by the `max_dots` cap.
    pub overflow_count: usize,
    /// Colors to draw, first-seen order, at most `max_dots`.
    pub colors: Vec<String>,
}

/// Summarizes every day of the handoff range.
///
/// Colors are distinct by value (ASCII case-insensitive), so several todos
/// sharing one category color render as one dot.
pub fn summarize_strip(
    handoff: &HandoffResult,
    max_dots: usize,
) -> BTreeMap<NaiveDate, StripSummary> {
    handoff
        .range()
        .days()
        .map(|date| {
            let mut colors: Vec<String> = Vec::new();
            if handoff.ok() {
                for item in handoff.items_on(date) {
                    let color = category_color(item);
                    if !colors.iter().any(|known| known.eq_ignore_ascii_case(color)) {
                        colors.push(color.to_string());
                    }
                }
            }
            let dot_count = colors.len();
            colors.truncate(max_dots);
            let summary = StripSummary {
                date,
                has_todo: dot_count > 0,
                dot_count,
                overflow_count: dot_count.saturating_sub(max_dots),
                colors,
            };
            (date, summary)
        })
        .collect()
}
