//! Stateless transforms from one `HandoffResult` into screen shapes.
//!
//! Adapters never fail: a failed handoff still yields the full output shape,
//! empty, with the handoff's meta and error carried through.

pub mod grid;
pub mod strip;

/// Color used for items without a category.
pub const DEFAULT_CATEGORY_COLOR: &str = "#9E9E9E";

pub(crate) fn category_color(item: &crate::service::handoff_service::AggregatedItem) -> &str {
    item.category
        .as_ref()
        .map(|category| category.color.trim())
        .filter(|color| !color.is_empty())
        .unwrap_or(DEFAULT_CATEGORY_COLOR)
}
