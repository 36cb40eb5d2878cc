//! Calendar engine configuration.
//!
//! # Invariants
//! - Every field has a default, so `{}` is a valid configuration.
//! - A validated config always satisfies `1 <= window_retention <= window_ceiling`
//!   and `max_dots >= 1`.
//! - The prefetch set and the initial window (`2 * n + 1` months) both fit
//!   inside `window_ceiling`.

use crate::adapter::strip::DEFAULT_MAX_DOTS;
use crate::calendar::window::{INITIAL_SPAN, MEMORY_CEILING, RETENTION_COUNT};
use crate::model::date_range::WeekStart;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Months fetched on each side of the visible set.
pub const DEFAULT_PREFETCH_BUFFER: u32 = 2;

/// Invalid or unreadable calendar configuration.
#[derive(Debug)]
pub enum ConfigError {
    Parse(serde_json::Error),
    ZeroRetention,
    RetentionAboveCeiling { retention: usize, ceiling: usize },
    ZeroMaxDots,
    PrefetchBufferTooWide { buffer: u32, ceiling: usize },
    InitialSpanTooWide { span: u32, ceiling: usize },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "invalid calendar config: {err}"),
            Self::ZeroRetention => write!(f, "window_retention must be at least 1"),
            Self::RetentionAboveCeiling { retention, ceiling } => write!(
                f,
                "window_retention {retention} exceeds window_ceiling {ceiling}"
            ),
            Self::ZeroMaxDots => write!(f, "max_dots must be at least 1"),
            Self::PrefetchBufferTooWide { buffer, ceiling } => write!(
                f,
                "prefetch_buffer {buffer} spans more than window_ceiling {ceiling} months"
            ),
            Self::InitialSpanTooWide { span, ceiling } => write!(
                f,
                "initial_span {span} spans more than window_ceiling {ceiling} months"
            ),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CalendarConfig {
    pub week_start: WeekStart,
    pub prefetch_buffer: u32,
    pub max_dots: usize,
    pub window_ceiling: usize,
    pub window_retention: usize,
    pub initial_span: u32,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            week_start: WeekStart::Sunday,
            prefetch_buffer: DEFAULT_PREFETCH_BUFFER,
            max_dots: DEFAULT_MAX_DOTS,
            window_ceiling: MEMORY_CEILING,
            window_retention: RETENTION_COUNT,
            initial_span: INITIAL_SPAN,
        }
    }
}

impl CalendarConfig {
    /// Parses and validates a JSON document.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_retention == 0 {
            return Err(ConfigError::ZeroRetention);
        }
        if self.window_retention > self.window_ceiling {
            return Err(ConfigError::RetentionAboveCeiling {
                retention: self.window_retention,
                ceiling: self.window_ceiling,
            });
        }
        if self.max_dots == 0 {
            return Err(ConfigError::ZeroMaxDots);
        }
        if self.prefetch_buffer > self.max_half_span() {
            return Err(ConfigError::PrefetchBufferTooWide {
                buffer: self.prefetch_buffer,
                ceiling: self.window_ceiling,
            });
        }
        if self.initial_span > self.max_half_span() {
            return Err(ConfigError::InitialSpanTooWide {
                span: self.initial_span,
                ceiling: self.window_ceiling,
            });
        }
        Ok(())
    }

    /// Largest `n` for which `2 * n + 1` months fit in the window ceiling.
    pub fn max_half_span(&self) -> u32 {
        u32::try_from(self.window_ceiling.saturating_sub(1) / 2).unwrap_or(u32::MAX)
    }
}
