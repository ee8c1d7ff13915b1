use thiserror::Error;
use tracing::trace;

use super::models::{Config, ConfigDraft};

/// Shortest interval the engine accepts between ticks (1 second).
pub const MIN_INTERVAL_FLOOR_MS: u32 = 1_000;
/// Longest interval the engine accepts between ticks (1 hour).
pub const MAX_INTERVAL_CEILING_MS: u32 = 3_600_000;

/// Reasons a [`ConfigDraft`] is rejected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InvalidConfig {
    #[error("{field} must be greater than zero")]
    ZeroInterval { field: &'static str },

    #[error("min_interval_ms ({min}) is greater than max_interval_ms ({max})")]
    IntervalOrder { min: u32, max: u32 },

    #[error("{field} ({value} ms) is below the {floor} ms floor")]
    IntervalTooShort {
        field: &'static str,
        value: u32,
        floor: u32,
    },

    #[error("{field} ({value} ms) exceeds the {ceiling} ms ceiling")]
    IntervalTooLong {
        field: &'static str,
        value: u32,
        ceiling: u32,
    },

    #[error("mouse_movement_range_px must be greater than zero")]
    ZeroMovementRange,

    #[error("keystroke_delay_min_ms must be greater than zero")]
    ZeroKeystrokeDelay,

    #[error("keystroke_delay_min_ms ({min}) is greater than keystroke_delay_max_ms ({max})")]
    KeystrokeDelayOrder { min: u32, max: u32 },
}

/// Turn a raw draft into a validated [`Config`].
///
/// Pure: no logging side effects beyond tracing, no I/O. Checks run in a fixed
/// order so the reported reason is stable for a given draft.
pub fn validate_config(draft: &ConfigDraft) -> Result<Config, InvalidConfig> {
    check_interval("min_interval_ms", draft.min_interval_ms)?;
    check_interval("max_interval_ms", draft.max_interval_ms)?;
    if draft.min_interval_ms > draft.max_interval_ms {
        return Err(InvalidConfig::IntervalOrder {
            min: draft.min_interval_ms,
            max: draft.max_interval_ms,
        });
    }

    if draft.mouse_movement_range_px == 0 {
        return Err(InvalidConfig::ZeroMovementRange);
    }

    if draft.keystroke_delay_min_ms == 0 {
        return Err(InvalidConfig::ZeroKeystrokeDelay);
    }
    if draft.keystroke_delay_min_ms > draft.keystroke_delay_max_ms {
        return Err(InvalidConfig::KeystrokeDelayOrder {
            min: draft.keystroke_delay_min_ms,
            max: draft.keystroke_delay_max_ms,
        });
    }

    trace!(target: "lupin::config", ?draft, "Config draft validated");

    Ok(Config {
        min_interval_ms: draft.min_interval_ms,
        max_interval_ms: draft.max_interval_ms,
        mouse_movement_range_px: draft.mouse_movement_range_px,
        enable_clicks: draft.enable_clicks,
        enable_keyboard: draft.enable_keyboard,
        keyboard_text: draft.keyboard_text.clone().unwrap_or_default(),
        active_apps: draft.active_apps.clone(),
        keystroke_delay_min_ms: draft.keystroke_delay_min_ms,
        keystroke_delay_max_ms: draft.keystroke_delay_max_ms,
        smooth_motion: draft.smooth_motion,
    })
}

fn check_interval(field: &'static str, value: u32) -> Result<(), InvalidConfig> {
    if value == 0 {
        return Err(InvalidConfig::ZeroInterval { field });
    }
    if value < MIN_INTERVAL_FLOOR_MS {
        return Err(InvalidConfig::IntervalTooShort {
            field,
            value,
            floor: MIN_INTERVAL_FLOOR_MS,
        });
    }
    if value > MAX_INTERVAL_CEILING_MS {
        return Err(InvalidConfig::IntervalTooLong {
            field,
            value,
            ceiling: MAX_INTERVAL_CEILING_MS,
        });
    }
    Ok(())
}
