use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

/// Default lower bound of the tick interval (30 seconds).
pub const DEFAULT_MIN_INTERVAL_MS: u32 = 30_000;
/// Default upper bound of the tick interval (14 minutes).
pub const DEFAULT_MAX_INTERVAL_MS: u32 = 840_000;
/// Default pointer wander radius in pixels.
pub const DEFAULT_MOVEMENT_RANGE_PX: u32 = 300;
/// Default keystroke jitter window, in milliseconds.
pub const DEFAULT_KEYSTROKE_DELAY_MIN_MS: u32 = 50;
pub const DEFAULT_KEYSTROKE_DELAY_MAX_MS: u32 = 250;

/// Raw, unvalidated engine configuration.
///
/// This is what callers (a settings UI, the config store, a control message)
/// hand to the engine. It is only trusted after `validate_config` turns it into
/// a [`Config`]; the engine re-validates on every start.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct ConfigDraft {
    /// Caller intent flag. The engine itself ignores it; the restart policy
    /// consults it when resuming a persisted config.
    #[serde(default)]
    pub enabled: bool,

    /// Lower bound (inclusive) of the randomized pause between ticks.
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u32,

    /// Upper bound (inclusive) of the randomized pause between ticks.
    #[serde(default = "default_max_interval_ms")]
    pub max_interval_ms: u32,

    /// Maximum pointer displacement per axis, in pixels.
    #[serde(default = "default_movement_range_px", alias = "mouse_movement_range")]
    pub mouse_movement_range_px: u32,

    /// Click the primary button after each movement.
    #[serde(default)]
    pub enable_clicks: bool,

    /// Type `keyboard_text` on every tick.
    #[serde(default)]
    pub enable_keyboard: bool,

    /// Text typed when `enable_keyboard` is set. Empty or missing types a single
    /// filler character instead.
    #[serde(default)]
    pub keyboard_text: Option<String>,

    /// Applications the session is meant for. Reserved; not enforced.
    #[serde(default)]
    pub active_apps: BTreeSet<String>,

    /// Shortest pause between two typed characters.
    #[serde(default = "default_keystroke_delay_min_ms")]
    pub keystroke_delay_min_ms: u32,

    /// Longest pause between two typed characters.
    #[serde(default = "default_keystroke_delay_max_ms")]
    pub keystroke_delay_max_ms: u32,

    /// Glide the pointer along a curved path instead of jumping to the target.
    #[serde(default = "default_true")]
    pub smooth_motion: bool,
}

impl Default for ConfigDraft {
    fn default() -> Self {
        Self {
            enabled: false,
            min_interval_ms: DEFAULT_MIN_INTERVAL_MS,
            max_interval_ms: DEFAULT_MAX_INTERVAL_MS,
            mouse_movement_range_px: DEFAULT_MOVEMENT_RANGE_PX,
            enable_clicks: false,
            enable_keyboard: false,
            keyboard_text: None,
            active_apps: BTreeSet::new(),
            keystroke_delay_min_ms: DEFAULT_KEYSTROKE_DELAY_MIN_MS,
            keystroke_delay_max_ms: DEFAULT_KEYSTROKE_DELAY_MAX_MS,
            smooth_motion: true,
        }
    }
}

fn default_min_interval_ms() -> u32 {
    DEFAULT_MIN_INTERVAL_MS
}

fn default_max_interval_ms() -> u32 {
    DEFAULT_MAX_INTERVAL_MS
}

fn default_movement_range_px() -> u32 {
    DEFAULT_MOVEMENT_RANGE_PX
}

fn default_keystroke_delay_min_ms() -> u32 {
    DEFAULT_KEYSTROKE_DELAY_MIN_MS
}

fn default_keystroke_delay_max_ms() -> u32 {
    DEFAULT_KEYSTROKE_DELAY_MAX_MS
}

fn default_true() -> bool {
    true
}

/// Validated, immutable engine configuration for one session.
///
/// Only `validate_config` constructs this type, so every instance satisfies:
/// - `min_interval_ms <= max_interval_ms`, both inside the safe interval range
/// - `mouse_movement_range_px > 0`
/// - `0 < keystroke_delay_min_ms <= keystroke_delay_max_ms`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub(crate) min_interval_ms: u32,
    pub(crate) max_interval_ms: u32,
    pub(crate) mouse_movement_range_px: u32,
    pub(crate) enable_clicks: bool,
    pub(crate) enable_keyboard: bool,
    pub(crate) keyboard_text: String,
    pub(crate) active_apps: BTreeSet<String>,
    pub(crate) keystroke_delay_min_ms: u32,
    pub(crate) keystroke_delay_max_ms: u32,
    pub(crate) smooth_motion: bool,
}

impl Config {
    pub fn min_interval_ms(&self) -> u32 {
        self.min_interval_ms
    }

    pub fn max_interval_ms(&self) -> u32 {
        self.max_interval_ms
    }

    pub fn mouse_movement_range_px(&self) -> u32 {
        self.mouse_movement_range_px
    }

    pub fn enable_clicks(&self) -> bool {
        self.enable_clicks
    }

    pub fn enable_keyboard(&self) -> bool {
        self.enable_keyboard
    }

    pub fn keyboard_text(&self) -> &str {
        &self.keyboard_text
    }

    pub fn active_apps(&self) -> &BTreeSet<String> {
        &self.active_apps
    }

    pub fn keystroke_delay_ms(&self) -> (u32, u32) {
        (self.keystroke_delay_min_ms, self.keystroke_delay_max_ms)
    }

    pub fn smooth_motion(&self) -> bool {
        self.smooth_motion
    }

    /// Upper bound on how long a single action may take with this config:
    /// a full motion path plus the whole text at the slowest keystroke rate.
    pub fn worst_case_action(&self) -> Duration {
        let motion = if self.smooth_motion {
            crate::executor::motion::MAX_PATH_DURATION
        } else {
            Duration::ZERO
        };
        let typing = if self.enable_keyboard {
            let keys = self.keyboard_text.chars().count().max(1) as u64;
            Duration::from_millis(keys * u64::from(self.keystroke_delay_max_ms))
        } else {
            Duration::ZERO
        };
        motion + typing
    }
}

/// How a persisted config is treated when the controlling process restarts.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RestartPolicy {
    /// Resume only if the persisted config was running when it was saved.
    #[default]
    KeepPersisted,
    /// Always resume, forcing `enabled = true`.
    ForceEnabled,
}

impl ConfigDraft {
    /// Decide whether a persisted draft should be resumed under `policy`.
    /// Returns the draft to start with, or `None` to stay idle.
    pub fn for_restart(self, policy: RestartPolicy) -> Option<ConfigDraft> {
        match policy {
            RestartPolicy::KeepPersisted => self.enabled.then_some(self),
            RestartPolicy::ForceEnabled => Some(ConfigDraft {
                enabled: true,
                ..self
            }),
        }
    }
}
