/*!
Input-injection capability.

The executor never talks to the OS directly; it drives an [`InputDriver`]
obtained from an [`InputBackend`]. A driver is opened per session, so a
permission granted (or revoked) between two sessions is picked up on the next
start.

Implementations:
- `enigo_driver.rs` -> `EnigoBackend`     (real OS input through Enigo)
- `dry_run.rs`      -> `DryRunBackend`    (logs events, moves a virtual pointer)
- `recording.rs`    -> `RecordingBackend` (captures calls with timestamps; test double,
  built for tests and with the `test-util` feature)
*/

use thiserror::Error;

pub mod dry_run;
pub mod enigo_driver;
#[cfg(any(test, feature = "test-util"))]
pub mod recording;

pub use dry_run::DryRunBackend;
pub use enigo_driver::EnigoBackend;
#[cfg(any(test, feature = "test-util"))]
pub use recording::{InputEvent, RecordedCall, RecordingBackend};

/// Mouse button enumeration.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
}

impl MouseButton {
    /// The button a plain "click" means.
    pub const PRIMARY: MouseButton = MouseButton::Left;
}

/// Failures reported by an input driver.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DriverError {
    /// The OS refused input injection (e.g. missing accessibility permission).
    #[error("input injection permission denied: {0}")]
    PermissionDenied(String),

    /// No usable input device or display connection.
    #[error("input device unavailable: {0}")]
    DeviceUnavailable(String),

    /// A single event could not be delivered; the device itself is fine.
    #[error("input event dropped: {0}")]
    EventDropped(String),
}

impl DriverError {
    /// Whether continuing the session is pointless after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DriverError::PermissionDenied(_) | DriverError::DeviceUnavailable(_)
        )
    }
}

/// A connected input-injection channel.
///
/// Coordinates are absolute screen pixels with the origin at the top-left of
/// the main display.
pub trait InputDriver: Send {
    /// Current pointer position.
    fn pointer_position(&mut self) -> Result<(i32, i32), DriverError>;

    /// Size of the visible screen as `(width, height)`.
    fn screen_bounds(&mut self) -> Result<(u32, u32), DriverError>;

    /// Move the pointer to an absolute position.
    fn move_pointer(&mut self, x: i32, y: i32) -> Result<(), DriverError>;

    /// Press and release `button` at the current position.
    fn click(&mut self, button: MouseButton) -> Result<(), DriverError>;

    /// Type a single character.
    fn send_key(&mut self, ch: char) -> Result<(), DriverError>;
}

/// Factory for input drivers, shared by all sessions of a scheduler.
pub trait InputBackend: Send + Sync {
    /// Static human-readable identifier (used in logs).
    fn name(&self) -> &'static str;

    /// Open a driver for one session.
    fn connect(&self) -> Result<Box<dyn InputDriver>, DriverError>;
}
