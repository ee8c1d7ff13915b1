//! Recording input backend.
//!
//! Captures every driver call with a `tokio::time::Instant` timestamp so timing
//! can be asserted under a paused test clock. Failures can be scripted per
//! event kind to exercise the fatal and transient error paths.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::time::Instant;

use super::{DriverError, InputBackend, InputDriver, MouseButton};

/// One injected event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    Move { x: i32, y: i32 },
    Click(MouseButton),
    Key(char),
}

/// An event together with the instant it was injected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordedCall {
    pub at: Instant,
    pub event: InputEvent,
}

#[derive(Debug, Default)]
struct Failures {
    connect: Option<DriverError>,
    moves: Option<DriverError>,
    clicks: Option<DriverError>,
    keys: Option<DriverError>,
}

#[derive(Debug)]
struct Shared {
    screen: (u32, u32),
    pointer: (i32, i32),
    calls: Vec<RecordedCall>,
    connects: usize,
    failures: Failures,
}

/// In-memory backend; clones share the same recording.
#[derive(Debug, Clone)]
pub struct RecordingBackend {
    shared: Arc<Mutex<Shared>>,
}

impl RecordingBackend {
    /// Screen of `width x height` with the pointer at `pointer`.
    pub fn new(width: u32, height: u32, pointer: (i32, i32)) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared {
                screen: (width, height),
                pointer,
                calls: Vec::new(),
                connects: 0,
                failures: Failures::default(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make `connect` fail with `error`.
    pub fn fail_connect(&self, error: DriverError) {
        self.lock().failures.connect = Some(error);
    }

    /// Make every pointer move fail with `error`.
    pub fn fail_moves(&self, error: DriverError) {
        self.lock().failures.moves = Some(error);
    }

    /// Make every click fail with `error`.
    pub fn fail_clicks(&self, error: DriverError) {
        self.lock().failures.clicks = Some(error);
    }

    /// Make every keystroke fail with `error`.
    pub fn fail_keys(&self, error: DriverError) {
        self.lock().failures.keys = Some(error);
    }

    /// Snapshot of all successfully injected events, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.lock().calls.clone()
    }

    /// Only the typed characters, in order.
    pub fn typed(&self) -> String {
        self.lock()
            .calls
            .iter()
            .filter_map(|c| match c.event {
                InputEvent::Key(ch) => Some(ch),
                _ => None,
            })
            .collect()
    }

    /// How many drivers were opened.
    pub fn connects(&self) -> usize {
        self.lock().connects
    }

    pub fn pointer(&self) -> (i32, i32) {
        self.lock().pointer
    }
}

impl InputBackend for RecordingBackend {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn connect(&self) -> Result<Box<dyn InputDriver>, DriverError> {
        let mut shared = self.lock();
        if let Some(err) = shared.failures.connect.clone() {
            return Err(err);
        }
        shared.connects += 1;
        Ok(Box::new(RecordingDriver {
            shared: Arc::clone(&self.shared),
        }))
    }
}

struct RecordingDriver {
    shared: Arc<Mutex<Shared>>,
}

impl RecordingDriver {
    fn record(
        &self,
        event: InputEvent,
        failure: impl FnOnce(&Failures) -> Option<DriverError>,
    ) -> Result<(), DriverError> {
        let mut shared = self.shared.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(err) = failure(&shared.failures) {
            return Err(err);
        }
        if let InputEvent::Move { x, y } = event {
            shared.pointer = (x, y);
        }
        shared.calls.push(RecordedCall {
            at: Instant::now(),
            event,
        });
        Ok(())
    }
}

impl InputDriver for RecordingDriver {
    fn pointer_position(&mut self) -> Result<(i32, i32), DriverError> {
        Ok(self
            .shared
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pointer)
    }

    fn screen_bounds(&mut self) -> Result<(u32, u32), DriverError> {
        Ok(self
            .shared
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .screen)
    }

    fn move_pointer(&mut self, x: i32, y: i32) -> Result<(), DriverError> {
        self.record(InputEvent::Move { x, y }, |f| f.moves.clone())
    }

    fn click(&mut self, button: MouseButton) -> Result<(), DriverError> {
        self.record(InputEvent::Click(button), |f| f.clicks.clone())
    }

    fn send_key(&mut self, ch: char) -> Result<(), DriverError> {
        self.record(InputEvent::Key(ch), |f| f.keys.clone())
    }
}
