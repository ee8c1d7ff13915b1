//! Enigo-backed input driver.
//!
//! Enigo is not `Send` on every platform, so it never leaves the thread that
//! created it. `EnigoDriver` is only a handle: each call ships a closure to a
//! dedicated input thread and waits for its answer. Dropping the handle closes
//! the job channel and the thread exits.

use enigo::Keyboard as _;
use enigo::Mouse as _;
use enigo::{Button as EButton, Coordinate, Direction, Enigo, Settings};
use std::sync::mpsc;
use std::thread;
use tracing::{debug, trace};

use super::{DriverError, InputBackend, InputDriver, MouseButton};

type Job = Box<dyn FnOnce(&mut Enigo) + Send>;

/// Backend that injects real OS input through Enigo.
#[derive(Debug, Default, Clone)]
pub struct EnigoBackend;

impl EnigoBackend {
    pub fn new() -> Self {
        Self
    }
}

impl InputBackend for EnigoBackend {
    fn name(&self) -> &'static str {
        "enigo"
    }

    fn connect(&self) -> Result<Box<dyn InputDriver>, DriverError> {
        Ok(Box::new(EnigoDriver::spawn()?))
    }
}

/// Handle to the input thread owning the Enigo connection.
pub struct EnigoDriver {
    jobs: mpsc::Sender<Job>,
}

impl EnigoDriver {
    /// Start the input thread and wait until Enigo is connected.
    pub fn spawn() -> Result<Self, DriverError> {
        let (jobs_tx, jobs_rx) = mpsc::channel::<Job>();
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<(), DriverError>>(1);

        thread::Builder::new()
            .name("lupin-input".into())
            .spawn(move || {
                trace!(target: "lupin::input", "Initializing Enigo");
                let mut enigo = match Enigo::new(&Settings::default()) {
                    Ok(enigo) => {
                        let _ = ready_tx.send(Ok(()));
                        enigo
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(classify_connect_error(&e.to_string())));
                        return;
                    }
                };
                while let Ok(job) = jobs_rx.recv() {
                    job(&mut enigo);
                }
                debug!(target: "lupin::input", "Input thread exiting");
            })
            .map_err(|e| {
                DriverError::DeviceUnavailable(format!("cannot spawn input thread: {e}"))
            })?;

        ready_rx.recv().map_err(|_| {
            DriverError::DeviceUnavailable("input thread exited during startup".into())
        })??;

        debug!(target: "lupin::input", "Enigo connected");
        Ok(Self { jobs: jobs_tx })
    }

    fn call<T, F>(&self, f: F) -> Result<T, DriverError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Enigo) -> Result<T, DriverError> + Send + 'static,
    {
        let (reply_tx, reply_rx) = mpsc::sync_channel(1);
        let job: Job = Box::new(move |enigo| {
            let _ = reply_tx.send(f(enigo));
        });
        self.jobs
            .send(job)
            .map_err(|_| DriverError::DeviceUnavailable("input thread is gone".into()))?;
        reply_rx
            .recv()
            .map_err(|_| DriverError::DeviceUnavailable("input thread dropped the request".into()))?
    }
}

impl InputDriver for EnigoDriver {
    fn pointer_position(&mut self) -> Result<(i32, i32), DriverError> {
        self.call(|enigo| enigo.location().map_err(dropped))
    }

    fn screen_bounds(&mut self) -> Result<(u32, u32), DriverError> {
        self.call(|enigo| {
            let (w, h) = enigo.main_display().map_err(dropped)?;
            Ok((w.max(0) as u32, h.max(0) as u32))
        })
    }

    fn move_pointer(&mut self, x: i32, y: i32) -> Result<(), DriverError> {
        self.call(move |enigo| enigo.move_mouse(x, y, Coordinate::Abs).map_err(dropped))
    }

    fn click(&mut self, button: MouseButton) -> Result<(), DriverError> {
        let btn = map_mouse_button(button);
        self.call(move |enigo| enigo.button(btn, Direction::Click).map_err(dropped))
    }

    fn send_key(&mut self, ch: char) -> Result<(), DriverError> {
        self.call(move |enigo| enigo.text(&ch.to_string()).map_err(dropped))
    }
}

fn dropped(e: enigo::InputError) -> DriverError {
    DriverError::EventDropped(e.to_string())
}

/// Enigo reports a missing accessibility grant as a connection error; tell it
/// apart from a missing display by its message.
fn classify_connect_error(message: &str) -> DriverError {
    if message.to_lowercase().contains("permission") {
        DriverError::PermissionDenied(message.to_string())
    } else {
        DriverError::DeviceUnavailable(message.to_string())
    }
}

fn map_mouse_button(btn: MouseButton) -> EButton {
    match btn {
        MouseButton::Left => EButton::Left,
        MouseButton::Middle => EButton::Middle,
        MouseButton::Right => EButton::Right,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_errors_are_classified() {
        assert!(matches!(
            classify_connect_error(
                "The application does not have the Permission to simulate input"
            ),
            DriverError::PermissionDenied(_)
        ));
        assert!(matches!(
            classify_connect_error("failed to open display"),
            DriverError::DeviceUnavailable(_)
        ));
    }

    #[test]
    fn buttons_map_one_to_one() {
        assert!(matches!(map_mouse_button(MouseButton::Left), EButton::Left));
        assert!(matches!(map_mouse_button(MouseButton::Middle), EButton::Middle));
        assert!(matches!(map_mouse_button(MouseButton::Right), EButton::Right));
    }
}
