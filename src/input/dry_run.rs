//! Dry-run input backend.
//!
//! Logs every event instead of simulating input. The pointer lives on a virtual
//! screen so movement clamping still behaves as it would on a real display.

use tracing::{info, trace};

use super::{DriverError, InputBackend, InputDriver, MouseButton};

/// Backend that only logs. Selected with `--dry-run`.
#[derive(Debug, Clone)]
pub struct DryRunBackend {
    screen: (u32, u32),
}

impl DryRunBackend {
    /// Virtual screen of the given size.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            screen: (width, height),
        }
    }
}

impl Default for DryRunBackend {
    fn default() -> Self {
        Self::new(1920, 1080)
    }
}

impl InputBackend for DryRunBackend {
    fn name(&self) -> &'static str {
        "dry-run"
    }

    fn connect(&self) -> Result<Box<dyn InputDriver>, DriverError> {
        let (w, h) = self.screen;
        info!(target: "lupin::input", width = w, height = h, "DRY-RUN driver connected");
        Ok(Box::new(DryRunDriver {
            screen: self.screen,
            pointer: ((w / 2) as i32, (h / 2) as i32),
        }))
    }
}

struct DryRunDriver {
    screen: (u32, u32),
    pointer: (i32, i32),
}

impl InputDriver for DryRunDriver {
    fn pointer_position(&mut self) -> Result<(i32, i32), DriverError> {
        Ok(self.pointer)
    }

    fn screen_bounds(&mut self) -> Result<(u32, u32), DriverError> {
        Ok(self.screen)
    }

    fn move_pointer(&mut self, x: i32, y: i32) -> Result<(), DriverError> {
        trace!(target: "lupin::input", x, y, "DRY-RUN move_pointer");
        self.pointer = (x, y);
        Ok(())
    }

    fn click(&mut self, button: MouseButton) -> Result<(), DriverError> {
        let (x, y) = self.pointer;
        info!(target: "lupin::input", ?button, x, y, "DRY-RUN click");
        Ok(())
    }

    fn send_key(&mut self, ch: char) -> Result<(), DriverError> {
        info!(target: "lupin::input", ?ch, "DRY-RUN send_key");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pointer_starts_centered_and_follows_moves() {
        let backend = DryRunBackend::new(800, 600);
        let mut driver = backend.connect().unwrap();
        assert_eq!(driver.screen_bounds().unwrap(), (800, 600));
        assert_eq!(driver.pointer_position().unwrap(), (400, 300));

        driver.move_pointer(10, 20).unwrap();
        driver.click(MouseButton::PRIMARY).unwrap();
        assert_eq!(driver.pointer_position().unwrap(), (10, 20));
    }
}
