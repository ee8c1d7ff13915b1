use rand::Rng;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, trace, warn};

use crate::config::Config;
use crate::executor::{motion, typing};
use crate::input::{DriverError, InputDriver, MouseButton};

/// What one tick does. Planned from the config flags; never persisted.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Action {
    /// Move the pointer.
    MoveOnly,
    /// Move the pointer, then click the primary button there.
    MoveAndClick,
    /// Move (and click if `click`), then type the configured text.
    TypeText { click: bool },
}

impl Action {
    /// Pick the action for one tick. Movement is always part of it.
    pub fn plan(config: &Config) -> Self {
        match (config.enable_clicks(), config.enable_keyboard()) {
            (_, true) => Action::TypeText {
                click: config.enable_clicks(),
            },
            (true, false) => Action::MoveAndClick,
            (false, false) => Action::MoveOnly,
        }
    }

    pub fn clicks(self) -> bool {
        matches!(
            self,
            Action::MoveAndClick | Action::TypeText { click: true }
        )
    }

    pub fn types(self) -> bool {
        matches!(self, Action::TypeText { .. })
    }
}

/// Failure of one tick.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ActionError {
    /// The input channel is unusable; the session must end.
    #[error("fatal input failure: {0}")]
    Fatal(#[source] DriverError),

    /// Some events were lost; the rest of the tick ran.
    #[error("{dropped} input event(s) dropped during tick (last: {last})")]
    Transient { dropped: usize, last: DriverError },
}

impl ActionError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, ActionError::Fatal(_))
    }
}

/// Tracks dropped events within a tick; escalates fatal ones immediately.
#[derive(Default)]
struct Drops {
    count: usize,
    last: Option<DriverError>,
}

impl Drops {
    fn absorb<T>(&mut self, res: Result<T, DriverError>) -> Result<Option<T>, ActionError> {
        match res {
            Ok(v) => Ok(Some(v)),
            Err(e) if e.is_fatal() => Err(ActionError::Fatal(e)),
            Err(e) => {
                warn!(target: "lupin::actions", error = %e, "Input event dropped");
                self.count += 1;
                self.last = Some(e);
                Ok(None)
            }
        }
    }

    fn finish(self) -> Result<(), ActionError> {
        match self.last {
            None => Ok(()),
            Some(last) => Err(ActionError::Transient {
                dropped: self.count,
                last,
            }),
        }
    }
}

/// Synthesizes pointer and keyboard activity on one input driver.
///
/// Owned by a single session loop, so actions never overlap.
pub struct ActionExecutor {
    driver: Box<dyn InputDriver>,
}

impl ActionExecutor {
    pub fn new(driver: Box<dyn InputDriver>) -> Self {
        Self { driver }
    }

    /// Perform one tick's action and report which one ran.
    ///
    /// Typing blocks the tick until the last character is sent; it is never
    /// interrupted halfway.
    pub async fn perform<R: Rng + Send + ?Sized>(
        &mut self,
        config: &Config,
        rng: &mut R,
    ) -> Result<Action, ActionError> {
        let action = Action::plan(config);
        let mut drops = Drops::default();

        let moved = self.glide(config, rng, &mut drops).await?;

        if action.clicks() {
            if moved {
                trace!(target: "lupin::actions", "click");
                drops.absorb(self.driver.click(MouseButton::PRIMARY))?;
            } else {
                debug!(
                    target: "lupin::actions",
                    "Skipping click: pointer did not reach its target"
                );
            }
        }

        if action.types() {
            self.type_text(config, rng, &mut drops).await?;
        }

        drops.finish().map(|()| action)
    }

    /// Move to a random nearby point. Returns whether the target was reached.
    async fn glide<R: Rng + Send + ?Sized>(
        &mut self,
        config: &Config,
        rng: &mut R,
        drops: &mut Drops,
    ) -> Result<bool, ActionError> {
        let Some(bounds) = drops.absorb(self.driver.screen_bounds())? else {
            return Ok(false);
        };
        if bounds.0 == 0 || bounds.1 == 0 {
            return Err(ActionError::Fatal(DriverError::DeviceUnavailable(
                "screen reports zero size".into(),
            )));
        }
        let Some(from) = drops.absorb(self.driver.pointer_position())? else {
            return Ok(false);
        };

        let to = motion::pick_target(rng, from, config.mouse_movement_range_px(), bounds);
        let path = motion::plan_path(rng, from, to, bounds, config.smooth_motion());
        trace!(
            target: "lupin::actions",
            ?from, ?to, steps = path.len(),
            "glide"
        );

        let mut reached = false;
        for waypoint in path {
            reached = drops
                .absorb(self.driver.move_pointer(waypoint.x, waypoint.y))?
                .is_some();
            if !waypoint.pause.is_zero() {
                sleep(waypoint.pause).await;
            }
        }
        debug!(target: "lupin::actions", ?to, reached, "Pointer moved");
        Ok(reached)
    }

    async fn type_text<R: Rng + Send + ?Sized>(
        &mut self,
        config: &Config,
        rng: &mut R,
        drops: &mut Drops,
    ) -> Result<(), ActionError> {
        let keys = typing::keystrokes(rng, config.keyboard_text());
        let window = config.keystroke_delay_ms();
        debug!(target: "lupin::actions", keys = keys.len(), "Typing");

        let mut iter = keys.into_iter().peekable();
        while let Some(ch) = iter.next() {
            drops.absorb(self.driver.send_key(ch))?;
            if iter.peek().is_some() {
                sleep(typing::keystroke_delay(rng, ch, window)).await;
            }
        }
        Ok(())
    }
}
