//! The simulation loop of one session.

use rand::rngs::StdRng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use super::timing::sample_delay;
use super::{EngineEvent, ExitReason, Shared};
use crate::config::Config;
use crate::executor::{ActionError, ActionExecutor};
use crate::input::InputBackend;

/// Grace period added to the worst-case action time when waiting for a loop to exit.
pub const STOP_GRACE: Duration = Duration::from_secs(2);

/// Everything the loop needs, moved into its task.
pub(super) struct SessionContext {
    pub id: u64,
    pub config: Arc<Config>,
    pub cancel: CancellationToken,
    pub backend: Arc<dyn InputBackend>,
    pub rng: StdRng,
    pub events: broadcast::Sender<EngineEvent>,
}

/// Releases the session slot when the loop ends, however it ends.
///
/// The slot is cleared before `done` fires, so once a stopper observes `done`
/// the scheduler is already idle and no further action can run.
pub(super) struct SessionGuard {
    pub shared: Arc<Shared>,
    pub id: u64,
    pub done: watch::Sender<bool>,
    pub reason: Option<ExitReason>,
}

impl SessionGuard {
    fn finish(mut self, reason: ExitReason) {
        self.reason = Some(reason);
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let reason = self.reason.take().unwrap_or(ExitReason::Aborted);
        self.shared.release(self.id);
        match &reason {
            ExitReason::Cancelled => {
                info!(target: "lupin::scheduler", session = self.id, "Session stopped");
            }
            ExitReason::Fatal(msg) => {
                error!(
                    target: "lupin::scheduler",
                    session = self.id, error = %msg,
                    "Session halted"
                );
            }
            ExitReason::Aborted => {
                warn!(target: "lupin::scheduler", session = self.id, "Session task aborted");
            }
        }
        let _ = self.shared.events.send(EngineEvent::Stopped {
            session: self.id,
            reason,
        });
        let _ = self.done.send(true);
    }
}

/// Sleep, act, repeat until cancelled or a fatal input error.
pub(super) async fn run(ctx: SessionContext, guard: SessionGuard) {
    let SessionContext {
        id,
        config,
        cancel,
        backend,
        mut rng,
        events,
    } = ctx;

    let driver = match backend.connect() {
        Ok(driver) => driver,
        Err(e) => {
            error!(
                target: "lupin::scheduler",
                session = id, backend = backend.name(), error = %e,
                "Cannot open input driver"
            );
            guard.finish(ExitReason::Fatal(e.to_string()));
            return;
        }
    };
    debug!(
        target: "lupin::scheduler",
        session = id, backend = backend.name(),
        "Input driver connected"
    );
    let mut executor = ActionExecutor::new(driver);

    while !cancel.is_cancelled() {
        let delay = sample_delay(&mut rng, &config);
        trace!(
            target: "lupin::scheduler",
            session = id, delay_ms = delay.as_millis() as u64,
            "Sleeping until next tick"
        );

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = sleep(delay) => {}
        }

        match executor.perform(&config, &mut rng).await {
            Ok(action) => {
                debug!(target: "lupin::scheduler", session = id, ?action, "Tick done");
                let _ = events.send(EngineEvent::Acted {
                    session: id,
                    action,
                    slept: delay,
                });
            }
            Err(ActionError::Fatal(e)) => {
                guard.finish(ExitReason::Fatal(e.to_string()));
                return;
            }
            Err(e) => {
                warn!(
                    target: "lupin::scheduler",
                    session = id, error = %e,
                    "Tick partially failed"
                );
                let _ = events.send(EngineEvent::ActionFailed {
                    session: id,
                    error: e.to_string(),
                });
            }
        }
    }

    guard.finish(ExitReason::Cancelled);
}
