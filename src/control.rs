//! Control channel in front of the scheduler.
//!
//! Every front end (stdin, a tray menu, a settings window) talks to the engine
//! through a [`ControlHandle`]. Commands travel over one mpsc channel and are
//! applied by a single controller task in arrival order, so a `Stop` followed
//! by a `Start` is always applied in that order, with the stop fully completed
//! first.

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::ConfigDraft;
use crate::scheduler::{RunState, Scheduler, StartError, StopError};

/// Pending commands beyond this block the sender.
const COMMAND_CAPACITY: usize = 32;

/// A request to the controller, with its reply channel.
#[derive(Debug)]
pub enum Command {
    Start {
        config: ConfigDraft,
        reply: oneshot::Sender<Result<(), StartError>>,
    },
    Stop {
        reply: oneshot::Sender<Result<(), StopError>>,
    },
    Status {
        reply: oneshot::Sender<RunState>,
    },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ControlError {
    #[error(transparent)]
    Start(#[from] StartError),
    #[error(transparent)]
    Stop(#[from] StopError),
    #[error("controller is not running")]
    Closed,
}

/// Cloneable sender side of the control channel.
#[derive(Debug, Clone)]
pub struct ControlHandle {
    tx: mpsc::Sender<Command>,
}

impl ControlHandle {
    pub async fn start(&self, config: ConfigDraft) -> Result<(), ControlError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Start { config, reply }).await?;
        Ok(rx.await.map_err(|_| ControlError::Closed)??)
    }

    pub async fn stop(&self) -> Result<(), ControlError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Stop { reply }).await?;
        Ok(rx.await.map_err(|_| ControlError::Closed)??)
    }

    pub async fn status(&self) -> Result<RunState, ControlError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Status { reply }).await?;
        rx.await.map_err(|_| ControlError::Closed)
    }

    async fn send(&self, cmd: Command) -> Result<(), ControlError> {
        self.tx.send(cmd).await.map_err(|_| ControlError::Closed)
    }
}

/// Spawn the controller task that owns `scheduler`.
///
/// The task ends when every `ControlHandle` has been dropped. A session still
/// running at that point is stopped first.
pub fn spawn_controller(scheduler: Scheduler) -> (ControlHandle, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<Command>(COMMAND_CAPACITY);
    let task = tokio::spawn(async move {
        info!(target: "lupin::control", backend = scheduler.backend_name(), "Controller started");
        while let Some(cmd) = rx.recv().await {
            match cmd {
                Command::Start { config, reply } => {
                    let res = scheduler.start(&config);
                    debug!(target: "lupin::control", ok = res.is_ok(), "start");
                    let _ = reply.send(res);
                }
                Command::Stop { reply } => {
                    let res = scheduler.stop().await;
                    debug!(target: "lupin::control", ok = res.is_ok(), "stop");
                    let _ = reply.send(res);
                }
                Command::Status { reply } => {
                    let _ = reply.send(scheduler.status());
                }
            }
        }
        if scheduler.status().is_running() {
            let _ = scheduler.stop().await;
        }
        info!(target: "lupin::control", "Controller exited");
    });
    (ControlHandle { tx }, task)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::RecordingBackend;
    use crate::scheduler::Scheduler;
    use std::sync::Arc;
    use std::time::Duration;

    fn draft() -> ConfigDraft {
        ConfigDraft {
            min_interval_ms: 1_000,
            max_interval_ms: 1_500,
            mouse_movement_range_px: 20,
            ..ConfigDraft::default()
        }
    }

    fn controller(backend: &RecordingBackend) -> (ControlHandle, JoinHandle<()>) {
        let scheduler = Scheduler::builder(Arc::new(backend.clone()))
            .seed(Some(1))
            .build()
            .unwrap();
        spawn_controller(scheduler)
    }

    #[tokio::test(start_paused = true)]
    async fn start_status_stop_round() {
        let backend = RecordingBackend::new(640, 480, (320, 240));
        let (ctl, _task) = controller(&backend);

        assert!(!ctl.status().await.unwrap().is_running());
        ctl.start(draft()).await.unwrap();
        assert!(ctl.status().await.unwrap().is_running());
        assert_eq!(
            ctl.start(draft()).await,
            Err(ControlError::Start(StartError::AlreadyRunning))
        );

        tokio::time::sleep(Duration::from_secs(5)).await;
        ctl.stop().await.unwrap();
        assert!(!ctl.status().await.unwrap().is_running());
        assert!(!backend.calls().is_empty());
        assert_eq!(
            ctl.stop().await,
            Err(ControlError::Stop(StopError::NotRunning))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn stop_then_start_is_serialized() {
        let backend = RecordingBackend::new(640, 480, (320, 240));
        let (ctl, _task) = controller(&backend);
        ctl.start(draft()).await.unwrap();

        let (a, b) = tokio::join!(ctl.stop(), ctl.start(draft()));
        assert_eq!(a, Ok(()));
        assert_eq!(b, Ok(()));
        let state = ctl.status().await.unwrap();
        assert_eq!(state.session().map(|s| s.id), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_every_handle_stops_the_session() {
        let backend = RecordingBackend::new(640, 480, (320, 240));
        let (ctl, task) = controller(&backend);
        ctl.start(draft()).await.unwrap();
        drop(ctl);
        task.await.unwrap();

        let recorded = backend.calls().len();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(backend.calls().len(), recorded);
    }

    #[tokio::test]
    async fn invalid_config_is_returned_to_the_caller() {
        let backend = RecordingBackend::new(640, 480, (0, 0));
        let (ctl, _task) = controller(&backend);
        let mut bad = draft();
        bad.min_interval_ms = 0;
        assert!(matches!(
            ctl.start(bad).await,
            Err(ControlError::Start(StartError::InvalidConfig(_)))
        ));
    }
}
