/*!
Scheduler: the only owner of simulation sessions.

`start` validates a draft, claims the single session slot and spawns the loop;
`stop` cancels it and waits until the loop has released the slot; `status`
snapshots the slot. At most one session exists at any time: the slot is claimed
under a lock in `start` and only the exiting loop gives it back, so a `start`
issued right after a `stop` can never overlap with the old loop.

In-loop outcomes never reach `start`/`stop` callers directly. They are
broadcast as [`EngineEvent`]s (see `subscribe`) and reflected by `status`.
*/

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::runtime::{Handle, TryCurrentError};
use tokio::sync::{broadcast, watch};
use tokio::time::{Instant, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{Config, ConfigDraft, InvalidConfig, validate_config};
use crate::executor::Action;
use crate::input::InputBackend;

pub mod session;
pub mod timing;

use session::{STOP_GRACE, SessionContext, SessionGuard};

/// Capacity of the engine event feed. Slow subscribers lag rather than block the loop.
const EVENT_CAPACITY: usize = 64;

/// Snapshot of a running session.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    /// Monotonically increasing per scheduler, starting at 1.
    pub id: u64,
    pub config: Arc<Config>,
    pub started_at: Instant,
    /// Cancellation was requested and the loop is winding down.
    pub stopping: bool,
}

/// Scheduler state as seen by callers.
#[derive(Debug, Clone)]
pub enum RunState {
    Idle,
    Running(SessionInfo),
}

impl RunState {
    pub fn is_running(&self) -> bool {
        matches!(self, RunState::Running(_))
    }

    pub fn session(&self) -> Option<&SessionInfo> {
        match self {
            RunState::Idle => None,
            RunState::Running(info) => Some(info),
        }
    }
}

/// Serializable view of a [`RunState`], for status replies.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StatusReport {
    pub state: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uptime_ms: Option<u64>,
    pub stopping: bool,
}

impl From<&RunState> for StatusReport {
    fn from(state: &RunState) -> Self {
        match state {
            RunState::Idle => StatusReport {
                state: "idle",
                session: None,
                uptime_ms: None,
                stopping: false,
            },
            RunState::Running(info) => StatusReport {
                state: "running",
                session: Some(info.id),
                uptime_ms: Some(info.started_at.elapsed().as_millis() as u64),
                stopping: info.stopping,
            },
        }
    }
}

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitReason {
    /// `stop` was called.
    Cancelled,
    /// The input channel failed for good (permission denied, no device).
    Fatal(String),
    /// The loop task was dropped without finishing (panic or runtime shutdown).
    Aborted,
}

/// Notifications published by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    Started { session: u64 },
    Acted { session: u64, action: Action, slept: Duration },
    ActionFailed { session: u64, error: String },
    Stopped { session: u64, reason: ExitReason },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StartError {
    #[error("a simulation session is already running")]
    AlreadyRunning,
    #[error("invalid config: {0}")]
    InvalidConfig(#[from] InvalidConfig),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StopError {
    #[error("no simulation session is running")]
    NotRunning,
    #[error("session {session} did not exit within {waited:?}")]
    Timeout { session: u64, waited: Duration },
}

/// A claimed session slot.
struct ActiveSession {
    info: SessionInfo,
    cancel: CancellationToken,
    done: watch::Receiver<bool>,
}

/// State shared between the scheduler and its session task.
pub(crate) struct Shared {
    slot: Mutex<Option<ActiveSession>>,
    events: broadcast::Sender<EngineEvent>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Option<ActiveSession>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Free the slot if it still belongs to session `id`.
    fn release(&self, id: u64) {
        let mut slot = self.lock();
        if slot.as_ref().is_some_and(|s| s.info.id == id) {
            *slot = None;
        }
    }
}

/// Builder for [`Scheduler`].
pub struct SchedulerBuilder {
    backend: Arc<dyn InputBackend>,
    seed: Option<u64>,
    stop_grace: Duration,
    runtime: Option<Handle>,
}

impl SchedulerBuilder {
    /// Seed for the per-session random generators. Session `n` uses `seed + n`.
    /// Without a seed every session draws from OS entropy.
    pub fn seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// Slack added to the worst-case action time when `stop` waits for exit.
    pub fn stop_grace(mut self, grace: Duration) -> Self {
        self.stop_grace = grace;
        self
    }

    /// Runtime that hosts session loops. Defaults to the current one.
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    /// Fails only when no runtime was given and none is current.
    pub fn build(self) -> Result<Scheduler, TryCurrentError> {
        let runtime = match self.runtime {
            Some(handle) => handle,
            None => Handle::try_current()?,
        };
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Scheduler {
            shared: Arc::new(Shared {
                slot: Mutex::new(None),
                events,
            }),
            backend: self.backend,
            seed: self.seed,
            stop_grace: self.stop_grace,
            runtime,
            next_id: AtomicU64::new(1),
        })
    }
}

/// Owner of the single simulation loop.
pub struct Scheduler {
    shared: Arc<Shared>,
    backend: Arc<dyn InputBackend>,
    seed: Option<u64>,
    stop_grace: Duration,
    runtime: Handle,
    next_id: AtomicU64,
}

impl Scheduler {
    pub fn builder(backend: Arc<dyn InputBackend>) -> SchedulerBuilder {
        SchedulerBuilder {
            backend,
            seed: None,
            stop_grace: STOP_GRACE,
            runtime: None,
        }
    }

    /// Validate `draft` and start a session.
    ///
    /// Returns as soon as the loop is spawned. Validation failures have no side
    /// effects; the input driver is only opened by the loop itself.
    pub fn start(&self, draft: &ConfigDraft) -> Result<(), StartError> {
        let config = Arc::new(validate_config(draft)?);

        let mut slot = self.shared.lock();
        if let Some(active) = slot.as_ref() {
            debug!(
                target: "lupin::scheduler",
                session = active.info.id,
                "Start rejected: session already running"
            );
            return Err(StartError::AlreadyRunning);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        let (done_tx, done_rx) = watch::channel(false);
        let info = SessionInfo {
            id,
            config: Arc::clone(&config),
            started_at: Instant::now(),
            stopping: false,
        };
        *slot = Some(ActiveSession {
            info,
            cancel: cancel.clone(),
            done: done_rx,
        });

        if !config.active_apps().is_empty() {
            debug!(
                target: "lupin::scheduler",
                apps = ?config.active_apps(),
                "active_apps is recorded but does not scope activity"
            );
        }
        info!(
            target: "lupin::scheduler",
            session = id,
            min_ms = config.min_interval_ms(),
            max_ms = config.max_interval_ms(),
            range_px = config.mouse_movement_range_px(),
            clicks = config.enable_clicks(),
            keyboard = config.enable_keyboard(),
            "Session starting"
        );
        let _ = self.shared.events.send(EngineEvent::Started { session: id });

        let ctx = SessionContext {
            id,
            config,
            cancel,
            backend: Arc::clone(&self.backend),
            rng: self.session_rng(id),
            events: self.shared.events.clone(),
        };
        let guard = SessionGuard {
            shared: Arc::clone(&self.shared),
            id,
            done: done_tx,
            reason: None,
        };
        self.runtime.spawn(session::run(ctx, guard));
        Ok(())
    }

    /// Cancel the running session and wait until its loop has exited.
    ///
    /// The wait is bounded by the worst case of one in-flight action plus the
    /// stop grace. On timeout the session stays registered; calling `stop`
    /// again waits once more.
    pub async fn stop(&self) -> Result<(), StopError> {
        let (id, mut done, waited) = {
            let mut slot = self.shared.lock();
            let Some(active) = slot.as_mut() else {
                return Err(StopError::NotRunning);
            };
            active.info.stopping = true;
            active.cancel.cancel();
            let waited = active.info.config.worst_case_action() + self.stop_grace;
            (active.info.id, active.done.clone(), waited)
        };
        debug!(target: "lupin::scheduler", session = id, "Stop requested");

        match timeout(waited, done.wait_for(|exited| *exited)).await {
            // A closed channel also means the guard is gone.
            Ok(_) => Ok(()),
            Err(_) => {
                warn!(
                    target: "lupin::scheduler",
                    session = id, waited_ms = waited.as_millis() as u64,
                    "Session did not exit in time"
                );
                Err(StopError::Timeout {
                    session: id,
                    waited,
                })
            }
        }
    }

    /// Read-only snapshot of the scheduler state.
    pub fn status(&self) -> RunState {
        match self.shared.lock().as_ref() {
            None => RunState::Idle,
            Some(active) => RunState::Running(active.info.clone()),
        }
    }

    /// Subscribe to engine notifications (starts, ticks, failures, exits).
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.shared.events.subscribe()
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    fn session_rng(&self, id: u64) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(id)),
            None => StdRng::from_os_rng(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{DriverError, InputEvent, RecordingBackend};
    use std::sync::Barrier;

    fn draft(min: u32, max: u32) -> ConfigDraft {
        ConfigDraft {
            min_interval_ms: min,
            max_interval_ms: max,
            mouse_movement_range_px: 50,
            ..ConfigDraft::default()
        }
    }

    fn scheduler(backend: &RecordingBackend) -> Scheduler {
        Scheduler::builder(Arc::new(backend.clone()))
            .seed(Some(42))
            .build()
            .unwrap()
    }

    async fn next_stop(rx: &mut broadcast::Receiver<EngineEvent>) -> (u64, ExitReason) {
        loop {
            if let EngineEvent::Stopped { session, reason } = rx.recv().await.unwrap() {
                return (session, reason);
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stop_while_idle_is_reported() {
        let backend = RecordingBackend::new(800, 600, (0, 0));
        let sched = scheduler(&backend);
        assert_eq!(sched.stop().await, Err(StopError::NotRunning));
        assert!(!sched.status().is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_config_has_no_side_effects() {
        let backend = RecordingBackend::new(800, 600, (0, 0));
        let sched = scheduler(&backend);

        let zero_min = draft(0, 2_000);
        let inverted = draft(3_000, 2_000);
        let mut zero_range = draft(1_000, 2_000);
        zero_range.mouse_movement_range_px = 0;

        for bad in [zero_min, inverted, zero_range] {
            assert!(matches!(
                sched.start(&bad),
                Err(StartError::InvalidConfig(_))
            ));
        }
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(!sched.status().is_running());
        assert_eq!(backend.connects(), 0);
        assert!(backend.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn second_start_is_rejected() {
        let backend = RecordingBackend::new(800, 600, (0, 0));
        let sched = scheduler(&backend);
        sched.start(&draft(1_000, 2_000)).unwrap();
        assert_eq!(
            sched.start(&draft(1_000, 2_000)),
            Err(StartError::AlreadyRunning)
        );
        let info = sched.status().session().cloned().unwrap();
        assert_eq!(info.id, 1);
        assert!(!info.stopping);
        sched.stop().await.unwrap();
    }

    #[tokio::test]
    async fn concurrent_starts_yield_exactly_one_session() {
        let backend = RecordingBackend::new(800, 600, (0, 0));
        let sched = scheduler(&backend);
        let callers = 8;
        let barrier = &Barrier::new(callers);
        let sched = &sched;

        let results: Vec<_> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..callers)
                .map(|_| {
                    s.spawn(move || {
                        barrier.wait();
                        sched.start(&draft(3_600_000, 3_600_000))
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let ok = results.iter().filter(|r| r.is_ok()).count();
        let busy = results
            .iter()
            .filter(|r| **r == Err(StartError::AlreadyRunning))
            .count();
        assert_eq!(ok, 1);
        assert_eq!(busy, callers - 1);

        sched.stop().await.unwrap();
        assert!(!sched.status().is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn move_only_scenario_ticks_within_interval() {
        let backend = RecordingBackend::new(1920, 1080, (960, 540));
        let sched = scheduler(&backend);
        let mut events = sched.subscribe();
        let started = Instant::now();
        sched.start(&draft(1_000, 2_000)).unwrap();

        let mut ticks = 0;
        while ticks < 20 {
            match events.recv().await.unwrap() {
                EngineEvent::Acted { action, .. } => {
                    assert_eq!(action, Action::MoveOnly);
                    ticks += 1;
                }
                EngineEvent::Started { .. } => {}
                other => panic!("unexpected {other:?}"),
            }
        }
        sched.stop().await.unwrap();

        let calls = backend.calls();
        assert!(
            calls
                .iter()
                .all(|c| matches!(c.event, InputEvent::Move { .. }))
        );

        // Group moves into ticks: steps of one glide are a few ms apart,
        // ticks are at least a second apart.
        let mut bursts: Vec<(Instant, Instant)> = Vec::new();
        for call in &calls {
            match bursts.last_mut() {
                Some((_, last)) if call.at - *last < Duration::from_millis(500) => {
                    *last = call.at;
                }
                _ => bursts.push((call.at, call.at)),
            }
        }
        assert_eq!(bursts.len(), 20);

        let window = Duration::from_millis(1_000)..=Duration::from_millis(2_000);
        assert!(window.contains(&(bursts[0].0 - started)));
        for pair in bursts.windows(2) {
            let gap = pair[1].0 - pair[0].1;
            assert!(window.contains(&gap), "gap {gap:?} outside the interval");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn no_input_after_stop_returns() {
        let backend = RecordingBackend::new(800, 600, (400, 300));
        let sched = scheduler(&backend);
        let mut d = draft(1_000, 1_200);
        d.enable_clicks = true;
        d.enable_keyboard = true;
        d.keyboard_text = Some("still here".into());
        sched.start(&d).unwrap();

        // Land in the middle of some tick.
        tokio::time::sleep(Duration::from_millis(5_300)).await;
        sched.stop().await.unwrap();
        let stopped_at = Instant::now();
        let recorded = backend.calls().len();
        assert!(recorded > 0);
        assert!(!sched.status().is_running());

        tokio::time::sleep(Duration::from_secs(30)).await;
        let calls = backend.calls();
        assert_eq!(calls.len(), recorded);
        assert!(calls.iter().all(|c| c.at <= stopped_at));
        // A word that was being typed is never cut short.
        assert_eq!(backend.typed().len() % "still here".len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_interrupts_the_sleep() {
        let backend = RecordingBackend::new(800, 600, (0, 0));
        let sched = scheduler(&backend);
        sched.start(&draft(3_600_000, 3_600_000)).unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;

        let before = Instant::now();
        sched.stop().await.unwrap();
        assert!(before.elapsed() < Duration::from_millis(10));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn restart_after_stop_gets_a_new_session() {
        let backend = RecordingBackend::new(800, 600, (0, 0));
        let sched = scheduler(&backend);
        let mut events = sched.subscribe();

        sched.start(&draft(1_000, 1_000)).unwrap();
        sched.stop().await.unwrap();
        sched.start(&draft(1_000, 1_000)).unwrap();
        assert_eq!(sched.status().session().map(|s| s.id), Some(2));

        assert_eq!(next_stop(&mut events).await, (1, ExitReason::Cancelled));
        sched.stop().await.unwrap();
        assert_eq!(next_stop(&mut events).await, (2, ExitReason::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_error_halts_and_reverts_to_idle() {
        let backend = RecordingBackend::new(800, 600, (0, 0));
        backend.fail_moves(DriverError::PermissionDenied("accessibility revoked".into()));
        let sched = scheduler(&backend);
        let mut events = sched.subscribe();
        sched.start(&draft(1_000, 2_000)).unwrap();

        let (session, reason) = next_stop(&mut events).await;
        assert_eq!(session, 1);
        assert!(matches!(reason, ExitReason::Fatal(msg) if msg.contains("accessibility")));
        assert!(!sched.status().is_running());
        assert_eq!(sched.stop().await, Err(StopError::NotRunning));
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_keystroke_halts_the_session() {
        let backend = RecordingBackend::new(800, 600, (0, 0));
        backend.fail_keys(DriverError::PermissionDenied("input monitoring revoked".into()));
        let sched = scheduler(&backend);
        let mut events = sched.subscribe();
        let mut d = draft(1_000, 2_000);
        d.enable_keyboard = true;
        d.keyboard_text = Some("typing".into());
        sched.start(&d).unwrap();

        let (session, reason) = next_stop(&mut events).await;
        assert_eq!(session, 1);
        assert!(matches!(reason, ExitReason::Fatal(msg) if msg.contains("input monitoring")));
        assert!(!sched.status().is_running());

        // Only the first tick's pointer motion reached the driver.
        let recorded = backend.calls().len();
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(backend.calls().len(), recorded);
        assert!(backend.typed().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn connect_failure_is_fatal_before_any_tick() {
        let backend = RecordingBackend::new(800, 600, (0, 0));
        backend.fail_connect(DriverError::DeviceUnavailable("no display".into()));
        let sched = scheduler(&backend);
        let mut events = sched.subscribe();
        sched.start(&draft(1_000, 2_000)).unwrap();

        let (_, reason) = next_stop(&mut events).await;
        assert!(matches!(reason, ExitReason::Fatal(_)));
        assert!(backend.calls().is_empty());
        assert!(sched.start(&draft(1_000, 2_000)).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn transient_errors_keep_the_loop_alive() {
        let backend = RecordingBackend::new(800, 600, (0, 0));
        backend.fail_clicks(DriverError::EventDropped("busy".into()));
        let sched = scheduler(&backend);
        let mut events = sched.subscribe();
        let mut d = draft(1_000, 1_000);
        d.enable_clicks = true;
        sched.start(&d).unwrap();

        let mut failures = 0;
        while failures < 3 {
            if let EngineEvent::ActionFailed { .. } = events.recv().await.unwrap() {
                failures += 1;
            }
        }
        assert!(sched.status().is_running());
        sched.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn seeded_sessions_are_reproducible() {
        let mut runs = Vec::new();
        for _ in 0..2 {
            let backend = RecordingBackend::new(800, 600, (400, 300));
            let sched = scheduler(&backend);
            sched.start(&draft(1_000, 2_000)).unwrap();
            tokio::time::sleep(Duration::from_secs(10)).await;
            sched.stop().await.unwrap();
            runs.push(
                backend
                    .calls()
                    .into_iter()
                    .map(|c| c.event)
                    .collect::<Vec<_>>(),
            );
        }
        assert!(!runs[0].is_empty());
        assert_eq!(runs[0], runs[1]);
    }

    #[test]
    fn status_report_shapes() {
        let idle = StatusReport::from(&RunState::Idle);
        assert_eq!(
            serde_json::to_value(&idle).unwrap(),
            serde_json::json!({"state": "idle", "stopping": false})
        );
    }
}
