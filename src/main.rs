use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use serde_json::{Value, json};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use lupin::config::{self as cfg, ConfigDraft, ConfigStore, RestartPolicy};
use lupin::control::{ControlHandle, spawn_controller};
use lupin::input::{DryRunBackend, EnigoBackend, InputBackend};
use lupin::scheduler::{EngineEvent, ExitReason, Scheduler, StatusReport};
use lupin::sources::{self, CommandSource, ControlMessage, StdinSource};

/// Lupin CLI
#[derive(Debug, Parser)]
#[command(
    name = lupin::PKG_NAME,
    version = lupin::PKG_VERSION,
    about = "Keeps your session active with human-looking pointer and keyboard activity"
)]
struct Args {
    /// Path of the JSON file holding the last-used configuration
    #[arg(short = 'c', long = "config", default_value = "config/automation.json")]
    config: PathBuf,

    /// Enable dry-run mode (log input events instead of simulating them)
    #[arg(long = "dry-run")]
    dry_run: bool,

    /// Set log level (e.g., trace, debug, info, warn, error). Overrides RUST_LOG.
    #[arg(long = "log-level")]
    log_level: Option<String>,

    /// Print the JSON Schema for the configuration and exit
    #[arg(long = "print-schema")]
    print_schema: bool,

    /// Seed for reproducible timing and movement
    #[arg(long = "seed")]
    seed: Option<u64>,

    /// Resume the persisted configuration on launch (see --restart-policy)
    #[arg(long = "autostart")]
    autostart: bool,

    /// How --autostart treats the persisted `enabled` flag
    #[arg(long = "restart-policy", value_enum, default_value_t = RestartArg::KeepPersisted)]
    restart_policy: RestartArg,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RestartArg {
    /// Resume only if the last run was still active when the app closed
    KeepPersisted,
    /// Always resume
    ForceEnabled,
}

impl From<RestartArg> for RestartPolicy {
    fn from(arg: RestartArg) -> Self {
        match arg {
            RestartArg::KeepPersisted => RestartPolicy::KeepPersisted,
            RestartArg::ForceEnabled => RestartPolicy::ForceEnabled,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    lupin::init_tracing(args.log_level.as_deref());

    if args.print_schema {
        cfg::write_schema_to_writer(std::io::stdout())?;
        println!();
        return Ok(());
    }

    info!(
        version = lupin::PKG_VERSION,
        config = %args.config.display(),
        dry_run = args.dry_run,
        "Starting Lupin"
    );

    let store = ConfigStore::new(&args.config);
    let backend: Arc<dyn InputBackend> = if args.dry_run {
        Arc::new(DryRunBackend::default())
    } else {
        Arc::new(EnigoBackend::new())
    };
    let scheduler = Scheduler::builder(backend)
        .seed(args.seed)
        .build()
        .context("Scheduler needs a Tokio runtime")?;
    tokio::spawn(watch_events(scheduler.subscribe(), store.clone()));
    let (control, controller) = spawn_controller(scheduler);

    if args.autostart {
        if let Err(e) = autostart(&control, &store, args.restart_policy.into()).await {
            warn!(error = %format!("{e:#}"), "Autostart failed");
        }
    }

    let sources: Vec<Box<dyn CommandSource>> = vec![Box::new(StdinSource::new())];
    let (tx, mut rx) = mpsc::channel::<ControlMessage>(64);
    let _handles = sources::spawn_all_sources(&sources, tx);

    tokio::select! {
        _ = async {
            while let Some(msg) = rx.recv().await {
                let reply = match apply(&control, &store, msg).await {
                    Ok(body) => json!({ "ok": true, "result": body }),
                    Err(err) => {
                        warn!(error = %format!("{err:#}"), "Command failed");
                        json!({ "ok": false, "error": format!("{err:#}") })
                    }
                };
                println!("{reply}");
            }
        } => {
            if control.status().await.is_ok_and(|s| s.is_running()) {
                info!("Command input closed; running until Ctrl+C");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    // Leave the persisted `enabled` flag untouched so the next launch can resume.
    if control.status().await.is_ok_and(|s| s.is_running()) {
        if let Err(e) = control.stop().await {
            error!(error = %e, "Failed to stop the running session");
        }
    }
    drop(control);
    let _ = controller.await;

    info!("Lupin exited");
    Ok(())
}

/// Apply one control message and build the reply body.
async fn apply(
    control: &ControlHandle,
    store: &ConfigStore,
    msg: ControlMessage,
) -> anyhow::Result<Value> {
    match msg {
        ControlMessage::Start { config } => {
            let draft = match config {
                Some(draft) => draft,
                None => store.load().await?.unwrap_or_default(),
            };
            start_persisted(control, store, draft).await?;
            Ok(json!("started"))
        }
        ControlMessage::Stop => {
            control.stop().await?;
            store.set_enabled(false).await?;
            Ok(json!("stopped"))
        }
        ControlMessage::Status => {
            let state = control.status().await?;
            Ok(serde_json::to_value(StatusReport::from(&state))?)
        }
    }
}

/// Resume the persisted config according to `policy`.
async fn autostart(
    control: &ControlHandle,
    store: &ConfigStore,
    policy: RestartPolicy,
) -> anyhow::Result<()> {
    let Some(draft) = store.load().await?.and_then(|d| d.for_restart(policy)) else {
        info!(?policy, "Nothing to resume");
        return Ok(());
    };
    start_persisted(control, store, draft)
        .await
        .context("Failed to resume persisted config")?;
    info!(?policy, "Resumed persisted config");
    Ok(())
}

/// Persist `draft` as running, then start it.
///
/// The store is written before the session exists, so a session that halts
/// right away is always recorded as disabled afterwards by `watch_events`. If
/// the start is refused, the previous store contents are put back.
async fn start_persisted(
    control: &ControlHandle,
    store: &ConfigStore,
    draft: ConfigDraft,
) -> anyhow::Result<()> {
    let previous = store.load().await?;
    let draft = ConfigDraft {
        enabled: true,
        ..draft
    };
    store.save(&draft).await?;
    if let Err(e) = control.start(draft).await {
        if let Err(restore) = store.restore(previous.as_ref()).await {
            warn!(error = %format!("{restore:#}"), "Failed to restore persisted config");
        }
        return Err(e.into());
    }
    Ok(())
}

/// Log engine notifications; a fatal halt also clears the persisted `enabled`
/// flag so the next launch does not retry a denied permission.
async fn watch_events(mut events: broadcast::Receiver<EngineEvent>, store: ConfigStore) {
    loop {
        match events.recv().await {
            Ok(EngineEvent::Stopped {
                session,
                reason: ExitReason::Fatal(msg),
            }) => {
                error!(session, error = %msg, "Simulation halted; check input permissions");
                if let Err(e) = store.set_enabled(false).await {
                    warn!(error = %format!("{e:#}"), "Failed to update persisted config");
                }
            }
            Ok(event) => debug!(?event, "Engine event"),
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(skipped = n, "Engine event feed lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
