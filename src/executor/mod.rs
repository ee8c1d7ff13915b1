#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

/*!
Executor module for Lupin.

This module wires together:
- `actions`: per-tick action planning and the `ActionExecutor` that drives an input driver
- `motion`: pointer target selection, screen clamping and smooth path synthesis
- `typing`: keystroke selection and inter-key jitter

Typical usage (the scheduler does this once per tick):

```no_run
use lupin::config::{ConfigDraft, validate_config};
use lupin::executor::ActionExecutor;
use lupin::input::{DryRunBackend, InputBackend};
use rand::SeedableRng;

# async fn demo() -> anyhow::Result<()> {
let cfg = validate_config(&ConfigDraft::default())?;
let mut exec = ActionExecutor::new(DryRunBackend::default().connect()?);
let mut rng = rand::rngs::StdRng::seed_from_u64(1);
exec.perform(&cfg, &mut rng).await?;
# Ok(())
# }
```
*/

pub mod actions;
pub mod motion;
pub mod typing;

// Re-exports for convenient access from `lupin::executor::*`
pub use actions::{Action, ActionError, ActionExecutor};
