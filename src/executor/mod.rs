#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

/*!
Executor module for Autoclick.

This module wires together:
- `actions`: effect types (gestures, text input, system buttons), listener callbacks
  and the primary context that delivers them
- `runtime`: the `ActionExecutor` state machine that walks an action list, honoring
  pauses and the optional minimum delay between actions

Typical usage:
- Spawn a `MainContext` with your `Listeners`.
- Construct an `ActionExecutor` with a worker runtime handle and that context.
- Call `ActionExecutor::execute` with an action list; await `wait_idle` if needed.

Example:
```no_run
use autoclick::config::Action;
use autoclick::executor::{ActionExecutor, Listeners, MainContext};
use tokio::runtime::Handle;

# async fn demo() {
let (main, _primary) = MainContext::spawn(Listeners::default(), &Handle::current());
let executor = ActionExecutor::new(Handle::current(), main);
executor
    .execute(vec![Action::Pause { duration_ms: 100 }], None)
    .expect("executor is idle");
executor.wait_idle().await;
# }
```
*/

pub mod actions;
pub mod runtime;

// Re-exports for convenient access from `autoclick::executor::*`
pub use actions::{Effect, Gesture, Listeners, MainContext, Point, Stroke, join_primary};
pub use runtime::{ActionExecutor, ExecutorError, ExecutorState};
