/*!
Trigger sources (orchestration layer).

A trigger tells the runner that a scenario's conditions matched on the current
screen and its actions should run. Detection itself happens elsewhere; sources
only carry the resulting JSON events into the process.

- `stdin_source.rs` -> `StdinSource` (newline-delimited JSON from standard input)

Each source implementation is responsible for:
- Parsing raw input into `serde_json::Value`
- Pushing events via `Sender<Value>` while respecting backpressure (`send().await`)
- Logging errors and continuing (never panicking inside tasks)
- Ending cleanly when the channel closes or input is exhausted
*/

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::info;

pub mod stdin_source;

pub use stdin_source::StdinSource;

/// Trait implemented by all trigger sources.
///
/// A source spawns an asynchronous task that produces JSON events and sends
/// them into the provided channel.
pub trait EventSource: Send + Sync {
    /// Static human-readable identifier (used in logs).
    fn name(&self) -> &'static str;

    /// Start the source in the background.
    fn start(&self, sender: Sender<Value>) -> JoinHandle<()>;
}

/// A request to run one scenario, e.g. `{"scenario": "login"}`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Trigger {
    pub scenario: String,
}

impl Trigger {
    pub fn from_event(event: &Value) -> Result<Self> {
        Trigger::deserialize(event).context("Event is not a trigger (expected {\"scenario\": ...})")
    }
}

/// Spawn every source, returning their `JoinHandle`s.
pub fn spawn_all_sources(
    sources: &[Box<dyn EventSource>],
    sender: Sender<Value>,
) -> Vec<JoinHandle<()>> {
    sources
        .iter()
        .map(|src| {
            info!(
                target: "autoclick::sources",
                source = %src.name(),
                "Starting source task"
            );
            src.start(sender.clone())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_trigger() {
        let t = Trigger::from_event(&json!({"scenario": "login", "extra": 1})).unwrap();
        assert_eq!(t.scenario, "login");
        assert!(Trigger::from_event(&json!({"type": "x"})).is_err());
    }
}
