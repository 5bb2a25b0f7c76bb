//! Stdin trigger source.
//!
//! Reads newline-delimited JSON triggers, for example from a detector process:
//!     detector | autoclick --config config.json
//!
//! Blank lines are skipped, malformed lines are logged and skipped. EOF or a
//! closed channel ends the task.

use serde_json::Value;
use tokio::{
    io::{self, AsyncBufRead, AsyncBufReadExt, BufReader},
    sync::mpsc::Sender,
    task::JoinHandle,
};
use tracing::{debug, info, trace, warn};

use super::EventSource;

/// Source that reads newline-delimited JSON triggers from stdin.
#[derive(Debug, Clone, Default)]
pub struct StdinSource;

impl StdinSource {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl EventSource for StdinSource {
    fn name(&self) -> &'static str {
        "stdin"
    }

    fn start(&self, sender: Sender<Value>) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(target: "autoclick::sources", "Reading triggers from stdin");
            let forwarded = forward_lines(BufReader::new(io::stdin()), sender).await;
            info!(target: "autoclick::sources", forwarded, "Stdin source ended");
        })
    }
}

/// Forward every JSON line of `reader` to `sender`. Returns how many events were sent.
pub async fn forward_lines<R>(reader: R, sender: Sender<Value>) -> usize
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut forwarded = 0;

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                debug!(target: "autoclick::sources", "EOF on trigger input");
                break;
            }
            Err(e) => {
                warn!(target: "autoclick::sources", error = %e, "Failed to read trigger input");
                break;
            }
        };

        let raw = line.trim();
        if raw.is_empty() {
            continue;
        }
        let value = match serde_json::from_str::<Value>(raw) {
            Ok(value) => value,
            Err(e) => {
                warn!(target: "autoclick::sources", error = %e, line = raw, "Ignoring malformed trigger line");
                continue;
            }
        };

        trace!(target: "autoclick::sources", "Forwarding trigger");
        if sender.send(value).await.is_err() {
            debug!(target: "autoclick::sources", "Trigger channel closed");
            break;
        }
        forwarded += 1;
    }

    forwarded
}
