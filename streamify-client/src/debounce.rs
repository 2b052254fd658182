//! Debounced search filter.
//!
//! Raw keystrokes go in through [`FilterInput`]; a timer task forwards the
//! trimmed text once it has been unchanged for the quiescence window. The
//! output channel has a single writer, the timer task, so consumers see
//! stabilized values in order and only when they differ from the last one.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::debug;

#[derive(Clone, Debug)]
pub struct FilterInput {
    raw: mpsc::UnboundedSender<String>,
}

impl FilterInput {
    /// Returns false once the timer task is gone.
    pub fn input(&self, raw: impl Into<String>) -> bool {
        self.raw.send(raw.into()).is_ok()
    }
}

pub struct DebouncedFilter {
    pub input: FilterInput,
    pub output: mpsc::UnboundedReceiver<String>,
    pub task: JoinHandle<()>,
}

/// Spawns the timer task on the current runtime. `initial` counts as already
/// emitted, so typing it back produces nothing.
pub fn debounce(initial: impl Into<String>, window: Duration) -> DebouncedFilter {
    let (raw_tx, raw_rx) = mpsc::unbounded_channel();
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(run(raw_rx, out_tx, initial.into().trim().to_string(), window));
    DebouncedFilter { input: FilterInput { raw: raw_tx }, output: out_rx, task }
}

async fn run(
    mut raw: mpsc::UnboundedReceiver<String>,
    out: mpsc::UnboundedSender<String>,
    mut last: String,
    window: Duration,
) {
    let mut pending: Option<String> = None;
    let timer = time::sleep(window);
    tokio::pin!(timer);
    loop {
        tokio::select! {
            next = raw.recv() => match next {
                Some(text) => {
                    pending = Some(text.trim().to_string());
                    timer.as_mut().reset(Instant::now() + window);
                }
                None => break,
            },
            () = &mut timer, if pending.is_some() => {
                let Some(value) = pending.take() else { continue };
                if value == last {
                    continue;
                }
                debug!(filter = %value, "filter stabilized");
                last = value.clone();
                if out.send(value).is_err() {
                    break;
                }
            }
        }
    }
}
