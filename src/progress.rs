//! Progress feedback while a conversion is in flight.
//!
//! Two pieces live here:
//!
//! * [`WorkflowObserver`]: a callback trait the controller and the narrator
//!   report to. Inject one via
//!   [`crate::config::ConversionConfigBuilder::observer`]; the CLI uses it to
//!   drive a terminal spinner.
//!
//! * [`ProgressNarrator`]: a timer task that walks through
//!   [`STATUS_MESSAGES`] at a fixed cadence. It knows nothing about the
//!   real request; the messages only pace the wait.
//!
//! # Example
//!
//! ```rust
//! use hand2excal::{WorkflowObserver, WorkflowPhase};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! struct CountingObserver {
//!     ticks: AtomicUsize,
//! }
//!
//! impl WorkflowObserver for CountingObserver {
//!     fn on_progress(&self, cursor: usize, message: &str) {
//!         self.ticks.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("[{cursor}] {message}");
//!     }
//! }
//! ```

use crate::preview::PreviewView;
use crate::workflow::WorkflowPhase;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

/// Status lines shown during a conversion, in order.
pub const STATUS_MESSAGES: [&str; 5] = [
    "Uploading your drawing…",
    "Reading shapes and labels…",
    "Tracing the arrows between steps…",
    "Laying out the Excalidraw canvas…",
    "Almost there, polishing the diagram…",
];

/// Index of the final status message; the cursor never goes past it.
pub const LAST_STATUS_INDEX: usize = STATUS_MESSAGES.len() - 1;

/// Receives workflow events.
///
/// Implementations must be `Send + Sync`: progress ticks arrive from the
/// narrator's tokio task. All methods default to no-ops.
pub trait WorkflowObserver: Send + Sync {
    /// Called after every state change.
    fn on_transition(&self, from: WorkflowPhase, to: WorkflowPhase) {
        let _ = (from, to);
    }

    /// Called once an accepted image has been rendered for preview.
    fn on_preview(&self, view: &PreviewView) {
        let _ = view;
    }

    /// Called when a conversion starts (`cursor == 0`) and on each advance.
    fn on_progress(&self, cursor: usize, message: &str) {
        let _ = (cursor, message);
    }
}

/// The default observer.
pub struct NoopObserver;

impl WorkflowObserver for NoopObserver {}

/// Type stored in [`crate::config::ConversionConfig`].
pub type SharedObserver = Arc<dyn WorkflowObserver>;

/// The running progress timer of one conversion attempt.
///
/// Dropping the narrator aborts its task, so the timer cannot outlive the
/// attempt that owns it.
#[derive(Debug)]
pub struct ProgressNarrator {
    cursor: watch::Receiver<usize>,
    task: JoinHandle<()>,
}

impl ProgressNarrator {
    /// Start at message 0 and advance one message per `period`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(period: Duration, observer: SharedObserver) -> Self {
        let (tx, rx) = watch::channel(0usize);
        observer.on_progress(0, STATUS_MESSAGES[0]);

        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut cursor = 0usize;
            while cursor < LAST_STATUS_INDEX {
                ticker.tick().await;
                cursor = (cursor + 1).min(LAST_STATUS_INDEX);
                tx.send_replace(cursor);
                debug!("Progress {}/{}", cursor, LAST_STATUS_INDEX);
                observer.on_progress(cursor, STATUS_MESSAGES[cursor]);
            }
        });

        Self { cursor: rx, task }
    }

    /// Current index into [`STATUS_MESSAGES`].
    pub fn cursor(&self) -> usize {
        *self.cursor.borrow()
    }

    pub fn message(&self) -> &'static str {
        STATUS_MESSAGES[self.cursor()]
    }

    /// Cancel the timer.
    pub fn stop(self) {
        // Drop does the work.
    }
}

impl Drop for ProgressNarrator {
    fn drop(&mut self) {
        self.task.abort();
    }
}
