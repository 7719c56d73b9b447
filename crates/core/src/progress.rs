//! Uniform progress reporting.
//!
//! Every long-running operation (asset download, input staging, transcode)
//! reports through a [`ProgressReporter`]. A reporter guarantees that the
//! percentages it emits for one operation start at 0, never decrease and
//! end at 100 when the operation completes.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// The operation a progress event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressOperation {
    /// Downloading the engine payload.
    Download,
    /// Copying the input file into the engine workspace.
    Staging,
    /// Running the transcode command.
    Transcode,
}

/// A single progress update.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Operation being reported.
    pub operation: ProgressOperation,
    /// Completion percentage (0.0 - 100.0).
    pub percent: f32,
}

/// Byte-level progress of a streaming read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteProgress {
    /// Bytes received so far.
    pub received: u64,
    /// Total size if known up front.
    pub total: Option<u64>,
}

impl ByteProgress {
    /// Percentage complete, if the total is known.
    pub fn percent(&self) -> Option<f32> {
        match self.total {
            Some(0) => Some(100.0),
            Some(total) => Some(((self.received as f64 / total as f64) * 100.0).min(100.0) as f32),
            None => None,
        }
    }
}

/// Emits monotonic progress events for one operation.
///
/// Sends never block and never drop events while the receiver is alive,
/// so a slow consumer still sees the final 100%. A closed receiver is
/// ignored.
#[derive(Debug)]
pub struct ProgressReporter {
    operation: ProgressOperation,
    tx: Option<mpsc::UnboundedSender<ProgressEvent>>,
    last: f32,
    finished: bool,
}

impl ProgressReporter {
    /// Creates a reporter and emits the initial 0% event.
    pub fn start(
        operation: ProgressOperation,
        tx: Option<mpsc::UnboundedSender<ProgressEvent>>,
    ) -> Self {
        let reporter = Self {
            operation,
            tx,
            last: 0.0,
            finished: false,
        };
        reporter.send(0.0);
        reporter
    }

    /// A reporter that discards every event.
    pub fn silent(operation: ProgressOperation) -> Self {
        Self::start(operation, None)
    }

    /// Reports a percentage. Values below the last reported one are ignored.
    pub fn report(&mut self, percent: f32) {
        if self.finished || !percent.is_finite() {
            return;
        }
        let percent = percent.clamp(0.0, 100.0);
        if percent <= self.last {
            return;
        }
        self.last = percent;
        self.send(percent);
    }

    /// Reports a fraction in `0.0..=1.0`.
    pub fn report_fraction(&mut self, fraction: f64) {
        self.report((fraction * 100.0) as f32);
    }

    /// Emits the final 100% event. Subsequent reports are ignored.
    pub fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        self.last = 100.0;
        self.send(100.0);
    }

    /// Last reported percentage.
    pub fn current(&self) -> f32 {
        self.last
    }

    fn send(&self, percent: f32) {
        if let Some(ref tx) = self.tx {
            let _ = tx.send(ProgressEvent {
                operation: self.operation,
                percent,
            });
        }
    }
}
