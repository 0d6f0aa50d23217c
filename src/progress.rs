//! Progress reporting for pipeline stages
//!
//! When enabled, each stage writes JSON lines to stderr: one `start`
//! message, rate-limited `p` messages while iterating, and one `done`
//! message. Reporting never changes iteration order.

use serde::Serialize;
use std::cell::Cell;
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Default minimum interval between progress messages
pub const DEFAULT_PROGRESS_INTERVAL_MS: u64 = 500;

/// Pipeline stage indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Walking root directories
    #[default]
    Scan,
    /// Guessing base data from file names
    BaseData,
    /// Querying the metadata service
    Enrich,
}

/// Sent when a stage begins
#[derive(Debug, Clone, Serialize)]
pub struct StartMessage {
    #[serde(rename = "_t")]
    pub msg_type: &'static str,
    pub seq: u64,
    /// Milliseconds since reporter creation
    pub ts: u64,
    pub stage: Stage,
    /// Number of items the stage will process, when known up front
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
}

/// Sent periodically while a stage runs
#[derive(Debug, Clone, Serialize)]
pub struct ProgressMessage {
    #[serde(rename = "_t")]
    pub msg_type: &'static str,
    pub seq: u64,
    pub ts: u64,
    pub stage: Stage,
    /// Items processed so far
    #[serde(rename = "n")]
    pub processed: u64,
    /// Items accepted so far
    #[serde(rename = "ok")]
    pub accepted: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    /// Item currently being processed
    pub cur: String,
}

/// Sent when a stage finishes
#[derive(Debug, Clone, Serialize)]
pub struct DoneMessage {
    #[serde(rename = "_t")]
    pub msg_type: &'static str,
    pub seq: u64,
    pub ts: u64,
    pub stage: Stage,
    #[serde(rename = "n")]
    pub processed: u64,
    #[serde(rename = "ok")]
    pub accepted: u64,
    /// Error count
    #[serde(rename = "ec")]
    pub errors: usize,
    pub ms: u64,
}

/// Counters a stage hands to the reporter
#[derive(Debug, Clone, Default)]
pub struct StageProgress {
    pub processed: u64,
    pub accepted: u64,
    pub total: Option<u64>,
    pub current: String,
}

/// Writes stage progress to stderr
///
/// Tracks sequence numbers and rate-limits intermediate messages.
pub struct ProgressReporter {
    enabled: bool,
    interval_ms: u64,
    last_report: Cell<Instant>,
    seq: AtomicU64,
    start_time: Instant,
}

impl ProgressReporter {
    /// Create a new ProgressReporter
    ///
    /// # Arguments
    /// * `enabled` - Whether progress reporting is enabled
    /// * `interval_ms` - Minimum interval between progress messages in milliseconds
    pub fn new(enabled: bool, interval_ms: u64) -> Self {
        let now = Instant::now();
        Self {
            enabled,
            interval_ms,
            last_report: Cell::new(now),
            seq: AtomicU64::new(0),
            start_time: now,
        }
    }

    /// A reporter that never writes
    pub fn disabled() -> Self {
        Self::new(false, DEFAULT_PROGRESS_INTERVAL_MS)
    }

    /// Check if enough time has passed since the last report
    pub fn should_report(&self) -> bool {
        if !self.enabled {
            return false;
        }
        let elapsed = self.last_report.get().elapsed().as_millis() as u64;
        elapsed >= self.interval_ms
    }

    /// Get the next sequence number (monotonically increasing)
    pub fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::SeqCst)
    }

    /// Milliseconds since reporter creation
    pub fn current_timestamp(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }

    fn output_to_stderr<T: Serialize>(&self, msg: &T) {
        if let Ok(json) = serde_json::to_string(msg) {
            eprintln!("{}", json);
            std::io::stderr().flush().ok();
        }
    }

    /// Report stage start
    pub fn report_start(&self, stage: Stage, total: Option<u64>) {
        if !self.enabled {
            return;
        }

        let msg = StartMessage {
            msg_type: "start",
            seq: self.next_seq(),
            ts: self.current_timestamp(),
            stage,
            total,
        };
        self.output_to_stderr(&msg);
    }

    /// Report progress. Returns true if a message was actually sent.
    pub fn report_progress(&self, stage: Stage, progress: &StageProgress) -> bool {
        if !self.should_report() {
            return false;
        }

        let msg = ProgressMessage {
            msg_type: "p",
            seq: self.next_seq(),
            ts: self.current_timestamp(),
            stage,
            processed: progress.processed,
            accepted: progress.accepted,
            total: progress.total,
            cur: progress.current.clone(),
        };
        self.output_to_stderr(&msg);
        self.last_report.set(Instant::now());
        true
    }

    /// Report stage completion
    pub fn report_done(&self, stage: Stage, progress: &StageProgress, errors: usize, ms: u64) {
        if !self.enabled {
            return;
        }

        let msg = DoneMessage {
            msg_type: "done",
            seq: self.next_seq(),
            ts: self.current_timestamp(),
            stage,
            processed: progress.processed,
            accepted: progress.accepted,
            errors,
            ms,
        };
        self.output_to_stderr(&msg);
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::disabled()
    }
}
