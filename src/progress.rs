use std::io::{self, Write};
use std::sync::Mutex;
use std::time::Instant;

use serde::Serialize;

pub const PARTIAL_SUCCESS_TEXT: &str = "Document converted with some formatting limitations";
pub const SUCCESS_TEXT: &str = "Document imported successfully";
pub const LOADING_TEXT: &str = "Converting document...";

/// The outcomes the surrounding UI renders.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum ImportStatus {
    Loading,
    Success,
    PartialSuccess,
    Failure(String),
}

impl ImportStatus {
    pub fn message(&self) -> &str {
        match self {
            ImportStatus::Loading => LOADING_TEXT,
            ImportStatus::Success => SUCCESS_TEXT,
            ImportStatus::PartialSuccess => PARTIAL_SUCCESS_TEXT,
            ImportStatus::Failure(reason) => reason,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ImportStatus::Loading)
    }
}

pub trait FeedbackSink: Send + Sync {
    fn status(&self, status: &ImportStatus);
}

pub struct ConsoleProgress {
    enabled: bool,
    t0: Instant,
}

impl ConsoleProgress {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            t0: Instant::now(),
        }
    }

    pub fn info(&self, msg: impl AsRef<str>) {
        if !self.enabled {
            return;
        }
        let ts = fmt_elapsed(self.t0.elapsed().as_secs_f64());
        let mut stderr = io::stderr().lock();
        let _ = writeln!(stderr, "[{ts}] {}", msg.as_ref());
    }
}

impl FeedbackSink for ConsoleProgress {
    fn status(&self, status: &ImportStatus) {
        match status {
            ImportStatus::Failure(reason) => self.info(format!("error: {reason}")),
            other => self.info(other.message()),
        }
    }
}

/// Keeps every status in order. Used by embedders that poll, and by tests.
#[derive(Debug, Default)]
pub struct RecordingFeedback {
    seen: Mutex<Vec<ImportStatus>>,
}

impl RecordingFeedback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn statuses(&self) -> Vec<ImportStatus> {
        self.seen.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn last(&self) -> Option<ImportStatus> {
        self.statuses().pop()
    }
}

impl FeedbackSink for RecordingFeedback {
    fn status(&self, status: &ImportStatus) {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(status.clone());
        }
    }
}

fn fmt_elapsed(seconds: f64) -> String {
    let seconds = seconds.max(0.0) as u64;
    let h = seconds / 3600;
    let m = (seconds % 3600) / 60;
    let s = seconds % 60;
    if h > 0 {
        format!("{h:02}:{m:02}:{s:02}")
    } else {
        format!("{m:02}:{s:02}")
    }
}
