//! Run context shared by analyzers and histogram groups.
//!
//! A [`RunContext`] is created once per run and handed (as an `Arc<RunContext>`) to every
//! component that can report problems. The status only ever rises:
//! [`TaskStatus::Ok`] < [`TaskStatus::Warning`] < [`TaskStatus::Error`] < [`TaskStatus::Fatal`].
//! An external event loop polls [`RunContext::is_fatal`] to decide whether to stop.

use std::{
    fmt::Display,
    sync::atomic::{AtomicU8, Ordering},
};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Severity of the worst problem reported so far in a run.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    /// Nothing went wrong.
    Ok,
    /// A recoverable oddity was reported.
    Warning,
    /// An error was reported, the run may continue.
    Error,
    /// The run must stop.
    Fatal,
}

impl TaskStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => TaskStatus::Ok,
            1 => TaskStatus::Warning,
            2 => TaskStatus::Error,
            _ => TaskStatus::Fatal,
        }
    }
}

impl Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Ok => write!(f, "Ok"),
            TaskStatus::Warning => write!(f, "Warning"),
            TaskStatus::Error => write!(f, "Error"),
            TaskStatus::Fatal => write!(f, "Fatal"),
        }
    }
}

/// Status holder for one run.
#[derive(Debug, Default)]
pub struct RunContext {
    status: AtomicU8,
    fatal_reasons: Mutex<Vec<String>>,
}

impl RunContext {
    /// Create a context in the [`TaskStatus::Ok`] state.
    pub fn new() -> Self {
        Self::default()
    }

    /// The current status.
    pub fn status(&self) -> TaskStatus {
        TaskStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    /// Raise the status to `status`. Lower values are ignored.
    pub fn escalate(&self, status: TaskStatus) {
        self.status.fetch_max(status as u8, Ordering::AcqRel);
    }

    /// Record a fatal failure.
    pub fn report_fatal<S: Into<String>>(&self, reason: S) {
        let reason = reason.into();
        log::error!("Fatal: {reason}");
        self.fatal_reasons.lock().push(reason);
        self.escalate(TaskStatus::Fatal);
    }

    /// Check whether a fatal failure has been reported.
    pub fn is_fatal(&self) -> bool {
        self.status() == TaskStatus::Fatal
    }

    /// Messages passed to [`RunContext::report_fatal`], oldest first.
    pub fn fatal_reasons(&self) -> Vec<String> {
        self.fatal_reasons.lock().clone()
    }

    /// Return to [`TaskStatus::Ok`] and forget recorded reasons.
    pub fn reset(&self) {
        self.status.store(TaskStatus::Ok as u8, Ordering::Release);
        self.fatal_reasons.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_status_only_rises() {
        let ctx = RunContext::new();
        assert_eq!(ctx.status(), TaskStatus::Ok);
        ctx.escalate(TaskStatus::Error);
        ctx.escalate(TaskStatus::Warning);
        assert_eq!(ctx.status(), TaskStatus::Error);
        assert!(!ctx.is_fatal());
    }

    #[test]
    fn test_fatal_and_reset() {
        let ctx = Arc::new(RunContext::new());
        let shared = ctx.clone();
        shared.report_fatal("missing store");
        assert!(ctx.is_fatal());
        assert_eq!(ctx.fatal_reasons(), vec!["missing store".to_string()]);
        ctx.reset();
        assert_eq!(ctx.status(), TaskStatus::Ok);
        assert!(ctx.fatal_reasons().is_empty());
    }
}
