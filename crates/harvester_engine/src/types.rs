use std::fmt;

use harvester_core::{Cursor, StopReason};

use crate::record_store::StoreError;

/// Point-in-time rendering of the feed. Never mutated once taken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    content: String,
}

impl Snapshot {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Content-length proxy for how much the feed currently shows.
    pub fn size(&self) -> usize {
        self.content.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AdvanceResult {
    /// Whether the rendered content changed size across the advance attempts.
    pub grew: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    /// The surface cannot be read right now; worth retrying.
    #[error("source unavailable: {0}")]
    Unavailable(String),
    /// The surface can no longer operate at all.
    #[error("fatal source fault: {0}")]
    Fatal(String),
}

impl SourceError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Fatal(message.into())
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }
}

/// Recoverable per-step problems. They are logged and the step counts as
/// non-progressing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepFault {
    SourceUnavailable,
    ContainerNotFound,
    AdvanceUnavailable,
}

impl fmt::Display for StepFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepFault::SourceUnavailable => write!(f, "SourceUnavailable"),
            StepFault::ContainerNotFound => write!(f, "ContainerNotFound"),
            StepFault::AdvanceUnavailable => write!(f, "AdvanceUnavailable"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestReport {
    /// Records persisted during this run.
    pub new_records: usize,
    pub final_cursor: Cursor,
    pub steps_run: u64,
    pub reason: StopReason,
    /// False when the record store could not be closed cleanly.
    pub cleanup_completed: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum HarvestError {
    #[error("could not open the feed: {0}")]
    Navigation(SourceError),
    #[error("record store failed: {0}")]
    Store(#[from] StoreError),
}
