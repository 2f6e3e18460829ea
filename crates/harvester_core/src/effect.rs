use std::fmt;

use crate::Cursor;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    ExtractInitial,
    MeasureBaseline,
    Advance { step: u64 },
    Checkpoint { cursor: Cursor },
    Terminate { reason: StopReason },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Too many consecutive steps without progress.
    Stalled,
    MaxSteps,
    /// The snapshot could not be read for too many consecutive steps.
    SourceUnavailable,
    SourceFault,
}

impl StopReason {
    /// Aborts end the run early; the other reasons are normal completions.
    pub fn is_abort(self) -> bool {
        matches!(self, StopReason::SourceUnavailable | StopReason::SourceFault)
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Stalled => write!(f, "stalled"),
            StopReason::MaxSteps => write!(f, "max steps reached"),
            StopReason::SourceUnavailable => write!(f, "source unavailable"),
            StopReason::SourceFault => write!(f, "source fault"),
        }
    }
}
