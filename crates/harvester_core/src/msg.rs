use crate::Cursor;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// Seen-set and checkpoint are loaded; `cursor` is the saved progress.
    Started { cursor: Cursor },
    /// First snapshot of a fresh harvest was extracted and persisted.
    InitialExtracted { visible: usize, new_records: usize },
    /// Resume pass re-measured the currently visible item count.
    BaselineMeasured { visible: usize, new_records: usize },
    /// A pagination step finished extraction.
    StepCompleted(StepOutcome),
    /// No snapshot could be read for `step`, even after retries.
    StepUnavailable { step: u64 },
    /// The page source can no longer operate.
    SourceFault,
}

/// What a pagination step observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepOutcome {
    pub step: u64,
    /// Candidate records extracted from the snapshot, duplicates included.
    pub visible: usize,
    /// Records actually persisted this step.
    pub new_records: usize,
    /// Whether the "load more" affordance was actioned.
    pub revealed: bool,
}
