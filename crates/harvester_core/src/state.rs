use crate::effect::StopReason;

/// Number of pagination steps processed and persisted.
pub type Cursor = u64;

/// Termination bounds of a harvest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Highest step number that may be executed.
    pub max_steps: u64,
    /// Consecutive non-progressing steps that end the harvest.
    pub stall_threshold: u32,
    /// Consecutive steps without a readable snapshot that abort the harvest.
    pub unavailable_limit: u32,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_steps: 1000,
            stall_threshold: 5,
            unavailable_limit: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Init,
    ExtractInitial,
    /// Resumed harvest re-measuring the visible item count.
    Baseline,
    Advancing {
        step: u64,
    },
    Terminated(StopReason),
}

/// Loop-level state owned by the harvest loop.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HarvestState {
    limits: Limits,
    phase: Phase,
    cursor: Cursor,
    stall_count: u32,
    last_visible: usize,
    consecutive_unavailable: u32,
    steps_run: u64,
}

impl HarvestState {
    pub fn new(limits: Limits) -> Self {
        Self {
            limits,
            ..Self::default()
        }
    }

    pub fn limits(&self) -> Limits {
        self.limits
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    pub fn stall_count(&self) -> u32 {
        self.stall_count
    }

    pub fn last_visible(&self) -> usize {
        self.last_visible
    }

    pub fn consecutive_unavailable(&self) -> u32 {
        self.consecutive_unavailable
    }

    /// Steps executed during this run (the resume baseline is not a step).
    pub fn steps_run(&self) -> u64 {
        self.steps_run
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        match self.phase {
            Phase::Terminated(reason) => Some(reason),
            _ => None,
        }
    }

    pub(crate) fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
    }

    pub(crate) fn set_cursor(&mut self, cursor: Cursor) {
        self.cursor = cursor;
    }

    pub(crate) fn set_last_visible(&mut self, visible: usize) {
        self.last_visible = visible;
    }

    pub(crate) fn count_step(&mut self) {
        self.steps_run += 1;
    }

    pub(crate) fn source_recovered(&mut self) {
        self.consecutive_unavailable = 0;
    }

    /// Returns the updated count of consecutive unavailable steps.
    pub(crate) fn source_unavailable(&mut self) -> u32 {
        self.consecutive_unavailable += 1;
        self.consecutive_unavailable
    }

    pub(crate) fn record_progress(&mut self, progressed: bool) {
        if progressed {
            self.stall_count = 0;
        } else {
            self.stall_count += 1;
        }
    }

    pub(crate) fn is_stalled(&self) -> bool {
        self.stall_count >= self.limits.stall_threshold
    }
}
