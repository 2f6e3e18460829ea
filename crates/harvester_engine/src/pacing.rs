use std::time::Duration;

use rand::Rng;

/// A pause whose length is sampled uniformly between two bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JitterRange {
    min: Duration,
    max: Duration,
}

impl JitterRange {
    pub const ZERO: JitterRange = JitterRange {
        min: Duration::ZERO,
        max: Duration::ZERO,
    };

    /// Bounds given in either order are accepted.
    pub fn new(a: Duration, b: Duration) -> Self {
        if a <= b {
            Self { min: a, max: b }
        } else {
            Self { min: b, max: a }
        }
    }

    pub fn from_millis(a: u64, b: u64) -> Self {
        Self::new(Duration::from_millis(a), Duration::from_millis(b))
    }

    pub fn from_secs(a: u64, b: u64) -> Self {
        Self::new(Duration::from_secs(a), Duration::from_secs(b))
    }

    pub fn min(&self) -> Duration {
        self.min
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    pub fn sample(&self) -> Duration {
        if self.min == self.max {
            return self.min;
        }
        let lo = millis(self.min);
        let hi = millis(self.max);
        Duration::from_millis(rand::rng().random_range(lo..=hi))
    }

    pub async fn pause(&self) {
        let delay = self.sample();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Every pause and bounded retry count used while harvesting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    /// Settle time after the feed is first opened.
    pub after_navigate: JitterRange,
    /// Settle time after an advance command.
    pub after_advance: JitterRange,
    /// Settle time after the "load more" affordance was actioned.
    pub after_reveal: JitterRange,
    pub between_steps: JitterRange,
    /// Pause between advance sub-attempts inside a page source.
    pub scroll_pause: JitterRange,
    /// Pause before retrying a failed navigation or snapshot.
    pub retry_pause: JitterRange,
    pub advance_attempts: u32,
    pub snapshot_attempts: u32,
    pub navigate_attempts: u32,
}

impl Pacing {
    /// No pauses at all; used by tests and fixture replays.
    pub fn immediate() -> Self {
        Self {
            after_navigate: JitterRange::ZERO,
            after_advance: JitterRange::ZERO,
            after_reveal: JitterRange::ZERO,
            between_steps: JitterRange::ZERO,
            scroll_pause: JitterRange::ZERO,
            retry_pause: JitterRange::ZERO,
            ..Self::default()
        }
    }
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            after_navigate: JitterRange::from_secs(5, 10),
            after_advance: JitterRange::from_secs(3, 7),
            after_reveal: JitterRange::from_secs(3, 6),
            between_steps: JitterRange::from_secs(1, 3),
            scroll_pause: JitterRange::from_secs(2, 4),
            retry_pause: JitterRange::from_secs(1, 2),
            advance_attempts: 3,
            snapshot_attempts: 3,
            navigate_attempts: 3,
        }
    }
}
