use crate::{AdvanceResult, SourceError, Snapshot};

/// A single stateful rendering surface for the feed.
///
/// Implementations are driven from one step at a time; nothing calls into a
/// source concurrently.
#[async_trait::async_trait]
pub trait PageSource: Send {
    /// Establishes the feed at `target`, dismissing blocking overlays if the
    /// surface has any.
    async fn navigate(&mut self, target: &str) -> Result<(), SourceError>;

    async fn current_snapshot(&mut self) -> Result<Snapshot, SourceError>;

    /// Attempts to extend the rendered content, in a bounded number of
    /// sub-attempts.
    async fn advance(&mut self) -> Result<AdvanceResult, SourceError>;

    /// Actions an explicit "load more" affordance if one is present.
    /// Returns whether the action was taken.
    async fn try_reveal_more(&mut self) -> Result<bool, SourceError>;

    /// Releases every underlying resource. Safe to call more than once.
    async fn close(&mut self);
}
