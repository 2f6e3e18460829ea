use std::fs;
use std::io;
use std::path::Path;

use engine_logging::{engine_debug, engine_info};

use crate::{AdvanceResult, PageSource, Snapshot, SourceError};

/// Replays recorded renderings of a feed, one frame per advance.
///
/// Useful for offline runs against saved pages; the last frame sticks once
/// the recording is exhausted, which the harvest sees as a stalled feed.
#[derive(Debug, Clone)]
pub struct ReplaySource {
    frames: Vec<String>,
    position: Option<usize>,
    closed: bool,
}

impl ReplaySource {
    pub fn new(frames: Vec<String>) -> Self {
        Self {
            frames,
            position: None,
            closed: false,
        }
    }

    /// Loads every `*.html` file in `dir`, ordered by file name.
    pub fn from_dir(dir: &Path) -> io::Result<Self> {
        let mut paths: Vec<_> = fs::read_dir(dir)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<io::Result<_>>()?;
        paths.retain(|path| {
            path.is_file()
                && path
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("html"))
        });
        paths.sort();
        let frames = paths
            .iter()
            .map(fs::read_to_string)
            .collect::<io::Result<Vec<_>>>()?;
        engine_info!("Loaded {} replay frames from {}", frames.len(), dir.display());
        Ok(Self::new(frames))
    }

    fn current(&self) -> Result<&str, SourceError> {
        if self.closed {
            return Err(SourceError::fatal("replay source is closed"));
        }
        let index = self
            .position
            .ok_or_else(|| SourceError::unavailable("feed not opened yet"))?;
        self.frames
            .get(index)
            .map(String::as_str)
            .ok_or_else(|| SourceError::unavailable("no frames recorded"))
    }
}

#[async_trait::async_trait]
impl PageSource for ReplaySource {
    async fn navigate(&mut self, target: &str) -> Result<(), SourceError> {
        if self.closed {
            return Err(SourceError::fatal("replay source is closed"));
        }
        if self.frames.is_empty() {
            return Err(SourceError::fatal("no frames recorded"));
        }
        engine_debug!("Replaying {} frames in place of {}", self.frames.len(), target);
        self.position = Some(0);
        Ok(())
    }

    async fn current_snapshot(&mut self) -> Result<Snapshot, SourceError> {
        self.current().map(Snapshot::new)
    }

    async fn advance(&mut self) -> Result<AdvanceResult, SourceError> {
        let before = self.current()?.len();
        if let Some(index) = self.position {
            self.position = Some((index + 1).min(self.frames.len() - 1));
        }
        let after = self.current()?.len();
        Ok(AdvanceResult {
            grew: after != before,
        })
    }

    async fn try_reveal_more(&mut self) -> Result<bool, SourceError> {
        self.current()?;
        Ok(false)
    }

    async fn close(&mut self) {
        self.closed = true;
    }
}
