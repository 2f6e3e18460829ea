use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use engine_logging::{engine_info, engine_warn};
use harvester_core::Cursor;
use thiserror::Error;

use crate::persist::{AtomicFileWriter, PersistError};

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("could not save progress: {0}")]
    Persist(#[from] PersistError),
}

/// Durable record of the last completed step.
pub trait CheckpointStore: Send {
    /// Last saved cursor, or 0 when none exists or it cannot be parsed.
    fn load(&self) -> Cursor;

    /// Durably replaces the saved cursor.
    fn save(&mut self, cursor: Cursor) -> Result<(), CheckpointError>;
}

/// Stores the cursor as decimal text in a single file.
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    writer: AtomicFileWriter,
}

impl FileCheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            writer: AtomicFileWriter::new(path),
        }
    }

    pub fn path(&self) -> &Path {
        self.writer.target()
    }
}

impl CheckpointStore for FileCheckpointStore {
    fn load(&self) -> Cursor {
        let text = match fs::read_to_string(self.path()) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return 0,
            Err(err) => {
                engine_warn!(
                    "Could not read progress file {}: {}; starting fresh",
                    self.path().display(),
                    err
                );
                return 0;
            }
        };
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return 0;
        }
        match trimmed.parse::<Cursor>() {
            Ok(cursor) => cursor,
            Err(err) => {
                engine_warn!(
                    "Ignoring unparsable progress file {} ({:?}): {}",
                    self.path().display(),
                    trimmed,
                    err
                );
                0
            }
        }
    }

    fn save(&mut self, cursor: Cursor) -> Result<(), CheckpointError> {
        self.writer.replace(&cursor.to_string())?;
        engine_info!("Progress saved at step {}", cursor);
        Ok(())
    }
}

/// In-memory store that remembers every save. Clones share the same state,
/// so a caller can keep a handle after boxing one into a harvest.
#[derive(Debug, Clone, Default)]
pub struct MemoryCheckpointStore {
    inner: Arc<Mutex<MemoryCheckpoint>>,
}

#[derive(Debug, Default)]
struct MemoryCheckpoint {
    cursor: Cursor,
    saves: Vec<Cursor>,
}

impl MemoryCheckpointStore {
    pub fn with_cursor(cursor: Cursor) -> Self {
        let store = Self::default();
        store.lock().cursor = cursor;
        store
    }

    /// Every cursor saved so far, oldest first.
    pub fn saves(&self) -> Vec<Cursor> {
        self.lock().saves.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryCheckpoint> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    fn load(&self) -> Cursor {
        self.lock().cursor
    }

    fn save(&mut self, cursor: Cursor) -> Result<(), CheckpointError> {
        let mut inner = self.lock();
        inner.cursor = cursor;
        inner.saves.push(cursor);
        Ok(())
    }
}
