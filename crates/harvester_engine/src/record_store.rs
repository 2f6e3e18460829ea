use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use engine_logging::{engine_info, engine_warn};
use harvester_core::{Field, Record, ResourcePattern, HEADER, UNKNOWN};
use thiserror::Error;

use crate::csv;
use crate::persist::{ensure_parent_dir, PersistError};

#[derive(Debug, Error)]
pub enum StoreError {
    /// The existing resource could not be read back.
    #[error("record file {path} is unreadable: {reason}")]
    Unreadable { path: PathBuf, reason: String },
    #[error("could not prepare record file: {0}")]
    Prepare(#[from] PersistError),
    #[error("record file io error: {0}")]
    Io(#[from] io::Error),
    #[error("record store already closed")]
    Closed,
}

/// Append-only, deduplicating store for harvested records.
pub trait RecordStore: Send {
    /// Reads every identity already persisted. A missing resource yields an
    /// empty set. The loaded identities also seed the store's own dedup set.
    fn load_seen_identities(&mut self) -> Result<HashSet<String>, StoreError>;

    /// Persists `record` unless its identity was already seen. Returns whether
    /// the record was written.
    fn append(&mut self, record: &Record) -> Result<bool, StoreError>;

    fn has(&self, identity: &str) -> bool;

    /// Records appended since the store was opened.
    fn appended(&self) -> usize;

    fn flush(&mut self) -> Result<(), StoreError>;

    /// Flushes and releases the resource. Safe to call more than once.
    fn close(&mut self) -> Result<(), StoreError>;
}

/// CSV file store with a `Title,Company,Location,Link,Post Time` header.
pub struct CsvRecordStore {
    path: PathBuf,
    pattern: ResourcePattern,
    file: Option<File>,
    seen: HashSet<String>,
    appended: usize,
}

impl CsvRecordStore {
    /// Opens `path` for appending, creating it (and its directory) if needed.
    /// The header row is written only when the file is empty.
    pub fn open(path: impl Into<PathBuf>, pattern: ResourcePattern) -> Result<Self, StoreError> {
        let path = path.into();
        ensure_parent_dir(&path)?;
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        if file.metadata()?.len() == 0 {
            csv::write_row(&mut file, &HEADER)?;
            file.flush()?;
            engine_info!("Created record file {}", path.display());
        }
        Ok(Self {
            path,
            pattern,
            file: Some(file),
            seen: HashSet::new(),
            appended: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_identities(&self) -> Result<HashSet<String>, StoreError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(HashSet::new()),
            Err(err) => return Err(self.unreadable(err.to_string())),
        };
        let text = String::from_utf8(bytes).map_err(|err| self.unreadable(err.to_string()))?;
        let text = text.strip_prefix('\u{feff}').unwrap_or(&text);

        let mut rows = csv::parse_rows(text).into_iter();
        let Some(header) = rows.next() else {
            return Ok(HashSet::new());
        };
        let link_column = Field::Link.column();
        let Some(link_index) = header.iter().position(|cell| cell.trim() == link_column) else {
            engine_warn!(
                "Record file {} has no {} column; starting with no known records",
                self.path.display(),
                link_column
            );
            return Ok(HashSet::new());
        };

        Ok(rows
            .filter_map(|row| row.get(link_index).map(|cell| cell.trim().to_string()))
            .filter(|link| !link.is_empty() && link != UNKNOWN)
            .map(|link| self.pattern.normalize(&link))
            .collect())
    }

    fn unreadable(&self, reason: String) -> StoreError {
        StoreError::Unreadable {
            path: self.path.clone(),
            reason,
        }
    }
}

impl RecordStore for CsvRecordStore {
    fn load_seen_identities(&mut self) -> Result<HashSet<String>, StoreError> {
        let identities = self.read_identities()?;
        self.seen.extend(identities.iter().cloned());
        engine_info!(
            "Loaded {} known records from {}",
            identities.len(),
            self.path.display()
        );
        Ok(identities)
    }

    fn append(&mut self, record: &Record) -> Result<bool, StoreError> {
        if let Some(identity) = record.identity() {
            if self.seen.contains(identity) {
                return Ok(false);
            }
        }
        let file = self.file.as_mut().ok_or(StoreError::Closed)?;
        csv::write_row(file, &record.to_row())?;
        if let Some(identity) = record.identity() {
            self.seen.insert(identity.to_string());
        }
        self.appended += 1;
        Ok(true)
    }

    fn has(&self, identity: &str) -> bool {
        self.seen.contains(identity)
    }

    fn appended(&self) -> usize {
        self.appended
    }

    fn flush(&mut self) -> Result<(), StoreError> {
        let file = self.file.as_mut().ok_or(StoreError::Closed)?;
        file.flush()?;
        file.sync_data()?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), StoreError> {
        let Some(mut file) = self.file.take() else {
            return Ok(());
        };
        file.flush()?;
        file.sync_all()?;
        Ok(())
    }
}
