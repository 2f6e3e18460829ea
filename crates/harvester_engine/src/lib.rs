//! Harvester engine: page sources, stores, extraction and effect execution.
mod checkpoint;
mod csv;
mod dates;
mod decode;
mod extract;
mod harvest;
mod http_source;
mod pacing;
mod page_source;
mod persist;
mod record_store;
mod replay;
mod types;

pub use checkpoint::{CheckpointError, CheckpointStore, FileCheckpointStore, MemoryCheckpointStore};
pub use dates::{format_date, parse_fuzzy_date};
pub use decode::{decode_body, DecodedBody};
pub use extract::{
    Extraction, Extractor, FieldLocator, FieldSource, ListingExtractor, ListingSchema,
    SchemaError, SelectorConfig,
};
pub use harvest::{HarvestLoop, HarvestSettings};
pub use http_source::{HttpPageSource, HttpSourceSettings};
pub use pacing::{JitterRange, Pacing};
pub use page_source::PageSource;
pub use persist::{ensure_parent_dir, AtomicFileWriter, PersistError};
pub use record_store::{CsvRecordStore, RecordStore, StoreError};
pub use replay::ReplaySource;
pub use types::{
    AdvanceResult, HarvestError, HarvestReport, Snapshot, SourceError, StepFault,
};
