//! Harvester core: record model, identity normalization and the pure
//! harvest state machine.
mod effect;
mod identity;
mod msg;
mod record;
mod state;
mod update;

pub use effect::{Effect, StopReason};
pub use identity::{normalize_link, ResourcePattern};
pub use msg::{Msg, StepOutcome};
pub use record::{Field, Record, RecordBuilder, HEADER, UNKNOWN};
pub use state::{Cursor, HarvestState, Limits, Phase};
pub use update::update;
