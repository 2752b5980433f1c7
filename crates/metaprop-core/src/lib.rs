//! metaprop: record-to-property translation.
//!
//! Heterogeneous metadata records (CSV rows or JSON objects) are decoded into
//! validated [`MetaProp`]s, their value kind and display grouping are
//! resolved, and each one is written into a target slot with the coercion its
//! storage kind requires.

mod applier;
mod batch;
mod category;
mod error;
pub mod fields;
mod meta_prop;
mod meta_type;
mod record;
mod target;

pub use applier::{SlotValue, StorageKind, apply, coerce};
pub use batch::{
    Batch, BatchOptions, BatchReport, BatchStats, FileLinkPolicy, Outcome, RecordIdentity,
    RecordReport, SkipReason,
};
pub use category::{CategoryLookup, CategoryRegistry, GroupingId};
pub use error::MetaPropError;
pub use fields::{Fields, FieldsExt};
pub use meta_prop::{DELETE_SENTINEL, MODEL_SCOPE_PREFIX, MetaProp, ResolvedProp};
pub use meta_type::{MetaType, ValueKind, resolve_value_kind};
pub use record::{
    InputFormat, SourceRecord, decode, decode_csv, decode_json, decode_json_lines, decode_object,
    decode_row, decode_value,
};
pub use target::{MemoryStore, ResolvedSlot, SlotEntry, Target};
