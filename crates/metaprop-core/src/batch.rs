//! Batch pipeline: decode, validate, resolve, format and apply, one record at a time.
//!
//! Failures never cross the batch boundary. Each record ends up in the
//! [`BatchReport`] as applied, skipped (no write-eligible slot) or failed,
//! tagged with the record's identity.

use crate::applier::{self, SlotValue};
use crate::category::CategoryLookup;
use crate::error::MetaPropError;
use crate::fields::{self, FieldsExt, POSITIONAL};
use crate::meta_prop::{MetaProp, ResolvedProp};
use crate::record::SourceRecord;
use crate::target::Target;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::ops::ControlFlow;
use std::time::{Duration, Instant};

const LOG_TARGET: &str = "metaprop::batch";

/// What to do with `File` and `Link` properties.
///
/// Many targets can't take them as plain text, so they are rejected unless
/// the caller opts in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileLinkPolicy {
    #[default]
    Reject,
    Write,
}

/// Options for a batch run.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchOptions {
    pub file_links: FileLinkPolicy,
}

/// Who a report entry is about.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordIdentity {
    pub external_id: String,
    pub component: String,
    pub display_name: String,
}

impl RecordIdentity {
    fn of(prop: &MetaProp) -> Self {
        Self {
            external_id: prop.external_id.clone(),
            component: prop.component.clone(),
            display_name: prop.display_name.clone(),
        }
    }

    /// Best-effort identity for a record that never became a MetaProp.
    fn of_record(record: &SourceRecord) -> Self {
        match &record.decoded {
            Ok(decoded) => Self {
                external_id: decoded.text(fields::EXTERNAL_ID).to_string(),
                component: decoded.text(fields::COMPONENT).to_string(),
                display_name: decoded.text(fields::DISPLAY_NAME).to_string(),
            },
            Err(MetaPropError::MalformedRecord { content, .. }) => {
                let at = |name: &str| {
                    POSITIONAL
                        .iter()
                        .position(|n| *n == name)
                        .and_then(|i| content.get(i))
                        .cloned()
                        .unwrap_or_default()
                };
                Self {
                    external_id: at(fields::EXTERNAL_ID),
                    component: at(fields::COMPONENT),
                    display_name: at(fields::DISPLAY_NAME),
                }
            }
            Err(_) => Self::default(),
        }
    }
}

/// Why a record was not written although it was valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    /// The target has no matching slot.
    NoSlot,
    /// The matching slot is not write-eligible.
    ReadOnly,
}

/// Final state of one record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum Outcome {
    Applied {
        value: SlotValue,
    },
    Skipped {
        reason: SkipReason,
    },
    Failed {
        #[serde(serialize_with = "serialize_error")]
        error: MetaPropError,
    },
}

/// Report entry for one input record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordReport {
    /// 1-based position in the input.
    pub index: usize,
    #[serde(flatten)]
    pub identity: RecordIdentity,
    /// Model-level (document scope) property.
    pub model_level: bool,
    /// A write-eligible slot was found.
    pub can_set: bool,
    pub outcome: Outcome,
}

impl RecordReport {
    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, Outcome::Failed { .. })
    }

    pub fn error(&self) -> Option<&MetaPropError> {
        match &self.outcome {
            Outcome::Failed { error } => Some(error),
            _ => None,
        }
    }
}

/// Counters for a batch run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchStats {
    /// Wall-clock time of the run.
    #[serde(skip)]
    pub duration: Duration,
    pub total: usize,
    pub applied: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Result of a batch run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    pub records: Vec<RecordReport>,
    pub stats: BatchStats,
    /// The observer stopped the run before all records were processed.
    pub cancelled: bool,
}

impl BatchReport {
    /// True when no record failed. Skipped records don't count as failures.
    pub fn is_clean(&self) -> bool {
        self.stats.failed == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &RecordReport> {
        self.records.iter().filter(|r| r.is_failure())
    }

    fn push(&mut self, report: RecordReport) {
        self.stats.total += 1;
        match report.outcome {
            Outcome::Applied { .. } => self.stats.applied += 1,
            Outcome::Skipped { .. } => self.stats.skipped += 1,
            Outcome::Failed { .. } => self.stats.failed += 1,
        }
        self.records.push(report);
    }
}

/// Runs records through the pipeline against a target.
pub struct Batch<'a, C> {
    categories: &'a C,
    options: BatchOptions,
}

impl<'a, C: CategoryLookup> Batch<'a, C> {
    /// Create a batch that resolves groupings through `categories`.
    pub fn new(categories: &'a C) -> Self {
        Self {
            categories,
            options: BatchOptions::default(),
        }
    }

    /// Set batch options.
    pub fn options(mut self, options: BatchOptions) -> Self {
        self.options = options;
        self
    }

    /// Set the File/Link policy.
    pub fn file_links(mut self, policy: FileLinkPolicy) -> Self {
        self.options.file_links = policy;
        self
    }

    /// Validate and resolve a record without touching any target.
    ///
    /// Applies the File/Link policy too, so a record that prepares cleanly is
    /// one the batch would go on to resolve a slot for.
    pub fn prepare(&self, record: &SourceRecord) -> Result<ResolvedProp, MetaPropError> {
        let decoded = record.decoded.as_ref().map_err(Clone::clone)?;
        let resolved = MetaProp::from_fields(decoded)?.resolve(self.categories)?;

        if resolved.prop.is_file_or_link_property()
            && self.options.file_links == FileLinkPolicy::Reject
        {
            return Err(MetaPropError::UnsupportedForDirectWrite(
                resolved.prop.meta_type,
            ));
        }
        Ok(resolved)
    }

    /// Run every record.
    pub fn run<T: Target>(
        &self,
        records: impl IntoIterator<Item = SourceRecord>,
        target: &mut T,
    ) -> BatchReport {
        self.run_with(records, target, |_| ControlFlow::Continue(()))
    }

    /// Run records, calling `observe` after each one.
    ///
    /// Returning `ControlFlow::Break` stops the batch before the next record.
    /// Records already written stay written.
    pub fn run_with<T, F>(
        &self,
        records: impl IntoIterator<Item = SourceRecord>,
        target: &mut T,
        mut observe: F,
    ) -> BatchReport
    where
        T: Target,
        F: FnMut(&RecordReport) -> ControlFlow<()>,
    {
        let start = Instant::now();
        let mut report = BatchReport::default();

        for record in records {
            let entry = self.process(record, target);
            let flow = observe(&entry);
            report.push(entry);

            if flow.is_break() {
                log::info!(target: LOG_TARGET, "Batch cancelled after {} records", report.stats.total);
                report.cancelled = true;
                break;
            }
        }

        report.stats.duration = start.elapsed();
        log::info!(
            target: LOG_TARGET,
            "Finished batch in {:.3}s: {} applied, {} skipped, {} failed",
            report.stats.duration.as_secs_f64(),
            report.stats.applied,
            report.stats.skipped,
            report.stats.failed
        );
        report
    }

    fn process<T: Target>(&self, record: SourceRecord, target: &mut T) -> RecordReport {
        let index = record.index;
        let mut resolved = match self.prepare(&record) {
            Ok(resolved) => resolved,
            Err(error) => {
                let identity = RecordIdentity::of_record(&record);
                log::debug!(target: LOG_TARGET, "Record {index} rejected: {error}");
                return RecordReport {
                    index,
                    model_level: identity.external_id.starts_with(crate::MODEL_SCOPE_PREFIX),
                    identity,
                    can_set: false,
                    outcome: Outcome::Failed { error },
                };
            }
        };

        let identity = RecordIdentity::of(&resolved.prop);
        let model_level = resolved.prop.is_model_property();
        let finish = |can_set: bool, outcome: Outcome| RecordReport {
            index,
            identity: identity.clone(),
            model_level,
            can_set,
            outcome,
        };

        let Some(slot) = target.resolve(&resolved) else {
            log::debug!(target: LOG_TARGET, "Record {index}: no slot for '{}'", resolved.prop.display_name);
            return finish(false, Outcome::Skipped { reason: SkipReason::NoSlot });
        };
        if slot.read_only {
            log::debug!(target: LOG_TARGET, "Record {index}: slot '{}' is read-only", resolved.prop.display_name);
            return finish(false, Outcome::Skipped { reason: SkipReason::ReadOnly });
        }
        resolved.prop.can_set = true;

        match applier::apply(&resolved.prop, slot.kind, |value| target.write(&slot.handle, value)) {
            Ok(value) => {
                log::debug!(target: LOG_TARGET, "Record {index}: wrote {value} to '{}'", resolved.prop.display_name);
                finish(true, Outcome::Applied { value })
            }
            Err(error) => {
                log::debug!(target: LOG_TARGET, "Record {index} not applied: {error}");
                finish(true, Outcome::Failed { error })
            }
        }
    }
}

fn serialize_error<S: Serializer>(error: &MetaPropError, serializer: S) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(None)?;
    map.serialize_entry("code", error.code())?;
    map.serialize_entry("message", &error.to_string())?;
    if let MetaPropError::MalformedRecord { content, .. } = error {
        map.serialize_entry("content", content)?;
    }
    map.end()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::applier::StorageKind;
    use crate::category::CategoryRegistry;
    use crate::record::{decode_csv, decode_row};
    use crate::target::{MemoryStore, SlotEntry};

    fn source(index: usize, row: &[&str]) -> SourceRecord {
        SourceRecord {
            index,
            decoded: decode_row(row),
        }
    }

    fn store() -> MemoryStore {
        MemoryStore::new()
            .slot(SlotEntry::new("e1", "c1", "Count", StorageKind::Integer))
            .slot(SlotEntry::new("e1", "c1", "Width", StorageKind::FloatingPoint))
            .slot(SlotEntry::new("e1", "c1", "Note", StorageKind::Text))
            .slot(SlotEntry::new("e1", "c1", "Locked", StorageKind::Text).read_only())
    }

    #[test]
    fn test_mixed_batch() {
        let categories = CategoryRegistry::default();
        let mut target = store();
        let records = vec![
            source(1, &["e1", "c1", "G", "-1", "Count", "42", "Int", ""]),
            source(2, &["e1", "c1", "G", "-1", "Width", "abc", "Double", ""]),
            source(3, &["e1", "c1", "G", "-1", "Note", "hi", "Text", ""]),
            source(4, &["e1", "c1", "G", "-1", "Missing", "hi", "Text", ""]),
            source(5, &["e1", "c1", "G", "-1", "Locked", "hi", "Text", ""]),
            source(6, &["e1", "c1", "G"]),
        ];

        let report = Batch::new(&categories).run(records, &mut target);

        assert_eq!(report.stats.total, 6);
        assert_eq!(report.stats.applied, 2);
        assert_eq!(report.stats.skipped, 2);
        assert_eq!(report.stats.failed, 2);
        assert!(!report.is_clean());
        assert!(!report.cancelled);

        assert_eq!(report.records[1].error().unwrap().code(), "InvalidDoubleValue");
        assert_eq!(report.records[3].outcome, Outcome::Skipped { reason: SkipReason::NoSlot });
        assert!(!report.records[3].can_set);
        assert_eq!(report.records[4].outcome, Outcome::Skipped { reason: SkipReason::ReadOnly });

        let malformed = &report.records[5];
        assert_eq!(malformed.identity.external_id, "e1");
        assert_eq!(malformed.error().unwrap().code(), "MalformedRecord");

        assert_eq!(
            target.get("e1", "c1", "Count").unwrap().value,
            Some(SlotValue::Integer(42))
        );
        assert_eq!(target.get("e1", "c1", "Width").unwrap().value, None);
    }

    #[test]
    fn test_unknown_category_is_reported() {
        let categories = CategoryRegistry::default();
        let mut target = store();
        let records = vec![source(1, &["e1", "c1", "G", "PG_NOPE", "Count", "1", "Int", ""])];

        let report = Batch::new(&categories).run(records, &mut target);
        let entry = &report.records[0];

        assert_eq!(entry.identity.display_name, "Count");
        assert_eq!(
            entry.error(),
            Some(&MetaPropError::UnknownCategoryId("PG_NOPE".into()))
        );
        assert_eq!(target.get("e1", "c1", "Count").unwrap().value, None);
    }

    #[test]
    fn test_file_link_policy() {
        let categories = CategoryRegistry::default();
        let row = ["e1", "c1", "G", "-1", "Note", "Spec", "Link", "", "", "http://x"];

        // Rejected by default, before any slot is touched.
        let mut target = store();
        let report = Batch::new(&categories).run(vec![source(1, &row)], &mut target);
        assert_eq!(
            report.records[0].error(),
            Some(&MetaPropError::UnsupportedForDirectWrite(crate::MetaType::Link))
        );
        assert_eq!(target.get("e1", "c1", "Note").unwrap().value, None);

        let mut target = store();
        let report = Batch::new(&categories)
            .file_links(FileLinkPolicy::Write)
            .run(vec![source(1, &row)], &mut target);
        assert!(report.is_clean());
        assert_eq!(
            target.get("e1", "c1", "Note").unwrap().value,
            Some(SlotValue::Text("link:Spec:http://x".into()))
        );
    }

    #[test]
    fn test_cancellation_between_records() {
        let categories = CategoryRegistry::default();
        let mut target = store();
        let records = decode_csv(
            b"e1,c1,G,-1,Count,1,Int,\n\
             e1,c1,G,-1,Note,x,Text,\n\
             e1,c1,G,-1,Width,2.5,Double,\n",
        );

        let mut seen = 0;
        let report = Batch::new(&categories).run_with(records, &mut target, |_| {
            seen += 1;
            if seen == 2 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });

        assert!(report.cancelled);
        assert_eq!(report.stats.total, 2);
        // Already-applied records stay applied.
        assert_eq!(target.get("e1", "c1", "Note").unwrap().value, Some(SlotValue::Text("x".into())));
        assert_eq!(target.get("e1", "c1", "Width").unwrap().value, None);
    }

    #[test]
    fn test_model_level_flag() {
        let categories = CategoryRegistry::default();
        let mut target = MemoryStore::new().create_missing(true);
        let records = vec![source(1, &["doc_model", "", "", "-1", "Author", "me", "Text", ""])];

        let report = Batch::new(&categories).run(records, &mut target);

        assert!(report.records[0].model_level);
        assert!(report.records[0].can_set);
        assert_eq!(
            target.get("doc_model", "", "Author").unwrap().value,
            Some(SlotValue::Text("me".into()))
        );
    }

    #[test]
    fn test_report_serialization() {
        let categories = CategoryRegistry::default();
        let mut target = store();
        let records = vec![
            source(1, &["e1", "c1", "G", "-1", "Count", "7", "Int", ""]),
            source(2, &["bad"]),
        ];

        let report = Batch::new(&categories).run(records, &mut target);
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["stats"]["applied"], 1);
        assert_eq!(json["records"][0]["outcome"]["status"], "applied");
        assert_eq!(json["records"][0]["outcome"]["value"]["integer"], 7);
        assert_eq!(json["records"][1]["externalId"], "bad");
        assert_eq!(json["records"][1]["outcome"]["error"]["code"], "MalformedRecord");
        assert_eq!(json["records"][1]["outcome"]["error"]["content"][0], "bad");
    }
}
