//! Target collaborators: where resolved properties get written.

use crate::applier::{SlotValue, StorageKind};
use crate::category::GroupingId;
use crate::meta_prop::ResolvedProp;
use crate::meta_type::ValueKind;
use serde::{Deserialize, Serialize};

/// A slot found by a [`Target`], with its reported storage kind.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSlot<H> {
    pub handle: H,
    pub kind: StorageKind,
    /// Read-only slots are found but not write-eligible.
    pub read_only: bool,
}

/// Trait for the store a batch writes into.
///
/// Resolution and writing are separate so the batch can decide eligibility
/// (and the caller can cancel) before anything is written.
pub trait Target {
    type Handle;

    /// Find the slot for a property: zero or one match.
    fn resolve(&mut self, prop: &ResolvedProp) -> Option<ResolvedSlot<Self::Handle>>;

    /// Write a coerced value into a previously resolved slot.
    fn write(&mut self, handle: &Self::Handle, value: SlotValue) -> Result<(), String>;
}

/// One slot of a [`MemoryStore`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotEntry {
    pub external_id: String,
    #[serde(default)]
    pub component: String,
    pub name: String,
    pub kind: StorageKind,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grouping: Option<GroupingId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<SlotValue>,
}

impl SlotEntry {
    pub fn new(
        external_id: impl Into<String>,
        component: impl Into<String>,
        name: impl Into<String>,
        kind: StorageKind,
    ) -> Self {
        Self {
            external_id: external_id.into(),
            component: component.into(),
            name: name.into(),
            kind,
            read_only: false,
            grouping: None,
            value: None,
        }
    }

    /// Mark the slot read-only.
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    fn matches(&self, prop: &ResolvedProp) -> bool {
        self.external_id == prop.prop.external_id
            && self.component == prop.prop.component
            && self.name == prop.prop.display_name
    }
}

/// In-memory key/value store of slots, keyed by element, component and name.
///
/// Serializes as a JSON object with a `slots` list, which is what the CLI
/// reads and writes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryStore {
    #[serde(default)]
    slots: Vec<SlotEntry>,
    /// Create a slot from the resolved value kind when none matches.
    #[serde(skip)]
    create_missing: bool,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable slot creation for unmatched properties.
    pub fn create_missing(mut self, enabled: bool) -> Self {
        self.create_missing = enabled;
        self
    }

    /// Add a slot.
    pub fn slot(mut self, entry: SlotEntry) -> Self {
        self.insert(entry);
        self
    }

    /// Add or replace a slot with the same key.
    pub fn insert(&mut self, entry: SlotEntry) {
        match self.slots.iter_mut().find(|s| {
            s.external_id == entry.external_id
                && s.component == entry.component
                && s.name == entry.name
        }) {
            Some(existing) => *existing = entry,
            None => self.slots.push(entry),
        }
    }

    /// Look up a slot by its key.
    pub fn get(&self, external_id: &str, component: &str, name: &str) -> Option<&SlotEntry> {
        self.slots
            .iter()
            .find(|s| s.external_id == external_id && s.component == component && s.name == name)
    }

    /// Iterate over all slots.
    pub fn slots(&self) -> impl Iterator<Item = &SlotEntry> {
        self.slots.iter()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Parse a store from JSON bytes.
    pub fn from_json(data: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(data)
    }

    /// Serialize the store to pretty JSON.
    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec_pretty(self)
    }
}

fn storage_for(kind: ValueKind) -> Option<StorageKind> {
    match kind {
        ValueKind::Text => Some(StorageKind::Text),
        ValueKind::Integer => Some(StorageKind::Integer),
        ValueKind::FloatingPoint => Some(StorageKind::FloatingPoint),
        ValueKind::Invalid => None,
    }
}

impl Target for MemoryStore {
    type Handle = usize;

    fn resolve(&mut self, prop: &ResolvedProp) -> Option<ResolvedSlot<usize>> {
        if let Some(index) = self.slots.iter().position(|s| s.matches(prop)) {
            let slot = &self.slots[index];
            return Some(ResolvedSlot {
                handle: index,
                kind: slot.kind,
                read_only: slot.read_only,
            });
        }

        if !self.create_missing {
            return None;
        }

        let kind = storage_for(prop.value_kind)?;
        let mut entry = SlotEntry::new(
            prop.prop.external_id.clone(),
            prop.prop.component.clone(),
            prop.prop.display_name.clone(),
            kind,
        );
        entry.grouping = Some(prop.grouping);
        self.slots.push(entry);

        Some(ResolvedSlot {
            handle: self.slots.len() - 1,
            kind,
            read_only: false,
        })
    }

    fn write(&mut self, handle: &usize, value: SlotValue) -> Result<(), String> {
        let slot = self
            .slots
            .get_mut(*handle)
            .ok_or_else(|| format!("no slot with handle {handle}"))?;
        if slot.read_only {
            return Err(format!("slot '{}' is read-only", slot.name));
        }
        slot.value = Some(value);
        Ok(())
    }
}
