//! Display-grouping domain: maps serialized `categoryId` keys to grouping ids.

use crate::error::MetaPropError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Grouping identifier understood by the target system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupingId(pub i64);

impl GroupingId {
    /// The "no group" member every domain carries.
    pub const INVALID: GroupingId = GroupingId(-1);
}

impl fmt::Display for GroupingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Resolves a serialized `categoryId` into a grouping id.
pub trait CategoryLookup {
    fn lookup(&self, category_id: &str) -> Result<GroupingId, MetaPropError>;
}

/// Enumerated grouping domain, keyed by member name.
///
/// A `categoryId` may name a member (`"INVALID"`) or give its numeric id
/// (`"-1"`). Anything else is outside the domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryRegistry {
    groups: IndexMap<String, GroupingId>,
}

impl Default for CategoryRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("INVALID", GroupingId::INVALID);
        registry
    }
}

impl CategoryRegistry {
    /// Create a registry with no members at all.
    pub fn empty() -> Self {
        Self {
            groups: IndexMap::new(),
        }
    }

    /// Add or replace a member.
    pub fn register(&mut self, name: impl Into<String>, id: GroupingId) {
        self.groups.insert(name.into(), id);
    }

    /// Add every member of `other`, replacing members with the same name.
    pub fn merge(&mut self, other: &CategoryRegistry) {
        for (name, id) in &other.groups {
            self.groups.insert(name.clone(), *id);
        }
    }

    /// Iterate over members in registration order.
    pub fn groups(&self) -> impl Iterator<Item = (&str, GroupingId)> {
        self.groups.iter().map(|(name, id)| (name.as_str(), *id))
    }

    /// Member name for a grouping id, if registered.
    pub fn name_of(&self, id: GroupingId) -> Option<&str> {
        self.groups
            .iter()
            .find(|(_, g)| **g == id)
            .map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Parse a member table from bytes, picking the format from `path`.
    ///
    /// Falls back to YAML when the extension is missing or unknown.
    pub fn from_bytes(data: &[u8], path: Option<&str>) -> Result<Self, MetaPropError> {
        let format = path
            .and_then(|p| Path::new(p).extension())
            .and_then(|ext| ext.to_str())
            .map(str::to_lowercase)
            .unwrap_or_else(|| "yaml".to_string());

        let table: IndexMap<String, i64> = match format.as_str() {
            "json" => {
                serde_json::from_slice(data).map_err(|e| MetaPropError::Parse(e.to_string()))?
            }
            "toml" => {
                let s = std::str::from_utf8(data)
                    .map_err(|e| MetaPropError::Parse(format!("Invalid UTF-8: {}", e)))?;
                toml::from_str(s).map_err(|e| MetaPropError::Parse(e.to_string()))?
            }
            _ => serde_yaml::from_slice(data).map_err(|e| MetaPropError::Parse(e.to_string()))?,
        };

        let mut registry = Self::empty();
        for (name, id) in table {
            registry.register(name, GroupingId(id));
        }
        Ok(registry)
    }
}

impl CategoryLookup for CategoryRegistry {
    fn lookup(&self, category_id: &str) -> Result<GroupingId, MetaPropError> {
        if let Some(id) = self.groups.get(category_id) {
            return Ok(*id);
        }

        category_id
            .trim()
            .parse::<i64>()
            .ok()
            .map(GroupingId)
            .filter(|id| self.groups.values().any(|g| g == id))
            .ok_or_else(|| MetaPropError::UnknownCategoryId(category_id.to_string()))
    }
}
