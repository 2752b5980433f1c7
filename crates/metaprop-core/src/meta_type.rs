//! Declared property kinds and the value kinds they resolve to.

use crate::error::MetaPropError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The declared kind of a property, as carried by the `metaType` field.
///
/// Literals are matched case-sensitively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetaType {
    Text,
    Int,
    Double,
    Link,
    File,
    /// Reset the target slot to its zero value instead of assigning one.
    DeleteOverride,
}

impl MetaType {
    /// All recognized kinds, in declaration order.
    pub const ALL: [MetaType; 6] = [
        MetaType::Text,
        MetaType::Int,
        MetaType::Double,
        MetaType::Link,
        MetaType::File,
        MetaType::DeleteOverride,
    ];

    /// The serialized literal for this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            MetaType::Text => "Text",
            MetaType::Int => "Int",
            MetaType::Double => "Double",
            MetaType::Link => "Link",
            MetaType::File => "File",
            MetaType::DeleteOverride => "DeleteOverride",
        }
    }

    /// Value kind used to create or resolve the storage slot.
    pub fn value_kind(self) -> ValueKind {
        match self {
            MetaType::Text | MetaType::Link | MetaType::File => ValueKind::Text,
            MetaType::Int => ValueKind::Integer,
            MetaType::Double => ValueKind::FloatingPoint,
            MetaType::DeleteOverride => ValueKind::Invalid,
        }
    }

    pub fn is_file_or_link(self) -> bool {
        matches!(self, MetaType::File | MetaType::Link)
    }
}

impl FromStr for MetaType {
    type Err = MetaPropError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MetaType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| MetaPropError::UnsupportedMetaType(s.to_string()))
    }
}

impl fmt::Display for MetaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Semantic value type of a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValueKind {
    Text,
    Integer,
    FloatingPoint,
    /// No value: the property clears its slot.
    Invalid,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ValueKind::Text => "text",
            ValueKind::Integer => "integer",
            ValueKind::FloatingPoint => "floating-point",
            ValueKind::Invalid => "invalid",
        })
    }
}

/// Resolve a raw `metaType` literal straight to its value kind.
pub fn resolve_value_kind(literal: &str) -> Result<ValueKind, MetaPropError> {
    literal.parse::<MetaType>().map(MetaType::value_kind)
}
