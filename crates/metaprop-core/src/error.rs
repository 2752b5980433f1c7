//! Failure taxonomy for decoding, resolving and applying properties.

use crate::applier::StorageKind;
use crate::meta_type::MetaType;

/// Errors that can occur while turning a record into a written property.
///
/// Every variant except [`MetaPropError::Parse`] is scoped to a single record:
/// the batch attaches it to that record's identity and moves on.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MetaPropError {
    #[error("malformed record with {len} fields: {reason}")]
    MalformedRecord {
        /// Number of fields the record carried.
        len: usize,
        /// Raw field content, kept for the report.
        content: Vec<String>,
        reason: String,
    },

    #[error("unsupported meta type: '{0}'")]
    UnsupportedMetaType(String),

    #[error("unknown category id: '{0}'")]
    UnknownCategoryId(String),

    #[error("{meta_type} value cannot be written to a {storage} slot")]
    StorageKindMismatch {
        meta_type: MetaType,
        storage: StorageKind,
    },

    #[error("slot storage kind is unsupported")]
    UnsupportedStorageKind,

    #[error("invalid integer value: '{0}'")]
    InvalidIntegerValue(String),

    #[error("invalid double value: '{0}'")]
    InvalidDoubleValue(String),

    #[error("{0} properties cannot be written directly to this target")]
    UnsupportedForDirectWrite(MetaType),

    #[error("target write failed: {0}")]
    WriteFailed(String),

    #[error("failed to parse input: {0}")]
    Parse(String),
}

impl MetaPropError {
    /// Stable identifier for the failure class, used in reports.
    pub fn code(&self) -> &'static str {
        match self {
            MetaPropError::MalformedRecord { .. } => "MalformedRecord",
            MetaPropError::UnsupportedMetaType(_) => "UnsupportedMetaType",
            MetaPropError::UnknownCategoryId(_) => "UnknownCategoryId",
            MetaPropError::StorageKindMismatch { .. } => "StorageKindMismatch",
            MetaPropError::UnsupportedStorageKind => "UnsupportedStorageKind",
            MetaPropError::InvalidIntegerValue(_) => "InvalidIntegerValue",
            MetaPropError::InvalidDoubleValue(_) => "InvalidDoubleValue",
            MetaPropError::UnsupportedForDirectWrite(_) => "UnsupportedForDirectWrite",
            MetaPropError::WriteFailed(_) => "WriteFailed",
            MetaPropError::Parse(_) => "Parse",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = MetaPropError::StorageKindMismatch {
            meta_type: MetaType::Int,
            storage: StorageKind::Text,
        };
        assert_eq!(err.to_string(), "Int value cannot be written to a text slot");
        assert_eq!(err.code(), "StorageKindMismatch");

        let err = MetaPropError::MalformedRecord {
            len: 7,
            content: vec!["a".into(); 7],
            reason: "expected 8 to 10".into(),
        };
        assert_eq!(err.to_string(), "malformed record with 7 fields: expected 8 to 10");
    }
}
