//! Value application: coercing a property into its slot's storage kind.

use crate::error::MetaPropError;
use crate::meta_prop::MetaProp;
use crate::meta_type::MetaType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Value representation a target slot accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StorageKind {
    FloatingPoint,
    IdentifierReference,
    Integer,
    Text,
    Unsupported,
}

impl StorageKind {
    /// Zero value written when a slot is cleared.
    pub fn zero_value(self) -> Option<SlotValue> {
        match self {
            StorageKind::FloatingPoint => Some(SlotValue::FloatingPoint(0.0)),
            StorageKind::IdentifierReference => Some(SlotValue::Reference(None)),
            StorageKind::Integer => Some(SlotValue::Integer(0)),
            StorageKind::Text => Some(SlotValue::Text(String::new())),
            StorageKind::Unsupported => None,
        }
    }
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StorageKind::FloatingPoint => "floating-point",
            StorageKind::IdentifierReference => "identifier-reference",
            StorageKind::Integer => "integer",
            StorageKind::Text => "text",
            StorageKind::Unsupported => "unsupported",
        })
    }
}

/// A coerced value, ready to be written into a slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SlotValue {
    FloatingPoint(f64),
    /// Identifier reference; `None` is the null reference.
    Reference(Option<i64>),
    Integer(i64),
    Text(String),
}

impl SlotValue {
    pub fn storage_kind(&self) -> StorageKind {
        match self {
            SlotValue::FloatingPoint(_) => StorageKind::FloatingPoint,
            SlotValue::Reference(_) => StorageKind::IdentifierReference,
            SlotValue::Integer(_) => StorageKind::Integer,
            SlotValue::Text(_) => StorageKind::Text,
        }
    }
}

impl fmt::Display for SlotValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotValue::FloatingPoint(n) => write!(f, "{n:?}"),
            SlotValue::Reference(Some(id)) => write!(f, "#{id}"),
            SlotValue::Reference(None) => f.write_str("#null"),
            SlotValue::Integer(n) => write!(f, "{n}"),
            SlotValue::Text(s) => write!(f, "{s:?}"),
        }
    }
}

/// Coerce a property into the value a slot of `storage` kind should receive.
///
/// Pure: nothing is written. `DeleteOverride` yields the storage kind's zero
/// value; every other kind must match the slot exactly. Doubles must be
/// finite: `NaN` and infinities have no JSON form in the store or the report.
pub fn coerce(prop: &MetaProp, storage: StorageKind) -> Result<SlotValue, MetaPropError> {
    let mismatch = || MetaPropError::StorageKindMismatch {
        meta_type: prop.meta_type,
        storage,
    };

    match prop.meta_type {
        MetaType::DeleteOverride => storage
            .zero_value()
            .ok_or(MetaPropError::UnsupportedStorageKind),
        MetaType::Text | MetaType::Link | MetaType::File => match storage {
            StorageKind::Text => Ok(SlotValue::Text(prop.display())),
            _ => Err(mismatch()),
        },
        MetaType::Int => match storage {
            StorageKind::Integer => prop
                .display_value
                .trim()
                .parse::<i64>()
                .map(SlotValue::Integer)
                .map_err(|_| MetaPropError::InvalidIntegerValue(prop.display_value.clone())),
            _ => Err(mismatch()),
        },
        MetaType::Double => match storage {
            StorageKind::FloatingPoint => prop
                .display_value
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(SlotValue::FloatingPoint)
                .ok_or_else(|| MetaPropError::InvalidDoubleValue(prop.display_value.clone())),
            _ => Err(mismatch()),
        },
    }
}

/// Coerce a property and hand the result to `write`, exactly once.
///
/// `write` is the target's write surface; its failure message is reported as
/// [`MetaPropError::WriteFailed`]. Returns the value that was written.
pub fn apply<F>(prop: &MetaProp, storage: StorageKind, write: F) -> Result<SlotValue, MetaPropError>
where
    F: FnOnce(SlotValue) -> Result<(), String>,
{
    let value = coerce(prop, storage)?;
    write(value.clone()).map_err(MetaPropError::WriteFailed)?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prop(meta_type: &str, value: &str) -> MetaProp {
        MetaProp::from_row(&["e1", "c1", "G", "-1", "N", value, meta_type, "fl", "f.pdf", "http://x"])
            .unwrap()
    }

    #[test]
    fn test_delete_override_zero_values() {
        let p = prop("DeleteOverride", "whatever");

        assert_eq!(coerce(&p, StorageKind::FloatingPoint).unwrap(), SlotValue::FloatingPoint(0.0));
        assert_eq!(coerce(&p, StorageKind::IdentifierReference).unwrap(), SlotValue::Reference(None));
        assert_eq!(coerce(&p, StorageKind::Integer).unwrap(), SlotValue::Integer(0));
        assert_eq!(coerce(&p, StorageKind::Text).unwrap(), SlotValue::Text(String::new()));
        assert_eq!(
            coerce(&p, StorageKind::Unsupported),
            Err(MetaPropError::UnsupportedStorageKind)
        );
    }

    #[test]
    fn test_text_like_writes_display_value() {
        assert_eq!(coerce(&prop("Text", "v"), StorageKind::Text).unwrap(), SlotValue::Text("v".into()));
        assert_eq!(
            coerce(&prop("Link", "Spec"), StorageKind::Text).unwrap(),
            SlotValue::Text("link:Spec:http://x".into())
        );
        assert_eq!(
            coerce(&prop("File", "Drawing"), StorageKind::Text).unwrap(),
            SlotValue::Text("file:Drawing:fl:f.pdf".into())
        );
    }

    #[test]
    fn test_text_like_requires_text_slot() {
        for meta_type in ["Text", "Link", "File"] {
            for storage in [
                StorageKind::FloatingPoint,
                StorageKind::IdentifierReference,
                StorageKind::Integer,
                StorageKind::Unsupported,
            ] {
                let err = coerce(&prop(meta_type, "v"), storage).unwrap_err();
                assert_eq!(err.code(), "StorageKindMismatch", "{meta_type} -> {storage}");
            }
        }
    }

    #[test]
    fn test_integer_parsing() {
        assert_eq!(coerce(&prop("Int", "42"), StorageKind::Integer).unwrap(), SlotValue::Integer(42));
        assert_eq!(coerce(&prop("Int", " -7 "), StorageKind::Integer).unwrap(), SlotValue::Integer(-7));
        assert_eq!(
            coerce(&prop("Int", "4.2"), StorageKind::Integer),
            Err(MetaPropError::InvalidIntegerValue("4.2".into()))
        );
        assert_eq!(
            coerce(&prop("Int", ""), StorageKind::Integer),
            Err(MetaPropError::InvalidIntegerValue("".into()))
        );
    }

    #[test]
    fn test_double_parsing() {
        assert_eq!(
            coerce(&prop("Double", "2.5"), StorageKind::FloatingPoint).unwrap(),
            SlotValue::FloatingPoint(2.5)
        );
        assert_eq!(
            coerce(&prop("Double", "3"), StorageKind::FloatingPoint).unwrap(),
            SlotValue::FloatingPoint(3.0)
        );
        assert_eq!(
            coerce(&prop("Double", "abc"), StorageKind::FloatingPoint),
            Err(MetaPropError::InvalidDoubleValue("abc".into()))
        );
    }

    #[test]
    fn test_double_rejects_non_finite() {
        for literal in ["NaN", "nan", "inf", "-inf", "infinity", "1e999"] {
            assert_eq!(
                coerce(&prop("Double", literal), StorageKind::FloatingPoint),
                Err(MetaPropError::InvalidDoubleValue(literal.into())),
                "{literal}"
            );
        }
    }

    #[test]
    fn test_numeric_kind_mismatch() {
        let err = coerce(&prop("Int", "42"), StorageKind::Text).unwrap_err();
        assert_eq!(
            err,
            MetaPropError::StorageKindMismatch {
                meta_type: MetaType::Int,
                storage: StorageKind::Text,
            }
        );
        assert!(coerce(&prop("Double", "1"), StorageKind::Integer).is_err());
        // Type mismatch wins over a bad value.
        assert_eq!(
            coerce(&prop("Double", "abc"), StorageKind::Text).unwrap_err().code(),
            "StorageKindMismatch"
        );
    }

    #[test]
    fn test_apply_writes_once() {
        let mut writes = Vec::new();
        let value = apply(&prop("Int", "42"), StorageKind::Integer, |v| {
            writes.push(v);
            Ok(())
        })
        .unwrap();

        assert_eq!(value, SlotValue::Integer(42));
        assert_eq!(writes, vec![SlotValue::Integer(42)]);
    }

    #[test]
    fn test_apply_skips_write_on_coercion_failure() {
        let mut called = false;
        let result = apply(&prop("Int", "x"), StorageKind::Integer, |_| {
            called = true;
            Ok(())
        });

        assert!(result.is_err());
        assert!(!called);
    }

    #[test]
    fn test_apply_reports_write_failure() {
        let result = apply(&prop("Text", "v"), StorageKind::Text, |_| Err("read-only".into()));
        assert_eq!(result, Err(MetaPropError::WriteFailed("read-only".into())));
    }

    #[test]
    fn test_slot_value_display() {
        assert_eq!(SlotValue::FloatingPoint(0.0).to_string(), "0.0");
        assert_eq!(SlotValue::Reference(None).to_string(), "#null");
        assert_eq!(SlotValue::Integer(42).to_string(), "42");
        assert_eq!(SlotValue::Text("a".into()).to_string(), "\"a\"");
    }
}
