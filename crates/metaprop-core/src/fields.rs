//! Flat field bags: what a decoded record looks like before validation.
//!
//! Both input encodings decode into the same shape, keyed by the camelCase
//! attribute names below. Field order follows the positional CSV layout.

use indexmap::IndexMap;

pub const EXTERNAL_ID: &str = "externalId";
pub const COMPONENT: &str = "component";
pub const DISPLAY_CATEGORY: &str = "displayCategory";
pub const CATEGORY_ID: &str = "categoryId";
pub const DISPLAY_NAME: &str = "displayName";
pub const DISPLAY_VALUE: &str = "displayValue";
pub const META_TYPE: &str = "metaType";
pub const FILELINK: &str = "filelink";
pub const FILENAME: &str = "filename";
pub const LINK: &str = "link";
pub const CAN_SET: &str = "canSet";

/// Positional layout of a flat record. The first eight are required.
pub const POSITIONAL: [&str; 10] = [
    EXTERNAL_ID,
    COMPONENT,
    DISPLAY_CATEGORY,
    CATEGORY_ID,
    DISPLAY_NAME,
    DISPLAY_VALUE,
    META_TYPE,
    FILELINK,
    FILENAME,
    LINK,
];

/// Number of leading positional fields every flat record must carry.
pub const REQUIRED_LEN: usize = 8;

/// A bag of named text fields describing one record.
pub type Fields = IndexMap<String, String>;

/// Extension trait for building and reading [`Fields`] ergonomically.
pub trait FieldsExt {
    fn with(self, key: impl Into<String>, value: impl Into<String>) -> Self;

    /// Field value, or the empty string when absent.
    fn text(&self, key: &str) -> &str;
}

impl FieldsExt for Fields {
    fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key.into(), value.into());
        self
    }

    fn text(&self, key: &str) -> &str {
        self.get(key).map(String::as_str).unwrap_or("")
    }
}
