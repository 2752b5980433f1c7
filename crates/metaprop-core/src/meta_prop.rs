//! The validated property record and its canonical display value.

use crate::category::{CategoryLookup, GroupingId};
use crate::error::MetaPropError;
use crate::fields::{self, Fields, FieldsExt};
use crate::meta_type::{MetaType, ValueKind};
use crate::record;
use serde::Serialize;

/// Prefix marking a model-level (document scope) external id.
pub const MODEL_SCOPE_PREFIX: &str = "doc_";

/// Sentinel display value of a [`MetaType::DeleteOverride`] property.
pub const DELETE_SENTINEL: &str = "<delete>";

/// One property observation to apply to one target element.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaProp {
    pub external_id: String,
    pub component: String,
    pub display_category: String,
    pub category_id: String,
    pub display_name: String,
    pub display_value: String,
    pub meta_type: MetaType,
    pub filelink: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    /// Whether a write-eligible target slot was found for this property.
    pub can_set: bool,
}

impl MetaProp {
    /// Validate a decoded field bag.
    ///
    /// Absent fields read as empty; `metaType` must be a recognized literal.
    pub fn from_fields(fields: &Fields) -> Result<Self, MetaPropError> {
        let meta_type = fields.text(fields::META_TYPE).parse::<MetaType>()?;

        Ok(Self {
            external_id: fields.text(fields::EXTERNAL_ID).to_string(),
            component: fields.text(fields::COMPONENT).to_string(),
            display_category: fields.text(fields::DISPLAY_CATEGORY).to_string(),
            category_id: fields.text(fields::CATEGORY_ID).to_string(),
            display_name: fields.text(fields::DISPLAY_NAME).to_string(),
            display_value: fields.text(fields::DISPLAY_VALUE).to_string(),
            meta_type,
            filelink: fields.text(fields::FILELINK).to_string(),
            filename: fields.get(fields::FILENAME).cloned(),
            link: fields.get(fields::LINK).cloned(),
            can_set: fields.text(fields::CAN_SET).eq_ignore_ascii_case("true"),
        })
    }

    /// Decode and validate one positional row.
    pub fn from_row<S: AsRef<str>>(row: &[S]) -> Result<Self, MetaPropError> {
        Self::from_fields(&record::decode_row(row)?)
    }

    /// Re-encode the positional fields.
    ///
    /// Trailing optional fields are emitted only when present, so a decoded
    /// row encodes back to exactly the same fields.
    pub fn to_row(&self) -> Vec<String> {
        let mut row = vec![
            self.external_id.clone(),
            self.component.clone(),
            self.display_category.clone(),
            self.category_id.clone(),
            self.display_name.clone(),
            self.display_value.clone(),
            self.meta_type.to_string(),
            self.filelink.clone(),
        ];
        if self.filename.is_some() || self.link.is_some() {
            row.push(self.filename.clone().unwrap_or_default());
        }
        if let Some(link) = &self.link {
            row.push(link.clone());
        }
        row
    }

    /// True when the property belongs to the model rather than an element.
    pub fn is_model_property(&self) -> bool {
        self.external_id.starts_with(MODEL_SCOPE_PREFIX)
    }

    /// True for `File` and `Link` properties.
    pub fn is_file_or_link_property(&self) -> bool {
        self.meta_type.is_file_or_link()
    }

    pub fn is_delete_override(&self) -> bool {
        self.meta_type == MetaType::DeleteOverride
    }

    pub fn value_kind(&self) -> ValueKind {
        self.meta_type.value_kind()
    }

    /// Canonical textual representation of the value.
    pub fn display(&self) -> String {
        match self.meta_type {
            MetaType::Text | MetaType::Int | MetaType::Double => self.display_value.clone(),
            MetaType::Link => format!(
                "link:{}:{}",
                self.display_value,
                self.link.as_deref().unwrap_or("")
            ),
            MetaType::File => format!(
                "file:{}:{}:{}",
                self.display_value,
                self.filelink,
                self.filename.as_deref().unwrap_or("")
            ),
            MetaType::DeleteOverride => DELETE_SENTINEL.to_string(),
        }
    }

    /// Resolve value kind, grouping and display value in one step.
    pub fn resolve(self, categories: &impl CategoryLookup) -> Result<ResolvedProp, MetaPropError> {
        let grouping = categories.lookup(&self.category_id)?;
        Ok(ResolvedProp {
            value_kind: self.value_kind(),
            display: self.display(),
            grouping,
            prop: self,
        })
    }
}

/// A property whose type and grouping have been resolved.
///
/// This is what target collaborators see when they look up or create a slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedProp {
    #[serde(flatten)]
    pub prop: MetaProp,
    pub value_kind: ValueKind,
    pub grouping: GroupingId,
    pub display: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::CategoryRegistry;

    fn prop(meta_type: &str, value: &str) -> MetaProp {
        MetaProp::from_row(&["e1", "c1", "Group", "-1", "Name", value, meta_type, ""]).unwrap()
    }

    #[test]
    fn test_from_row() {
        let p = MetaProp::from_row(&["e1", "c1", "Group A", "-1", "Name", "42", "Int", "", "", ""])
            .unwrap();

        assert_eq!(p.meta_type, MetaType::Int);
        assert_eq!(p.display_name, "Name");
        assert_eq!(p.filename.as_deref(), Some(""));
        assert_eq!(p.link.as_deref(), Some(""));
        assert!(!p.can_set);
    }

    #[test]
    fn test_from_row_rejects_unknown_type() {
        let err = MetaProp::from_row(&["e1", "c1", "G", "-1", "N", "v", "Boolean", ""]).unwrap_err();
        assert_eq!(err, MetaPropError::UnsupportedMetaType("Boolean".into()));
    }

    #[test]
    fn test_row_roundtrip() {
        let rows: [&[&str]; 3] = [
            &["e1", "c1", "G", "-1", "N", "v", "Text", "fl"],
            &["e1", "c1", "G", "-1", "N", "v", "File", "fl", "d.pdf"],
            &["doc_1", "", "", "", "N", "", "Link", "", "", "http://x"],
        ];
        for row in rows {
            let p = MetaProp::from_row(row).unwrap();
            assert_eq!(p.to_row(), row.to_vec());
        }
    }

    #[test]
    fn test_model_property() {
        let mut p = prop("Text", "v");
        assert!(!p.is_model_property());

        p.external_id = "doc_project".into();
        assert!(p.is_model_property());

        p.external_id = "xdoc_project".into();
        assert!(!p.is_model_property());

        p.external_id = "doc".into();
        assert!(!p.is_model_property());
    }

    #[test]
    fn test_display_rules() {
        assert_eq!(prop("Text", "hello").display(), "hello");
        assert_eq!(prop("Int", "42").display(), "42");
        assert_eq!(prop("Double", "abc").display(), "abc");
        assert_eq!(prop("DeleteOverride", "ignored").display(), "<delete>");

        let mut link = prop("Link", "Spec");
        link.link = Some("http://x".into());
        assert_eq!(link.display(), "link:Spec:http://x");

        let mut file = prop("File", "Drawing");
        file.filelink = "fl1".into();
        file.filename = Some("d.pdf".into());
        assert_eq!(file.display(), "file:Drawing:fl1:d.pdf");
    }

    #[test]
    fn test_display_missing_optional_parts() {
        assert_eq!(prop("Link", "Spec").display(), "link:Spec:");
        assert_eq!(prop("File", "Drawing").display(), "file:Drawing::");
    }

    #[test]
    fn test_resolve() {
        let resolved = prop("Double", "1.5")
            .resolve(&CategoryRegistry::default())
            .unwrap();

        assert_eq!(resolved.value_kind, ValueKind::FloatingPoint);
        assert_eq!(resolved.grouping, GroupingId::INVALID);
        assert_eq!(resolved.display, "1.5");

        let mut unknown = prop("Text", "v");
        unknown.category_id = "PG_NOPE".into();
        assert_eq!(
            unknown.resolve(&CategoryRegistry::default()),
            Err(MetaPropError::UnknownCategoryId("PG_NOPE".into()))
        );
    }

    #[test]
    fn test_from_json_fields() {
        let fields = Fields::new()
            .with(fields::EXTERNAL_ID, "e1")
            .with(fields::META_TYPE, "Link")
            .with(fields::LINK, "http://x")
            .with(fields::CAN_SET, "true");
        let p = MetaProp::from_fields(&fields).unwrap();

        assert!(p.can_set);
        assert!(p.is_file_or_link_property());
        assert_eq!(p.filename, None);
        assert_eq!(p.to_row().len(), 10);
    }

    #[test]
    fn test_serialize_camel_case() {
        let json = serde_json::to_value(prop("Int", "42")).unwrap();
        assert_eq!(json["externalId"], "e1");
        assert_eq!(json["metaType"], "Int");
        assert_eq!(json["canSet"], false);
        assert!(json.get("link").is_none());
    }
}
