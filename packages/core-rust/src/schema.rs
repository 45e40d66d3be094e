//! Table schema as reported by a remote feature table.
//!
//! Owned by the remote table and read-only to this crate: marshalling
//! consults it to pick a coercion per attribute and to describe the table
//! back to the caller.

use serde::{Deserialize, Serialize};

use crate::value::FieldValue;

/// Declared semantic type of a field.
///
/// Variant names use `SCREAMING_CASE` on the wire to match the service's
/// field type literals exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldType {
    Unknown,
    Guid,
    #[serde(rename = "GLOBALID")]
    GlobalId,
    Oid,
    Text,
    Integer,
    Short,
    Float,
    Double,
    Date,
    Geometry,
    Raster,
    Xml,
    Blob,
}

impl FieldType {
    /// Classification tag reported to the caller in `featureTable.fields`.
    #[must_use]
    pub fn wire_tag(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Guid => "guid",
            Self::Double | Self::Short | Self::Integer | Self::Float => "number",
            Self::Date => "date",
            Self::Text => "text",
            Self::Oid => "oid",
            Self::GlobalId => "globalid",
            Self::Blob | Self::Geometry | Self::Raster | Self::Xml => "ignore",
        }
    }

    /// Object id and global id fields are what an ids-only load retains.
    #[must_use]
    pub fn is_identifier(self) -> bool {
        matches!(self, Self::Oid | Self::GlobalId)
    }
}

/// Single field definition within a table schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Name of the field as used in attribute maps and where clauses.
    pub name: String,
    /// Human-readable alias.
    pub alias: String,
    /// Declared semantic type.
    pub field_type: FieldType,
}

impl Field {
    #[must_use]
    pub fn new(name: impl Into<String>, alias: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            alias: alias.into(),
            field_type,
        }
    }
}

/// A categorical sub-type of the table (feature type / subtype).
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureType {
    /// Type id. Only primitive scalar ids are reported to the caller.
    pub id: FieldValue,
    pub name: String,
}

/// Schema and display metadata of a remote table.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TableSchema {
    pub display_name: String,
    pub table_name: String,
    pub fields: Vec<Field>,
    pub feature_types: Vec<FeatureType>,
}

impl TableSchema {
    /// Look up a field by exact name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Declared type of the named field, if the schema has it.
    #[must_use]
    pub fn field_type(&self, name: &str) -> Option<FieldType> {
        self.field(name).map(|f| f.field_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_tags_group_numeric_and_ignored_types() {
        for t in [
            FieldType::Double,
            FieldType::Short,
            FieldType::Integer,
            FieldType::Float,
        ] {
            assert_eq!(t.wire_tag(), "number");
        }
        for t in [
            FieldType::Blob,
            FieldType::Geometry,
            FieldType::Raster,
            FieldType::Xml,
        ] {
            assert_eq!(t.wire_tag(), "ignore");
        }
        assert_eq!(FieldType::GlobalId.wire_tag(), "globalid");
        assert_eq!(FieldType::Oid.wire_tag(), "oid");
        assert_eq!(FieldType::Unknown.wire_tag(), "unknown");
    }

    #[test]
    fn field_type_literals_deserialize() {
        let t: FieldType = serde_json::from_str("\"GLOBALID\"").unwrap();
        assert_eq!(t, FieldType::GlobalId);
        let t: FieldType = serde_json::from_str("\"OID\"").unwrap();
        assert_eq!(t, FieldType::Oid);
    }

    #[test]
    fn field_lookup_is_exact() {
        let schema = TableSchema {
            fields: vec![Field::new("POP", "Population", FieldType::Integer)],
            ..TableSchema::default()
        };
        assert_eq!(schema.field_type("POP"), Some(FieldType::Integer));
        assert_eq!(schema.field_type("pop"), None);
    }
}
