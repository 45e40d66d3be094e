//! Result marshalling: typed rows -> wire-safe maps.
//!
//! Feature attributes and statistics records are filtered differently.
//! Attributes go through the declared-schema coercion table in
//! [`crate::coerce`]; statistics records keep only values whose runtime
//! kind is text or numeric (or explicitly absent) and silently drop dates,
//! identifiers and blobs. Callers have come to depend on both behaviours,
//! so they are kept apart here.

use rmpv::Value;
use tracing::warn;

use crate::coerce::coerce;
use crate::feature::{AggregationRow, FeatureRow};
use crate::schema::TableSchema;
use crate::value::FieldValue;

fn entry(key: &str, value: Value) -> (Value, Value) {
    (Value::from(key), value)
}

/// Marshal one feature row.
///
/// Produces `geometry`, `geometryJson` (only with a geometry),
/// `centerPoint`, `featureTable` and `attributes`.
#[must_use]
pub fn to_wire_row(row: &FeatureRow) -> Value {
    let mut out = Vec::with_capacity(5);

    let wire_geometry = row.geometry.as_ref().and_then(|g| match g.to_wire() {
        Ok(v) => Some(v),
        Err(e) => {
            warn!(error = %e, "dropping geometry that failed to encode");
            None
        }
    });
    out.push(entry("geometry", wire_geometry.clone().unwrap_or(Value::Nil)));

    if wire_geometry.is_some() {
        if let Some(json) = row.geometry.as_ref().and_then(|g| g.to_json().ok()) {
            out.push(entry("geometryJson", Value::from(json)));
        }
    }

    let center = row
        .geometry
        .as_ref()
        .and_then(crate::geometry::Geometry::extent)
        .map(|e| e.center());
    out.push(entry(
        "centerPoint",
        Value::Map(vec![
            entry("x", center.map_or(Value::Nil, |(x, _)| Value::F64(x))),
            entry("y", center.map_or(Value::Nil, |(_, y)| Value::F64(y))),
        ]),
    ));

    out.push(entry("featureTable", feature_table(&row.table)));

    let attributes = row
        .attributes
        .iter()
        .map(|(name, raw)| entry(name, coerce(row.table.field_type(name), raw)))
        .collect();
    out.push(entry("attributes", Value::Map(attributes)));

    Value::Map(out)
}

/// Describe the owning table: names, fields and feature types.
#[must_use]
pub fn feature_table(table: &TableSchema) -> Value {
    let fields = table
        .fields
        .iter()
        .map(|f| {
            Value::Map(vec![
                entry("alias", Value::from(f.alias.as_str())),
                entry("fieldType", Value::from(f.field_type.wire_tag())),
                entry("name", Value::from(f.name.as_str())),
            ])
        })
        .collect();

    let feature_types = table
        .feature_types
        .iter()
        .filter_map(|ft| {
            ft.id.to_scalar_wire().map(|id| {
                Value::Map(vec![
                    entry("id", id),
                    entry("name", Value::from(ft.name.as_str())),
                ])
            })
        })
        .collect();

    Value::Map(vec![
        entry("displayName", Value::from(table.display_name.as_str())),
        entry("tableName", Value::from(table.table_name.as_str())),
        entry("fields", Value::Array(fields)),
        entry("featureTypes", Value::Array(feature_types)),
    ])
}

/// Marshal one statistics record into `{group, statistics}`.
#[must_use]
pub fn to_wire_aggregation(row: &AggregationRow) -> Value {
    Value::Map(vec![
        entry("group", scalar_map(&row.group)),
        entry("statistics", scalar_map(&row.statistics)),
    ])
}

fn scalar_map<'a>(values: impl IntoIterator<Item = (&'a String, &'a FieldValue)>) -> Value {
    Value::Map(
        values
            .into_iter()
            .filter_map(|(k, v)| {
                let wire = if v.is_null() {
                    Some(Value::Nil)
                } else {
                    v.to_scalar_wire()
                };
                wire.map(|w| entry(k, w))
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use uuid::Uuid;

    use super::*;
    use crate::geometry::{Envelope, Geometry, Point, Polyline};
    use crate::schema::{FeatureType, Field, FieldType};

    fn lookup<'a>(map: &'a Value, key: &str) -> &'a Value {
        map.as_map()
            .unwrap()
            .iter()
            .find(|(k, _)| k.as_str() == Some(key))
            .map(|(_, v)| v)
            .unwrap_or_else(|| panic!("missing key {key}"))
    }

    fn has_key(map: &Value, key: &str) -> bool {
        map.as_map()
            .unwrap()
            .iter()
            .any(|(k, _)| k.as_str() == Some(key))
    }

    fn schema() -> Arc<TableSchema> {
        Arc::new(TableSchema {
            display_name: "Parcels".to_string(),
            table_name: "parcels".to_string(),
            fields: vec![
                Field::new("OBJECTID", "Object ID", FieldType::Oid),
                Field::new("GLOBALID", "Global ID", FieldType::GlobalId),
                Field::new("NAME", "Name", FieldType::Text),
                Field::new("LANES", "Lanes", FieldType::Short),
                Field::new("POP", "Population", FieldType::Integer),
                Field::new("RATIO", "Ratio", FieldType::Float),
                Field::new("AREA", "Area", FieldType::Double),
                Field::new("UPDATED", "Updated", FieldType::Date),
                Field::new("SHAPE", "Shape", FieldType::Geometry),
                Field::new("DOC", "Document", FieldType::Blob),
            ],
            feature_types: vec![
                FeatureType {
                    id: FieldValue::Integer(1),
                    name: "Residential".to_string(),
                },
                FeatureType {
                    id: FieldValue::Date(5),
                    name: "Dropped".to_string(),
                },
                FeatureType {
                    id: FieldValue::from("C"),
                    name: "Commercial".to_string(),
                },
            ],
        })
    }

    fn point(x: f64, y: f64) -> Geometry {
        Geometry::Point(Point {
            x,
            y,
            z: None,
            spatial_reference: None,
        })
    }

    #[test]
    fn attributes_follow_declared_types_field_by_field() {
        let id = Uuid::from_u128(7);
        let attributes = BTreeMap::from([
            ("OBJECTID".to_string(), FieldValue::Long(11)),
            ("GLOBALID".to_string(), FieldValue::Guid(id)),
            ("NAME".to_string(), FieldValue::from("Lot 4")),
            ("LANES".to_string(), FieldValue::Short(2)),
            ("POP".to_string(), FieldValue::Integer(120)),
            ("RATIO".to_string(), FieldValue::Float(0.25)),
            ("AREA".to_string(), FieldValue::Double(512.5)),
            ("UPDATED".to_string(), FieldValue::Date(1_700_000_000_000)),
            ("SHAPE".to_string(), FieldValue::Blob(vec![0, 1])),
            ("DOC".to_string(), FieldValue::Blob(vec![9])),
            ("EXTRA".to_string(), FieldValue::Integer(3)),
        ]);
        let row = FeatureRow {
            geometry: None,
            attributes,
            table: schema(),
        };
        let wire = to_wire_row(&row);
        let attrs = lookup(&wire, "attributes");

        assert_eq!(lookup(attrs, "OBJECTID"), &Value::from(11));
        assert_eq!(lookup(attrs, "GLOBALID"), &Value::from(id.to_string()));
        assert_eq!(lookup(attrs, "NAME"), &Value::from("Lot 4"));
        assert_eq!(lookup(attrs, "LANES"), &Value::from(2));
        assert_eq!(lookup(attrs, "POP"), &Value::from(120));
        assert_eq!(lookup(attrs, "RATIO"), &Value::F32(0.25));
        assert_eq!(lookup(attrs, "AREA"), &Value::F64(512.5));
        assert_eq!(lookup(attrs, "UPDATED"), &Value::from(1_700_000_000_000_i64));
        assert_eq!(lookup(attrs, "SHAPE"), &Value::Nil);
        assert_eq!(lookup(attrs, "DOC"), &Value::Nil);
        assert_eq!(lookup(attrs, "EXTRA"), &Value::Nil);
    }

    #[test]
    fn row_without_geometry_has_null_center_and_no_json() {
        let row = FeatureRow {
            geometry: None,
            attributes: BTreeMap::new(),
            table: schema(),
        };
        let wire = to_wire_row(&row);
        assert_eq!(lookup(&wire, "geometry"), &Value::Nil);
        assert!(!has_key(&wire, "geometryJson"));
        let center = lookup(&wire, "centerPoint");
        assert_eq!(lookup(center, "x"), &Value::Nil);
        assert_eq!(lookup(center, "y"), &Value::Nil);
    }

    #[test]
    fn row_with_geometry_reports_json_and_center() {
        let row = FeatureRow {
            geometry: Some(Geometry::Envelope(Envelope::new(0.0, 0.0, 4.0, 2.0))),
            attributes: BTreeMap::new(),
            table: schema(),
        };
        let wire = to_wire_row(&row);
        assert!(lookup(&wire, "geometry").is_map());
        assert_eq!(
            lookup(&wire, "geometryJson"),
            &Value::from(r#"{"xmin":0.0,"ymin":0.0,"xmax":4.0,"ymax":2.0}"#)
        );
        let center = lookup(&wire, "centerPoint");
        assert_eq!(lookup(center, "x"), &Value::F64(2.0));
        assert_eq!(lookup(center, "y"), &Value::F64(1.0));

        let p = FeatureRow {
            geometry: Some(point(3.0, -1.0)),
            attributes: BTreeMap::new(),
            table: schema(),
        };
        let center = lookup(&to_wire_row(&p), "centerPoint").clone();
        assert_eq!(lookup(&center, "x"), &Value::F64(3.0));
    }

    #[test]
    fn empty_geometry_still_serializes_but_has_no_center() {
        let row = FeatureRow {
            geometry: Some(Geometry::Polyline(Polyline {
                paths: vec![],
                spatial_reference: None,
            })),
            attributes: BTreeMap::new(),
            table: schema(),
        };
        let wire = to_wire_row(&row);
        assert!(has_key(&wire, "geometryJson"));
        assert_eq!(lookup(lookup(&wire, "centerPoint"), "x"), &Value::Nil);
    }

    #[test]
    fn feature_table_describes_fields_and_scalar_feature_types() {
        let table = feature_table(&schema());
        assert_eq!(lookup(&table, "displayName"), &Value::from("Parcels"));
        assert_eq!(lookup(&table, "tableName"), &Value::from("parcels"));

        let fields = lookup(&table, "fields").as_array().unwrap();
        assert_eq!(fields.len(), 10);
        assert_eq!(lookup(&fields[0], "fieldType"), &Value::from("oid"));
        assert_eq!(lookup(&fields[0], "alias"), &Value::from("Object ID"));
        assert_eq!(lookup(&fields[3], "fieldType"), &Value::from("number"));
        assert_eq!(lookup(&fields[8], "fieldType"), &Value::from("ignore"));

        let types = lookup(&table, "featureTypes").as_array().unwrap();
        assert_eq!(types.len(), 2);
        assert_eq!(lookup(&types[0], "id"), &Value::from(1));
        assert_eq!(lookup(&types[1], "id"), &Value::from("C"));
    }

    #[test]
    fn aggregation_keeps_only_scalars_and_absence() {
        let row = AggregationRow {
            group: BTreeMap::from([
                ("STATE".to_string(), FieldValue::from("WA")),
                ("WHEN".to_string(), FieldValue::Date(10)),
                ("ID".to_string(), FieldValue::Guid(Uuid::nil())),
            ]),
            statistics: BTreeMap::from([
                ("p".to_string(), FieldValue::Double(42.0)),
                ("n".to_string(), FieldValue::Long(3)),
                ("none".to_string(), FieldValue::Null),
                ("blob".to_string(), FieldValue::Blob(vec![1])),
            ]),
        };
        let wire = to_wire_aggregation(&row);

        let group = lookup(&wire, "group");
        assert_eq!(group.as_map().unwrap().len(), 1);
        assert_eq!(lookup(group, "STATE"), &Value::from("WA"));

        let stats = lookup(&wire, "statistics");
        assert_eq!(stats.as_map().unwrap().len(), 3);
        assert_eq!(lookup(stats, "p"), &Value::F64(42.0));
        assert_eq!(lookup(stats, "n"), &Value::from(3));
        assert_eq!(lookup(stats, "none"), &Value::Nil);
        assert!(!has_key(stats, "blob"));
    }
}
