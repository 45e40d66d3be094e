use std::collections::BTreeMap;
use std::sync::Arc;

use crate::geometry::Geometry;
use crate::schema::TableSchema;
use crate::value::FieldValue;

/// One row of a feature query result.
///
/// Transient: built per result, consumed by marshalling. Attributes are
/// kept in a `BTreeMap` so the marshalled attribute map has a
/// deterministic key order.
#[derive(Debug, Clone)]
pub struct FeatureRow {
    pub geometry: Option<Geometry>,
    pub attributes: BTreeMap<String, FieldValue>,
    /// Schema of the table the row came from.
    pub table: Arc<TableSchema>,
}

/// One record of a statistics query result.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AggregationRow {
    /// Group-by field name -> group value.
    pub group: BTreeMap<String, FieldValue>,
    /// Output alias -> statistic value.
    pub statistics: BTreeMap<String, FieldValue>,
}
