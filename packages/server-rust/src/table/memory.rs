//! In-memory remote table.
//!
//! A deterministic stand-in for a feature service, used by tests and by the
//! demo binary. Tables are loaded from JSON fixtures and registered under a
//! URL with [`InMemoryTableFactory`].

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use async_trait::async_trait;
use geobridge_core::{
    AggregationDescriptor, AggregationRow, Envelope, FeatureRow, FeatureType, Field, FieldType,
    FieldValue, Geometry, QueryDescriptor, QueryFeatureFields, SortOrder, SpatialRelationship,
    StatisticType, TableSchema,
};
use parking_lot::RwLock;
use serde::Deserialize;
use uuid::Uuid;

use super::filter::WhereClause;
use super::Endpoint;
use crate::traits::{FeatureIter, RemoteTable, RemoteTableFactory};

// ---------------------------------------------------------------------------
// Fixture format
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TableFixture {
    display_name: String,
    table_name: String,
    fields: Vec<FieldFixture>,
    #[serde(default)]
    feature_types: Vec<FeatureTypeFixture>,
    #[serde(default)]
    features: Vec<FeatureFixture>,
}

#[derive(Debug, Deserialize)]
struct FieldFixture {
    name: String,
    #[serde(default)]
    alias: Option<String>,
    #[serde(rename = "type")]
    field_type: FieldType,
}

#[derive(Debug, Deserialize)]
struct FeatureTypeFixture {
    id: serde_json::Value,
    name: String,
}

#[derive(Debug, Deserialize)]
struct FeatureFixture {
    #[serde(default)]
    attributes: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    geometry: Option<Geometry>,
}

/// Convert a fixture attribute to the runtime kind a service would produce
/// for a field of the declared type.
fn value_for_field(field_type: FieldType, json: &serde_json::Value) -> anyhow::Result<FieldValue> {
    use serde_json::Value as Json;

    if json.is_null() {
        return Ok(FieldValue::Null);
    }
    let number = || json.as_f64().ok_or_else(|| anyhow!("expected a number, got {json}"));
    let integer = || json.as_i64().ok_or_else(|| anyhow!("expected an integer, got {json}"));
    Ok(match field_type {
        FieldType::Short => FieldValue::Short(i16::try_from(integer()?)?),
        FieldType::Integer => FieldValue::Integer(i32::try_from(integer()?)?),
        FieldType::Oid => FieldValue::Long(integer()?),
        #[allow(clippy::cast_possible_truncation)]
        FieldType::Float => FieldValue::Float(number()? as f32),
        FieldType::Double => FieldValue::Double(number()?),
        FieldType::Date => FieldValue::Date(integer()?),
        FieldType::Guid | FieldType::GlobalId => {
            let s = json.as_str().ok_or_else(|| anyhow!("expected a guid string, got {json}"))?;
            FieldValue::Guid(Uuid::parse_str(s.trim_matches(['{', '}']))?)
        }
        FieldType::Text => match json {
            Json::String(s) => FieldValue::Text(s.clone()),
            other => FieldValue::Text(other.to_string()),
        },
        FieldType::Unknown
        | FieldType::Geometry
        | FieldType::Raster
        | FieldType::Xml
        | FieldType::Blob => FieldValue::Blob(json.to_string().into_bytes()),
    })
}

/// Runtime kind for an untyped fixture value (feature-type ids).
fn scalar_value(json: &serde_json::Value) -> FieldValue {
    use serde_json::Value as Json;

    match json {
        Json::String(s) => FieldValue::Text(s.clone()),
        Json::Number(n) => match n.as_i64() {
            Some(i) => i32::try_from(i).map_or(FieldValue::Long(i), FieldValue::Integer),
            None => n.as_f64().map_or(FieldValue::Null, FieldValue::Double),
        },
        Json::Null => FieldValue::Null,
        other => FieldValue::Blob(other.to_string().into_bytes()),
    }
}

// ---------------------------------------------------------------------------
// InMemoryTable
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct StoredFeature {
    geometry: Option<Geometry>,
    attributes: BTreeMap<String, FieldValue>,
}

/// A fully materialized table held in memory.
#[derive(Debug, Clone)]
pub struct InMemoryTable {
    schema: Arc<TableSchema>,
    features: Vec<StoredFeature>,
}

impl InMemoryTable {
    #[must_use]
    pub fn new(schema: TableSchema) -> Self {
        Self {
            schema: Arc::new(schema),
            features: Vec::new(),
        }
    }

    /// Append a feature.
    #[must_use]
    pub fn with_feature(
        mut self,
        geometry: Option<Geometry>,
        attributes: impl IntoIterator<Item = (String, FieldValue)>,
    ) -> Self {
        self.features.push(StoredFeature {
            geometry,
            attributes: attributes.into_iter().collect(),
        });
        self
    }

    /// Parse a JSON fixture.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON does not match the fixture format or an
    /// attribute cannot be represented as its field's declared type.
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let fixture: TableFixture = serde_json::from_str(json).context("invalid table fixture")?;
        let schema = TableSchema {
            display_name: fixture.display_name,
            table_name: fixture.table_name,
            fields: fixture
                .fields
                .into_iter()
                .map(|f| {
                    let alias = f.alias.unwrap_or_else(|| f.name.clone());
                    Field::new(f.name, alias, f.field_type)
                })
                .collect(),
            feature_types: fixture
                .feature_types
                .into_iter()
                .map(|ft| FeatureType {
                    id: scalar_value(&ft.id),
                    name: ft.name,
                })
                .collect(),
        };

        let mut features = Vec::with_capacity(fixture.features.len());
        for (index, feature) in fixture.features.into_iter().enumerate() {
            let mut attributes = BTreeMap::new();
            for (name, json) in &feature.attributes {
                let value = match schema.field_type(name) {
                    Some(t) => value_for_field(t, json)
                        .with_context(|| format!("feature {index}, attribute `{name}`"))?,
                    None => scalar_value(json),
                };
                attributes.insert(name.clone(), value);
            }
            features.push(StoredFeature {
                geometry: feature.geometry,
                attributes,
            });
        }

        Ok(Self {
            schema: Arc::new(schema),
            features,
        })
    }

    /// Read and parse a JSON fixture file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read fixture {}", path.display()))?;
        Self::from_json(&json)
    }

    #[must_use]
    pub fn schema(&self) -> &Arc<TableSchema> {
        &self.schema
    }

    /// Features passing the where clause and the spatial filter, in storage order.
    fn select(
        &self,
        where_clause: Option<&str>,
        geometry: Option<&Geometry>,
        relationship: Option<SpatialRelationship>,
    ) -> anyhow::Result<Vec<&StoredFeature>> {
        let clause = WhereClause::parse_optional(where_clause)
            .context("unable to complete operation: invalid where clause")?;
        let query_extent = geometry.and_then(Geometry::extent);

        let mut selected = Vec::new();
        for feature in &self.features {
            if !clause.matches(&feature.attributes) {
                continue;
            }
            if geometry.is_some()
                && !spatial_match(query_extent.as_ref(), feature.geometry.as_ref(), relationship)?
            {
                continue;
            }
            selected.push(feature);
        }
        Ok(selected)
    }

    fn project(&self, feature: &StoredFeature, query: &QueryDescriptor) -> FeatureRow {
        let keep = |name: &str| match query.feature_fields {
            QueryFeatureFields::LoadAll => true,
            QueryFeatureFields::IdsOnly => self.schema.field_type(name) == Some(FieldType::Oid),
            QueryFeatureFields::Minimum => self
                .schema
                .field_type(name)
                .is_some_and(FieldType::is_identifier),
        };
        FeatureRow {
            geometry: if query.return_geometry {
                feature.geometry.clone()
            } else {
                None
            },
            attributes: feature
                .attributes
                .iter()
                .filter(|(name, _)| keep(name))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            table: Arc::clone(&self.schema),
        }
    }
}

/// Envelope-based spatial test. A row without geometry never matches.
fn spatial_match(
    query: Option<&Envelope>,
    row: Option<&Geometry>,
    relationship: Option<SpatialRelationship>,
) -> anyhow::Result<bool> {
    let (Some(query), Some(row)) = (query, row.and_then(Geometry::extent)) else {
        return Ok(false);
    };
    Ok(match relationship {
        None
        | Some(
            SpatialRelationship::Intersects
            | SpatialRelationship::EnvelopeIntersects
            | SpatialRelationship::IndexIntersects,
        ) => query.intersects(&row),
        Some(SpatialRelationship::Disjoint) => !query.intersects(&row),
        Some(SpatialRelationship::Within) => query.contains(&row),
        Some(SpatialRelationship::Contains) => row.contains(query),
        Some(other) => bail!("spatial relationship {other:?} is not supported by this table"),
    })
}

#[async_trait]
impl RemoteTable for InMemoryTable {
    async fn query_features(&self, query: &QueryDescriptor) -> anyhow::Result<FeatureIter> {
        let selected = self.select(
            query.where_clause.as_deref(),
            query.geometry.as_ref(),
            query.spatial_relationship,
        )?;
        let offset = usize::try_from(query.result_offset).unwrap_or(0);
        let limit = usize::try_from(query.max_features)
            .ok()
            .filter(|n| *n > 0)
            .unwrap_or(usize::MAX);
        let rows: Vec<FeatureRow> = selected
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|f| self.project(f, query))
            .collect();
        Ok(Box::new(rows.into_iter()))
    }

    async fn query_feature_count(&self, query: &QueryDescriptor) -> anyhow::Result<u64> {
        let selected = self.select(
            query.where_clause.as_deref(),
            query.geometry.as_ref(),
            query.spatial_relationship,
        )?;
        Ok(selected.len() as u64)
    }

    async fn query_statistics(
        &self,
        query: &AggregationDescriptor,
    ) -> anyhow::Result<Vec<AggregationRow>> {
        if query.statistic_definitions.is_empty() {
            bail!("statistics query requires at least one statistic definition");
        }
        for name in query
            .group_by_field_names
            .iter()
            .chain(query.statistic_definitions.iter().map(|d| &d.field_name))
        {
            if self.schema.field(name).is_none() {
                bail!("field `{name}` does not exist in table `{}`", self.schema.table_name);
            }
        }

        let selected = self.select(
            query.where_clause.as_deref(),
            query.geometry.as_ref(),
            query.spatial_relationship,
        )?;

        // Groups in first-seen order.
        let mut groups: Vec<(Vec<FieldValue>, Vec<&StoredFeature>)> = Vec::new();
        for feature in selected {
            let key: Vec<FieldValue> = query
                .group_by_field_names
                .iter()
                .map(|name| feature.attributes.get(name).cloned().unwrap_or(FieldValue::Null))
                .collect();
            match groups.iter_mut().find(|(k, _)| *k == key) {
                Some((_, members)) => members.push(feature),
                None => groups.push((key, vec![feature])),
            }
        }
        if groups.is_empty() && query.group_by_field_names.is_empty() {
            groups.push((Vec::new(), Vec::new()));
        }

        let mut rows: Vec<AggregationRow> = groups
            .into_iter()
            .map(|(key, members)| AggregationRow {
                group: query.group_by_field_names.iter().cloned().zip(key).collect(),
                statistics: query
                    .statistic_definitions
                    .iter()
                    .map(|def| {
                        let values = members
                            .iter()
                            .filter_map(|f| f.attributes.get(&def.field_name))
                            .filter(|v| !v.is_null());
                        (def.resolved_alias(), compute(def.statistic_type, values))
                    })
                    .collect(),
            })
            .collect();

        if !query.order_by_fields.is_empty() {
            rows.sort_by(|a, b| {
                for order in &query.order_by_fields {
                    let lookup = |row: &AggregationRow| {
                        row.group
                            .get(&order.field_name)
                            .or_else(|| row.statistics.get(&order.field_name))
                            .cloned()
                            .unwrap_or(FieldValue::Null)
                    };
                    let ord = lookup(a).sort_cmp(&lookup(b));
                    let ord = match order.sort_order {
                        SortOrder::Ascending => ord,
                        SortOrder::Descending => ord.reverse(),
                    };
                    if ord.is_ne() {
                        return ord;
                    }
                }
                std::cmp::Ordering::Equal
            });
        }
        Ok(rows)
    }
}

/// Reduce non-null values. `COUNT` counts any kind; the numeric statistics
/// ignore non-numeric values and yield null over an empty input.
#[allow(clippy::cast_precision_loss)]
fn compute<'a>(kind: StatisticType, values: impl Iterator<Item = &'a FieldValue>) -> FieldValue {
    let values: Vec<&FieldValue> = values.collect();
    let numbers: Vec<f64> = values.iter().filter_map(|v| v.as_f64()).collect();
    let n = numbers.len() as f64;
    let sum: f64 = numbers.iter().sum();
    let mean = sum / n;
    let variance = || {
        if numbers.len() < 2 {
            0.0
        } else {
            numbers.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0)
        }
    };
    match kind {
        StatisticType::Count => FieldValue::Long(i64::try_from(values.len()).unwrap_or(i64::MAX)),
        _ if numbers.is_empty() => FieldValue::Null,
        StatisticType::Sum => FieldValue::Double(sum),
        StatisticType::Average => FieldValue::Double(mean),
        StatisticType::Minimum => {
            FieldValue::Double(numbers.iter().copied().fold(f64::INFINITY, f64::min))
        }
        StatisticType::Maximum => {
            FieldValue::Double(numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max))
        }
        StatisticType::Variance => FieldValue::Double(variance()),
        StatisticType::StandardDeviation => FieldValue::Double(variance().sqrt()),
    }
}

// ---------------------------------------------------------------------------
// Missing endpoints
// ---------------------------------------------------------------------------

/// Handle for a URL with no registered table. Every query fails remotely,
/// the way an unreachable service would.
struct MissingTable {
    url: String,
}

impl MissingTable {
    fn fail<T>(&self) -> anyhow::Result<T> {
        Err(anyhow!("no feature service found at {}", self.url))
    }
}

#[async_trait]
impl RemoteTable for MissingTable {
    async fn query_features(&self, _query: &QueryDescriptor) -> anyhow::Result<FeatureIter> {
        self.fail()
    }

    async fn query_feature_count(&self, _query: &QueryDescriptor) -> anyhow::Result<u64> {
        self.fail()
    }

    async fn query_statistics(
        &self,
        _query: &AggregationDescriptor,
    ) -> anyhow::Result<Vec<AggregationRow>> {
        self.fail()
    }
}

// ---------------------------------------------------------------------------
// InMemoryTableFactory
// ---------------------------------------------------------------------------

/// Factory resolving URLs to registered in-memory tables.
#[derive(Default)]
pub struct InMemoryTableFactory {
    tables: RwLock<HashMap<String, Arc<InMemoryTable>>>,
}

impl InMemoryTableFactory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `table` under `url`, replacing any previous registration.
    pub fn register(&self, url: impl Into<String>, table: InMemoryTable) {
        self.tables.write().insert(url.into(), Arc::new(table));
    }
}

impl RemoteTableFactory for InMemoryTableFactory {
    fn create(&self, endpoint: &Endpoint) -> anyhow::Result<Arc<dyn RemoteTable>> {
        let table: Arc<dyn RemoteTable> = match self.tables.read().get(endpoint.as_str()) {
            Some(table) => Arc::clone(table) as Arc<dyn RemoteTable>,
            None => Arc::new(MissingTable {
                url: endpoint.as_str().to_string(),
            }),
        };
        Ok(table)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
