//! Request decoding: untyped wire payload -> typed descriptors.
//!
//! Every cast the caller's payload needs is checked here, up front, so a
//! malformed request fails before any remote work is issued. A handful of
//! keys are deliberately lenient (spatial relationship, statistic type,
//! field-selection policy, the optional statistics sequences) and resolve to
//! a documented default instead of failing.

use rmpv::Value;

use crate::descriptor::{
    AggregationDescriptor, OrderBy, QueryDescriptor, QueryFeatureFields, SortOrder,
    SpatialRelationship, StatisticDefinition, StatisticType,
};
use crate::geometry::Geometry;

/// Wire keys of the query and statistics payloads.
pub mod keys {
    pub const WHERE_CLAUSE: &str = "whereClause";
    pub const GEOMETRY: &str = "geometry";
    pub const SPATIAL_RELATIONSHIP: &str = "spatialRelationship";
    pub const IS_RETURN_GEOMETRY: &str = "isReturnGeometry";
    pub const MAX_FEATURES: &str = "maxFeatures";
    pub const RESULT_OFFSET: &str = "resultOffset";
    pub const GROUP_BY_FIELD_NAMES: &str = "groupByFieldNames";
    pub const STATISTIC_DEFINITIONS: &str = "statisticDefinitions";
    pub const ORDER_BY_FIELDS: &str = "orderByFields";
    pub const FIELD_NAME: &str = "fieldName";
    pub const STATISTIC_TYPE: &str = "statisticType";
    pub const OUTPUT_ALIAS: &str = "outputAlias";
    pub const SORT_ORDER: &str = "sortOrder";
}

/// Errors from decoding a request payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("`{key}` must be a map")]
    NotAMap { key: String },
    #[error("missing required key `{key}`")]
    MissingKey { key: String },
    #[error("`{key}` must be {expected}")]
    WrongType { key: String, expected: &'static str },
    #[error("unsupported sort order `{value}`")]
    InvalidSortOrder { value: String },
    #[error("invalid geometry: {reason}")]
    InvalidGeometry { reason: String },
}

// ---------------------------------------------------------------------------
// Map access helpers
// ---------------------------------------------------------------------------

/// Borrowed view over a wire map with typed accessors.
///
/// `nil` entries read as absent.
#[derive(Debug, Clone, Copy)]
pub struct WireMap<'a> {
    entries: &'a [(Value, Value)],
}

impl<'a> WireMap<'a> {
    /// View `value` as a map, naming it `key` in the error.
    ///
    /// # Errors
    ///
    /// Returns `DecodeError::NotAMap` if `value` is not a map.
    pub fn new(value: &'a Value, key: &str) -> Result<Self, DecodeError> {
        match value {
            Value::Map(entries) => Ok(Self { entries }),
            _ => Err(DecodeError::NotAMap {
                key: key.to_string(),
            }),
        }
    }

    /// Value under `key`, `None` when absent or `nil`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&'a Value> {
        self.entries
            .iter()
            .find(|(k, _)| k.as_str() == Some(key))
            .map(|(_, v)| v)
            .filter(|v| !v.is_nil())
    }

    /// # Errors
    ///
    /// `MissingKey` if absent, `WrongType` if present but not a string.
    pub fn required_str(&self, key: &str) -> Result<&'a str, DecodeError> {
        self.optional_str(key)?.ok_or_else(|| missing(key))
    }

    /// # Errors
    ///
    /// `WrongType` if present but not a string.
    pub fn optional_str(&self, key: &str) -> Result<Option<&'a str>, DecodeError> {
        self.get(key)
            .map(|v| v.as_str().ok_or_else(|| wrong_type(key, "a string")))
            .transpose()
    }

    /// String value, or `None` for absent and non-string values alike.
    #[must_use]
    pub fn lenient_str(&self, key: &str) -> Option<&'a str> {
        self.get(key).and_then(Value::as_str)
    }

    /// # Errors
    ///
    /// `MissingKey` if absent, `WrongType` if not a boolean.
    pub fn required_bool(&self, key: &str) -> Result<bool, DecodeError> {
        self.get(key)
            .ok_or_else(|| missing(key))?
            .as_bool()
            .ok_or_else(|| wrong_type(key, "a boolean"))
    }

    /// # Errors
    ///
    /// `MissingKey` if absent, `WrongType` if not an integer in 32-bit range.
    pub fn required_i32(&self, key: &str) -> Result<i32, DecodeError> {
        self.get(key)
            .ok_or_else(|| missing(key))?
            .as_i64()
            .and_then(|n| i32::try_from(n).ok())
            .ok_or_else(|| wrong_type(key, "a 32-bit integer"))
    }

    /// Elements of a sequence; absent or non-sequence values read as empty.
    #[must_use]
    pub fn lenient_array(&self, key: &str) -> &'a [Value] {
        match self.get(key).and_then(Value::as_array) {
            Some(items) => items.as_slice(),
            None => &[],
        }
    }
}

fn missing(key: &str) -> DecodeError {
    DecodeError::MissingKey {
        key: key.to_string(),
    }
}

fn wrong_type(key: &str, expected: &'static str) -> DecodeError {
    DecodeError::WrongType {
        key: key.to_string(),
        expected,
    }
}

// ---------------------------------------------------------------------------
// Shared sub-parsers
// ---------------------------------------------------------------------------

/// Filter clause, geometry and spatial predicate common to both payloads.
struct FilterParts {
    where_clause: Option<String>,
    geometry: Option<Geometry>,
    spatial_relationship: Option<SpatialRelationship>,
}

fn parse_filter(map: &WireMap<'_>) -> Result<FilterParts, DecodeError> {
    let where_clause = map.optional_str(keys::WHERE_CLAUSE)?.map(str::to_string);
    let geometry = map
        .get(keys::GEOMETRY)
        .map(|v| {
            Geometry::from_wire(v).map_err(|e| DecodeError::InvalidGeometry {
                reason: e.to_string(),
            })
        })
        .transpose()?;
    let spatial_relationship = map
        .lenient_str(keys::SPATIAL_RELATIONSHIP)
        .and_then(SpatialRelationship::from_literal);
    Ok(FilterParts {
        where_clause,
        geometry,
        spatial_relationship,
    })
}

// ---------------------------------------------------------------------------
// Public decoders
// ---------------------------------------------------------------------------

/// Decode the `queryParameters` payload of a row or count query.
///
/// The field-selection policy is not part of this payload; it defaults to
/// `LoadAll` here and is set by the caller from `queryFields`.
///
/// # Errors
///
/// Returns `DecodeError` if the payload is not a map, a required key
/// (`isReturnGeometry`, `maxFeatures`, `resultOffset`) is missing or
/// mistyped, `whereClause` is not a string, or `geometry` is not a
/// recognized shape.
pub fn parse_query(params: &Value) -> Result<QueryDescriptor, DecodeError> {
    let map = WireMap::new(params, "queryParameters")?;
    let filter = parse_filter(&map)?;
    Ok(QueryDescriptor {
        where_clause: filter.where_clause,
        geometry: filter.geometry,
        spatial_relationship: filter.spatial_relationship,
        max_features: map.required_i32(keys::MAX_FEATURES)?,
        result_offset: map.required_i32(keys::RESULT_OFFSET)?,
        return_geometry: map.required_bool(keys::IS_RETURN_GEOMETRY)?,
        feature_fields: QueryFeatureFields::default(),
    })
}

/// Decode the `queryFields` argument. Never fails.
#[must_use]
pub fn parse_feature_fields(value: Option<&Value>) -> QueryFeatureFields {
    QueryFeatureFields::from_literal(value.and_then(Value::as_str))
}

/// Decode the `statisticsQueryParameters` payload.
///
/// # Errors
///
/// Returns `DecodeError` if the payload is not a map, the shared filter keys
/// are malformed, a sequence element is not a map or lacks its `fieldName`,
/// or an `orderByFields` entry has a sort order other than `ASCENDING` or
/// `DESCENDING`. Unrecognized statistic types are not errors; they resolve
/// to `Sum`.
pub fn parse_statistics(params: &Value) -> Result<AggregationDescriptor, DecodeError> {
    let map = WireMap::new(params, "statisticsQueryParameters")?;
    let filter = parse_filter(&map)?;

    let group_by_field_names = map
        .lenient_array(keys::GROUP_BY_FIELD_NAMES)
        .iter()
        .map(|v| {
            v.as_str()
                .map(str::to_string)
                .ok_or_else(|| wrong_type(keys::GROUP_BY_FIELD_NAMES, "a sequence of strings"))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let statistic_definitions = map
        .lenient_array(keys::STATISTIC_DEFINITIONS)
        .iter()
        .map(|v| -> Result<StatisticDefinition, DecodeError> {
            let def = WireMap::new(v, keys::STATISTIC_DEFINITIONS)?;
            Ok(StatisticDefinition {
                field_name: def.required_str(keys::FIELD_NAME)?.to_string(),
                statistic_type: StatisticType::from_literal_or_sum(
                    def.lenient_str(keys::STATISTIC_TYPE),
                ),
                output_alias: def.optional_str(keys::OUTPUT_ALIAS)?.map(str::to_string),
            })
        })
        .collect::<Result<Vec<_>, DecodeError>>()?;

    let order_by_fields = map
        .lenient_array(keys::ORDER_BY_FIELDS)
        .iter()
        .map(|v| -> Result<OrderBy, DecodeError> {
            let entry = WireMap::new(v, keys::ORDER_BY_FIELDS)?;
            let field_name = entry.required_str(keys::FIELD_NAME)?.to_string();
            let raw = entry.get(keys::SORT_ORDER);
            let sort_order = raw
                .and_then(Value::as_str)
                .and_then(SortOrder::from_literal)
                .ok_or_else(|| DecodeError::InvalidSortOrder {
                    value: raw.map_or_else(|| "null".to_string(), ToString::to_string),
                })?;
            Ok(OrderBy {
                field_name,
                sort_order,
            })
        })
        .collect::<Result<Vec<_>, DecodeError>>()?;

    Ok(AggregationDescriptor {
        where_clause: filter.where_clause,
        geometry: filter.geometry,
        spatial_relationship: filter.spatial_relationship,
        group_by_field_names,
        statistic_definitions,
        order_by_fields,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
