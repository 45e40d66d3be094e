//! Strongly typed query and statistics descriptors.
//!
//! Produced by [`crate::decode`] from the untyped wire payload and handed
//! to a remote table unchanged.

use crate::geometry::Geometry;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Named topological relationship used to filter rows by geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpatialRelationship {
    Unknown,
    Relate,
    Equals,
    Disjoint,
    Intersects,
    Touches,
    Crosses,
    Within,
    Contains,
    Overlaps,
    EnvelopeIntersects,
    IndexIntersects,
}

impl SpatialRelationship {
    /// Resolve a wire literal. Unrecognized literals mean "no predicate",
    /// which is distinct from an explicit `UNKNOWN`.
    #[must_use]
    pub fn from_literal(literal: &str) -> Option<Self> {
        Some(match literal {
            "UNKNOWN" => Self::Unknown,
            "RELATE" => Self::Relate,
            "EQUALS" => Self::Equals,
            "DISJOINT" => Self::Disjoint,
            "INTERSECTS" => Self::Intersects,
            "TOUCHES" => Self::Touches,
            "CROSSES" => Self::Crosses,
            "WITHIN" => Self::Within,
            "CONTAINS" => Self::Contains,
            "OVERLAPS" => Self::Overlaps,
            "ENVELOPE_INTERSECTS" => Self::EnvelopeIntersects,
            "INDEX_INTERSECTS" => Self::IndexIntersects,
            _ => return None,
        })
    }
}

/// Reducible computation applied to a field across grouped rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatisticType {
    Average,
    Count,
    Maximum,
    Minimum,
    StandardDeviation,
    Sum,
    Variance,
}

impl StatisticType {
    /// Resolve a wire literal. Anything unrecognized (including a missing
    /// literal) falls back to `Sum` rather than failing.
    #[must_use]
    pub fn from_literal_or_sum(literal: Option<&str>) -> Self {
        match literal {
            Some("AVERAGE") => Self::Average,
            Some("COUNT") => Self::Count,
            Some("MAXIMUM") => Self::Maximum,
            Some("MINIMUM") => Self::Minimum,
            Some("STANDARD_DEVIATION") => Self::StandardDeviation,
            Some("VARIANCE") => Self::Variance,
            _ => Self::Sum,
        }
    }

    /// Upper-case literal, used for default output aliases.
    #[must_use]
    pub fn literal(self) -> &'static str {
        match self {
            Self::Average => "AVERAGE",
            Self::Count => "COUNT",
            Self::Maximum => "MAXIMUM",
            Self::Minimum => "MINIMUM",
            Self::StandardDeviation => "STANDARD_DEVIATION",
            Self::Sum => "SUM",
            Self::Variance => "VARIANCE",
        }
    }
}

/// Sort direction for statistics ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    /// Strict: only the two exact literals are accepted.
    #[must_use]
    pub fn from_literal(literal: &str) -> Option<Self> {
        match literal {
            "ASCENDING" => Some(Self::Ascending),
            "DESCENDING" => Some(Self::Descending),
            _ => None,
        }
    }
}

/// How much of each row a feature query loads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum QueryFeatureFields {
    IdsOnly,
    Minimum,
    #[default]
    LoadAll,
}

impl QueryFeatureFields {
    /// Exactly `IDS_ONLY`, `MINIMUM` or `LOAD_ALL`; anything else, including
    /// an absent value, is `LoadAll`.
    #[must_use]
    pub fn from_literal(literal: Option<&str>) -> Self {
        match literal {
            Some("IDS_ONLY") => Self::IdsOnly,
            Some("MINIMUM") => Self::Minimum,
            _ => Self::LoadAll,
        }
    }
}

// ---------------------------------------------------------------------------
// Descriptors
// ---------------------------------------------------------------------------

/// Row query against a remote table (also used for counts).
#[derive(Debug, Clone, PartialEq)]
pub struct QueryDescriptor {
    pub where_clause: Option<String>,
    pub geometry: Option<Geometry>,
    /// `None` means no spatial predicate is applied.
    pub spatial_relationship: Option<SpatialRelationship>,
    pub max_features: i32,
    pub result_offset: i32,
    pub return_geometry: bool,
    /// Decoded from the sibling `queryFields` argument; only row queries use it.
    pub feature_fields: QueryFeatureFields,
}

/// One aggregate: `statistic_type(field_name) AS output_alias`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatisticDefinition {
    pub field_name: String,
    pub statistic_type: StatisticType,
    pub output_alias: Option<String>,
}

impl StatisticDefinition {
    /// Alias the result is reported under.
    #[must_use]
    pub fn resolved_alias(&self) -> String {
        match &self.output_alias {
            Some(alias) if !alias.is_empty() => alias.clone(),
            _ => format!(
                "{}_{}",
                self.field_name,
                self.statistic_type.literal().to_lowercase()
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field_name: String,
    pub sort_order: SortOrder,
}

/// Grouped statistics query against a remote table.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationDescriptor {
    pub where_clause: Option<String>,
    pub geometry: Option<Geometry>,
    pub spatial_relationship: Option<SpatialRelationship>,
    pub group_by_field_names: Vec<String>,
    pub statistic_definitions: Vec<StatisticDefinition>,
    pub order_by_fields: Vec<OrderBy>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_spatial_literal_is_distinct_from_unrecognized() {
        assert_eq!(
            SpatialRelationship::from_literal("UNKNOWN"),
            Some(SpatialRelationship::Unknown)
        );
        assert_eq!(SpatialRelationship::from_literal("intersects"), None);
        assert_eq!(
            SpatialRelationship::from_literal("TOUCHES"),
            Some(SpatialRelationship::Touches)
        );
    }

    #[test]
    fn statistic_fallback_is_sum() {
        assert_eq!(StatisticType::from_literal_or_sum(None), StatisticType::Sum);
        assert_eq!(
            StatisticType::from_literal_or_sum(Some("MEDIAN")),
            StatisticType::Sum
        );
        assert_eq!(
            StatisticType::from_literal_or_sum(Some("VARIANCE")),
            StatisticType::Variance
        );
    }

    #[test]
    fn feature_fields_default_to_load_all() {
        assert_eq!(
            QueryFeatureFields::from_literal(Some("IDS_ONLY")),
            QueryFeatureFields::IdsOnly
        );
        assert_eq!(
            QueryFeatureFields::from_literal(Some("ids_only")),
            QueryFeatureFields::LoadAll
        );
        assert_eq!(QueryFeatureFields::from_literal(None), QueryFeatureFields::LoadAll);
    }

    #[test]
    fn default_alias_uses_field_and_statistic() {
        let def = StatisticDefinition {
            field_name: "POP".to_string(),
            statistic_type: StatisticType::Average,
            output_alias: None,
        };
        assert_eq!(def.resolved_alias(), "POP_average");
    }
}
