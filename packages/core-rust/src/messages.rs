//! Channel method names, argument keys and response envelopes.
//!
//! Method names are fixed and case-sensitive. Responses are wire maps with
//! a single top-level key per method (`features`, `count`, `results`).

use rmpv::Value;

/// Method names accepted on the service-table channel.
pub mod method_names {
    pub const QUERY_FEATURES: &str = "queryFeatures";
    pub const QUERY_FEATURE_COUNT: &str = "queryFeatureCount";
    pub const QUERY_STATISTICS: &str = "queryStatisticsAsync";
}

/// Top-level argument keys of a method call.
pub mod arg_keys {
    pub const URL: &str = "url";
    pub const QUERY_FIELDS: &str = "queryFields";
    pub const QUERY_PARAMETERS: &str = "queryParameters";
    pub const STATISTICS_QUERY_PARAMETERS: &str = "statisticsQueryParameters";
}

/// `{features: [...]}`
#[must_use]
pub fn features_response(features: Vec<Value>) -> Value {
    Value::Map(vec![(Value::from("features"), Value::Array(features))])
}

/// `{count: n}`
#[must_use]
pub fn count_response(count: u64) -> Value {
    Value::Map(vec![(Value::from("count"), Value::from(count))])
}

/// `{results: [{group, statistics}, ...]}`
#[must_use]
pub fn statistics_response(results: Vec<Value>) -> Value {
    Value::Map(vec![(Value::from("results"), Value::Array(results))])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelopes_have_single_key() {
        assert_eq!(
            count_response(42),
            Value::Map(vec![(Value::from("count"), Value::from(42))])
        );
        assert_eq!(
            features_response(vec![]),
            Value::Map(vec![(Value::from("features"), Value::Array(vec![]))])
        );
        let results = statistics_response(vec![Value::Nil]);
        assert_eq!(results.as_map().unwrap()[0].0, Value::from("results"));
    }
}
