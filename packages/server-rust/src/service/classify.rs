//! Method classification: converts a channel `MethodCall` into a typed
//! `Operation`.
//!
//! All request decoding happens here, before any remote work is issued.

use std::sync::atomic::{AtomicU64, Ordering};

use geobridge_core::decode::WireMap;
use geobridge_core::messages::{arg_keys, method_names};
use geobridge_core::{parse_feature_fields, parse_query, parse_statistics, DecodeError};
use rmpv::Value;

use super::operation::{Operation, OperationContext, OperationError};
use crate::channel::MethodCall;

// ---------------------------------------------------------------------------
// OperationService
// ---------------------------------------------------------------------------

/// Classifies incoming method calls into typed `Operation` variants, giving
/// each a unique, monotonically increasing call id.
#[derive(Debug)]
pub struct OperationService {
    call_id_counter: AtomicU64,
}

impl Default for OperationService {
    fn default() -> Self {
        Self::new()
    }
}

impl OperationService {
    #[must_use]
    pub fn new() -> Self {
        Self {
            call_id_counter: AtomicU64::new(1),
        }
    }

    fn next_call_id(&self) -> u64 {
        self.call_id_counter.fetch_add(1, Ordering::Relaxed)
    }

    fn make_ctx(
        &self,
        method: &'static str,
        args: &WireMap<'_>,
    ) -> Result<OperationContext, DecodeError> {
        let url = args.required_str(arg_keys::URL)?;
        Ok(OperationContext::new(self.next_call_id(), method, url))
    }

    /// Classify a method call.
    ///
    /// # Errors
    ///
    /// - `OperationError::NotImplemented` for an unrecognized method name
    /// - `OperationError::MalformedRequest` if the arguments are not a map,
    ///   `url` is missing or not a string, or the query payload fails to
    ///   decode
    pub fn classify(&self, call: MethodCall) -> Result<Operation, OperationError> {
        let MethodCall { method, arguments } = call;
        match method.as_str() {
            method_names::QUERY_FEATURES => {
                let args = WireMap::new(&arguments, "arguments")?;
                let mut query = parse_query(required(&args, arg_keys::QUERY_PARAMETERS)?)?;
                query.feature_fields = parse_feature_fields(args.get(arg_keys::QUERY_FIELDS));
                let ctx = self.make_ctx(method_names::QUERY_FEATURES, &args)?;
                Ok(Operation::QueryFeatures { ctx, query })
            }
            method_names::QUERY_FEATURE_COUNT => {
                let args = WireMap::new(&arguments, "arguments")?;
                let query = parse_query(required(&args, arg_keys::QUERY_PARAMETERS)?)?;
                let ctx = self.make_ctx(method_names::QUERY_FEATURE_COUNT, &args)?;
                Ok(Operation::QueryFeatureCount { ctx, query })
            }
            method_names::QUERY_STATISTICS => {
                let args = WireMap::new(&arguments, "arguments")?;
                let statistics =
                    parse_statistics(required(&args, arg_keys::STATISTICS_QUERY_PARAMETERS)?)?;
                let ctx = self.make_ctx(method_names::QUERY_STATISTICS, &args)?;
                Ok(Operation::QueryStatistics { ctx, statistics })
            }
            _ => Err(OperationError::NotImplemented { method }),
        }
    }
}

fn required<'a>(args: &WireMap<'a>, key: &str) -> Result<&'a Value, DecodeError> {
    args.get(key).ok_or_else(|| DecodeError::MissingKey {
        key: key.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use geobridge_core::{QueryFeatureFields, StatisticType};

    use super::*;

    fn map(entries: Vec<(&str, Value)>) -> Value {
        Value::Map(
            entries
                .into_iter()
                .map(|(k, v)| (Value::from(k), v))
                .collect(),
        )
    }

    fn query_params() -> Value {
        map(vec![
            ("isReturnGeometry", Value::from(false)),
            ("maxFeatures", Value::from(0)),
            ("resultOffset", Value::from(0)),
        ])
    }

    fn call(method: &str, arguments: Value) -> MethodCall {
        MethodCall::new(method, arguments)
    }

    #[test]
    fn query_features_takes_field_policy_from_sibling_argument() {
        let svc = OperationService::new();
        let op = svc
            .classify(call(
                "queryFeatures",
                map(vec![
                    ("url", Value::from("https://svc/0")),
                    ("queryFields", Value::from("IDS_ONLY")),
                    ("queryParameters", query_params()),
                ]),
            ))
            .unwrap();
        let Operation::QueryFeatures { ctx, query } = op else {
            panic!("expected QueryFeatures");
        };
        assert_eq!(ctx.url, "https://svc/0");
        assert_eq!(ctx.method, "queryFeatures");
        assert_eq!(query.feature_fields, QueryFeatureFields::IdsOnly);
    }

    #[test]
    fn absent_field_policy_loads_all() {
        let svc = OperationService::new();
        let op = svc
            .classify(call(
                "queryFeatures",
                map(vec![
                    ("url", Value::from("https://svc/0")),
                    ("queryParameters", query_params()),
                ]),
            ))
            .unwrap();
        assert!(matches!(
            op,
            Operation::QueryFeatures { query, .. } if query.feature_fields == QueryFeatureFields::LoadAll
        ));
    }

    #[test]
    fn call_ids_increase() {
        let svc = OperationService::new();
        let args = map(vec![
            ("url", Value::from("https://svc/0")),
            ("queryParameters", query_params()),
        ]);
        let a = svc.classify(call("queryFeatureCount", args.clone())).unwrap();
        let b = svc.classify(call("queryFeatureCount", args)).unwrap();
        assert!(b.ctx().call_id > a.ctx().call_id);
    }

    #[test]
    fn statistics_call_decodes_lenient_statistic_type() {
        let svc = OperationService::new();
        let params = map(vec![(
            "statisticDefinitions",
            Value::Array(vec![map(vec![
                ("fieldName", Value::from("POP")),
                ("statisticType", Value::from("BOGUS")),
                ("outputAlias", Value::from("p")),
            ])]),
        )]);
        let op = svc
            .classify(call(
                "queryStatisticsAsync",
                map(vec![
                    ("url", Value::from("https://svc/0")),
                    ("statisticsQueryParameters", params),
                ]),
            ))
            .unwrap();
        let Operation::QueryStatistics { statistics, .. } = op else {
            panic!("expected QueryStatistics");
        };
        assert_eq!(
            statistics.statistic_definitions[0].statistic_type,
            StatisticType::Sum
        );
    }

    #[test]
    fn unknown_method_is_not_implemented() {
        let svc = OperationService::new();
        let err = svc.classify(call("deleteFeatures", Value::Nil)).unwrap_err();
        assert!(matches!(err, OperationError::NotImplemented { ref method } if method == "deleteFeatures"));
        // Method names are case-sensitive.
        let err = svc.classify(call("QueryFeatures", Value::Nil)).unwrap_err();
        assert_eq!(err.code(), "NOT_IMPLEMENTED");
    }

    #[test]
    fn malformed_arguments_are_rejected() {
        let svc = OperationService::new();

        let err = svc.classify(call("queryFeatureCount", Value::Nil)).unwrap_err();
        assert_eq!(err.code(), "MALFORMED_REQUEST");

        let err = svc
            .classify(call(
                "queryFeatureCount",
                map(vec![("queryParameters", query_params())]),
            ))
            .unwrap_err();
        assert_eq!(err.code(), "MALFORMED_REQUEST");

        let err = svc
            .classify(call(
                "queryFeatureCount",
                map(vec![
                    ("url", Value::from(7)),
                    ("queryParameters", query_params()),
                ]),
            ))
            .unwrap_err();
        assert_eq!(err.code(), "MALFORMED_REQUEST");

        let err = svc
            .classify(call(
                "queryFeatureCount",
                map(vec![("url", Value::from("https://svc/0"))]),
            ))
            .unwrap_err();
        assert!(matches!(
            err,
            OperationError::MalformedRequest(DecodeError::MissingKey { ref key }) if key == "queryParameters"
        ));
    }

    #[test]
    fn strict_sort_order_fails_classification() {
        let svc = OperationService::new();
        let params = map(vec![(
            "orderByFields",
            Value::Array(vec![map(vec![
                ("fieldName", Value::from("POP")),
                ("sortOrder", Value::from("UP")),
            ])]),
        )]);
        let err = svc
            .classify(call(
                "queryStatisticsAsync",
                map(vec![
                    ("url", Value::from("https://svc/0")),
                    ("statisticsQueryParameters", params),
                ]),
            ))
            .unwrap_err();
        assert!(matches!(
            err,
            OperationError::MalformedRequest(DecodeError::InvalidSortOrder { .. })
        ));
    }
}
