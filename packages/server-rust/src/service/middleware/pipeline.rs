//! Pipeline composition: wraps the query service with its middleware.

use std::sync::Arc;

use tower::ServiceBuilder;

use super::metrics::{MetricsLayer, MetricsService};
use crate::service::domain::FeatureQueryService;

/// The assembled operation pipeline. Cheap to clone; each channel call
/// drives its own clone.
pub type OperationPipeline = MetricsService<Arc<FeatureQueryService>>;

/// Build the operation pipeline around the query service.
///
/// There is no timeout or load-shedding layer: timeouts belong to the
/// remote source and in-flight operations are never aborted.
#[must_use]
pub fn build_operation_pipeline(service: Arc<FeatureQueryService>) -> OperationPipeline {
    ServiceBuilder::new().layer(MetricsLayer).service(service)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
