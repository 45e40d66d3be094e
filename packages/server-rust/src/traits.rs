use std::sync::Arc;

use async_trait::async_trait;
use geobridge_core::{AggregationDescriptor, AggregationRow, FeatureRow, QueryDescriptor};

use crate::table::Endpoint;

/// Lazy, single-pass sequence of result rows. Finite and not restartable.
pub type FeatureIter = Box<dyn Iterator<Item = FeatureRow> + Send>;

/// A remote tabular/spatial data source (one feature service layer).
///
/// Implementations own the network client and the table's schema; they are
/// shared read-only between concurrent calls.
#[async_trait]
pub trait RemoteTable: Send + Sync {
    /// Run a row query. The field-selection policy travels in
    /// `query.feature_fields`.
    async fn query_features(&self, query: &QueryDescriptor) -> anyhow::Result<FeatureIter>;

    /// Count rows matching the query's filter; paging is ignored.
    async fn query_feature_count(&self, query: &QueryDescriptor) -> anyhow::Result<u64>;

    /// Run a grouped statistics query.
    async fn query_statistics(
        &self,
        query: &AggregationDescriptor,
    ) -> anyhow::Result<Vec<AggregationRow>>;
}

/// Creates table handles for endpoints. Injected into the table registry at
/// startup.
pub trait RemoteTableFactory: Send + Sync {
    /// Construct a handle for `endpoint`. Construction is cheap; schema
    /// loading happens on first use.
    fn create(&self, endpoint: &Endpoint) -> anyhow::Result<Arc<dyn RemoteTable>>;
}
