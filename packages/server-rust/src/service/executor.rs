//! Query execution against cached table handles.

use std::sync::Arc;

use geobridge_core::messages::method_names;
use geobridge_core::{
    to_wire_aggregation, to_wire_row, AggregationDescriptor, FeatureRow, QueryDescriptor,
};
use rmpv::Value;
use tracing::{debug, warn};

use super::inflight::InFlightRegistry;
use super::operation::OperationError;
use crate::table::TableRegistry;

/// Runs the three query kinds: resolve the handle, track the pending
/// operation, await the remote source, marshal the result.
pub struct QueryExecutor {
    tables: Arc<TableRegistry>,
    in_flight: Arc<InFlightRegistry>,
}

impl QueryExecutor {
    #[must_use]
    pub fn new(tables: Arc<TableRegistry>) -> Self {
        Self::with_in_flight(tables, Arc::new(InFlightRegistry::new()))
    }

    #[must_use]
    pub fn with_in_flight(tables: Arc<TableRegistry>, in_flight: Arc<InFlightRegistry>) -> Self {
        Self { tables, in_flight }
    }

    #[must_use]
    pub fn tables(&self) -> &Arc<TableRegistry> {
        &self.tables
    }

    #[must_use]
    pub fn in_flight(&self) -> &Arc<InFlightRegistry> {
        &self.in_flight
    }

    /// Fetch rows and marshal them. The remote sequence is drained in full
    /// before any row is marshalled.
    ///
    /// # Errors
    ///
    /// `HandleCreation` for an unusable URL, `RemoteQuery` for any failure
    /// reported by the remote source.
    pub async fn query_features(
        &self,
        url: &str,
        query: &QueryDescriptor,
    ) -> Result<Vec<Value>, OperationError> {
        let handle = self.tables.get_or_create(url)?;
        let rows: Vec<FeatureRow> = {
            let _pending = self.in_flight.track(method_names::QUERY_FEATURES, url);
            handle
                .table()
                .query_features(query)
                .await
                .map_err(|e| remote_failure(url, e))?
                .collect()
        };
        debug!(url, rows = rows.len(), "feature query complete");
        Ok(rows.iter().map(to_wire_row).collect())
    }

    /// # Errors
    ///
    /// See [`QueryExecutor::query_features`].
    pub async fn query_feature_count(
        &self,
        url: &str,
        query: &QueryDescriptor,
    ) -> Result<u64, OperationError> {
        let handle = self.tables.get_or_create(url)?;
        let _pending = self.in_flight.track(method_names::QUERY_FEATURE_COUNT, url);
        handle
            .table()
            .query_feature_count(query)
            .await
            .map_err(|e| remote_failure(url, e))
    }

    /// # Errors
    ///
    /// See [`QueryExecutor::query_features`].
    pub async fn query_statistics(
        &self,
        url: &str,
        statistics: &AggregationDescriptor,
    ) -> Result<Vec<Value>, OperationError> {
        let handle = self.tables.get_or_create(url)?;
        let rows = {
            let _pending = self.in_flight.track(method_names::QUERY_STATISTICS, url);
            handle
                .table()
                .query_statistics(statistics)
                .await
                .map_err(|e| remote_failure(url, e))?
        };
        Ok(rows.iter().map(to_wire_aggregation).collect())
    }
}

fn remote_failure(url: &str, source: anyhow::Error) -> OperationError {
    warn!(url, error = %format!("{source:#}"), "remote query failed");
    OperationError::RemoteQuery {
        url: url.to_string(),
        source,
    }
}
