//! Feature query domain service.
//!
//! Implements `tower::Service<Operation>` for `Arc<FeatureQueryService>` so
//! the pipeline can clone it cheaply per call.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tower::Service;

use super::executor::QueryExecutor;
use super::operation::{Operation, OperationError, OperationResponse};

/// Drives the `QueryExecutor` for each classified operation.
pub struct FeatureQueryService {
    executor: Arc<QueryExecutor>,
}

impl FeatureQueryService {
    #[must_use]
    pub fn new(executor: Arc<QueryExecutor>) -> Self {
        Self { executor }
    }

    #[must_use]
    pub fn executor(&self) -> &Arc<QueryExecutor> {
        &self.executor
    }

    async fn execute(&self, op: Operation) -> Result<OperationResponse, OperationError> {
        match op {
            Operation::QueryFeatures { ctx, query } => {
                let features = self.executor.query_features(&ctx.url, &query).await?;
                Ok(OperationResponse::Features {
                    call_id: ctx.call_id,
                    features,
                })
            }
            Operation::QueryFeatureCount { ctx, query } => {
                let count = self.executor.query_feature_count(&ctx.url, &query).await?;
                Ok(OperationResponse::Count {
                    call_id: ctx.call_id,
                    count,
                })
            }
            Operation::QueryStatistics { ctx, statistics } => {
                let results = self.executor.query_statistics(&ctx.url, &statistics).await?;
                Ok(OperationResponse::Statistics {
                    call_id: ctx.call_id,
                    results,
                })
            }
        }
    }
}

impl Service<Operation> for Arc<FeatureQueryService> {
    type Response = OperationResponse;
    type Error = OperationError;
    type Future = Pin<Box<dyn Future<Output = Result<OperationResponse, OperationError>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, op: Operation) -> Self::Future {
        let svc = Arc::clone(self);
        Box::pin(async move { svc.execute(op).await })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
