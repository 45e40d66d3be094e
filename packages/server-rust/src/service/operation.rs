//! Operation types flowing through the pipeline.

use std::time::Instant;

use geobridge_core::messages::{count_response, features_response, statistics_response};
use geobridge_core::{AggregationDescriptor, DecodeError, QueryDescriptor};
use rmpv::Value;

use crate::table::HandleCreationError;

/// Wire codes reported for each failure class.
pub mod error_codes {
    pub const MALFORMED_REQUEST: &str = "MALFORMED_REQUEST";
    pub const HANDLE_CREATION: &str = "HANDLE_CREATION";
    pub const REMOTE_QUERY: &str = "REMOTE_QUERY";
    pub const NOT_IMPLEMENTED: &str = "NOT_IMPLEMENTED";
    pub const CHANNEL_DETACHED: &str = "CHANNEL_DETACHED";
}

/// Context carried with every operation through the pipeline.
#[derive(Debug, Clone)]
pub struct OperationContext {
    pub call_id: u64,
    /// Channel method name that produced the operation.
    pub method: &'static str,
    /// Endpoint URL exactly as supplied by the caller.
    pub url: String,
    pub received_at: Instant,
}

impl OperationContext {
    #[must_use]
    pub fn new(call_id: u64, method: &'static str, url: impl Into<String>) -> Self {
        Self {
            call_id,
            method,
            url: url.into(),
            received_at: Instant::now(),
        }
    }
}

/// Typed operation variants dispatched through the pipeline.
#[derive(Debug)]
pub enum Operation {
    QueryFeatures {
        ctx: OperationContext,
        query: QueryDescriptor,
    },
    QueryFeatureCount {
        ctx: OperationContext,
        query: QueryDescriptor,
    },
    QueryStatistics {
        ctx: OperationContext,
        statistics: AggregationDescriptor,
    },
}

impl Operation {
    #[must_use]
    pub fn ctx(&self) -> &OperationContext {
        match self {
            Self::QueryFeatures { ctx, .. }
            | Self::QueryFeatureCount { ctx, .. }
            | Self::QueryStatistics { ctx, .. } => ctx,
        }
    }
}

/// Successful response from the query service. Rows are already marshalled.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationResponse {
    Features { call_id: u64, features: Vec<Value> },
    Count { call_id: u64, count: u64 },
    Statistics { call_id: u64, results: Vec<Value> },
}

impl OperationResponse {
    #[must_use]
    pub fn call_id(&self) -> u64 {
        match self {
            Self::Features { call_id, .. }
            | Self::Count { call_id, .. }
            | Self::Statistics { call_id, .. } => *call_id,
        }
    }

    /// The single-key success envelope returned to the caller.
    #[must_use]
    pub fn into_wire(self) -> Value {
        match self {
            Self::Features { features, .. } => features_response(features),
            Self::Count { count, .. } => count_response(count),
            Self::Statistics { results, .. } => statistics_response(results),
        }
    }
}

/// Errors returned while classifying or executing an operation.
#[derive(Debug, thiserror::Error)]
pub enum OperationError {
    #[error("malformed request: {0}")]
    MalformedRequest(#[from] DecodeError),
    #[error(transparent)]
    HandleCreation(#[from] HandleCreationError),
    #[error("query against `{url}` failed: {source:#}")]
    RemoteQuery {
        url: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("method `{method}` is not implemented")]
    NotImplemented { method: String },
    #[error("service table channel is detached")]
    Detached,
}

impl OperationError {
    /// Stable wire code for the failure class.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::MalformedRequest(_) => error_codes::MALFORMED_REQUEST,
            Self::HandleCreation(_) => error_codes::HANDLE_CREATION,
            Self::RemoteQuery { .. } => error_codes::REMOTE_QUERY,
            Self::NotImplemented { .. } => error_codes::NOT_IMPLEMENTED,
            Self::Detached => error_codes::CHANNEL_DETACHED,
        }
    }

    /// The endpoint involved, when the failure is tied to one.
    #[must_use]
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::HandleCreation(err) => Some(err.url.as_str()),
            Self::RemoteQuery { url, .. } => Some(url.as_str()),
            _ => None,
        }
    }
}
