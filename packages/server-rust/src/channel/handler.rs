//! Method-channel handler.
//!
//! Every call is answered exactly once on its own single-shot channel.
//! Classification runs synchronously inside [`ServiceTableChannel::invoke`],
//! so malformed requests fail before any remote work is scheduled; accepted
//! calls run on a spawned task.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use bytes::Bytes;
use rmpv::Value;
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tower::ServiceExt;
use tracing::{debug, info, warn};

use super::codec::{self, CodecError};
use crate::service::{
    build_operation_pipeline, BridgeConfig, FeatureQueryService, InFlightRegistry,
    OperationError, OperationPipeline, OperationResponse, OperationService, QueryExecutor,
};

// ---------------------------------------------------------------------------
// Call and result types
// ---------------------------------------------------------------------------

/// One incoming call: a method name and its argument map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCall {
    pub method: String,
    pub arguments: Value,
}

impl MethodCall {
    #[must_use]
    pub fn new(method: impl Into<String>, arguments: Value) -> Self {
        Self {
            method: method.into(),
            arguments,
        }
    }
}

/// Structured failure delivered to the caller.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct ChannelError {
    pub code: String,
    pub message: String,
    /// `{url}` for failures tied to an endpoint.
    pub details: Option<Value>,
}

impl ChannelError {
    /// The reply sender was dropped without an answer (the task panicked).
    fn reply_dropped() -> Self {
        Self {
            code: "INTERNAL".to_string(),
            message: "call task ended without a reply".to_string(),
            details: None,
        }
    }
}

impl From<OperationError> for ChannelError {
    fn from(err: OperationError) -> Self {
        Self {
            code: err.code().to_string(),
            message: err.to_string(),
            details: err
                .url()
                .map(|url| Value::Map(vec![(Value::from("url"), Value::from(url))])),
        }
    }
}

/// Outcome of one call: the success envelope or a structured failure.
pub type MethodResult = Result<Value, ChannelError>;

// ---------------------------------------------------------------------------
// ServiceTableChannel
// ---------------------------------------------------------------------------

struct Dispatcher {
    classifier: OperationService,
    pipeline: OperationPipeline,
    in_flight: Arc<InFlightRegistry>,
}

/// Handler bound to the service-table channel.
///
/// Attached on construction; [`detach`](Self::detach) stops accepting new
/// calls but leaves outstanding operations running to completion.
pub struct ServiceTableChannel {
    name: String,
    runtime: Handle,
    dispatcher: ArcSwapOption<Dispatcher>,
}

impl ServiceTableChannel {
    /// Attach a handler that executes calls on `runtime`.
    #[must_use]
    pub fn attach(config: &BridgeConfig, executor: Arc<QueryExecutor>, runtime: Handle) -> Self {
        let in_flight = Arc::clone(executor.in_flight());
        let pipeline = build_operation_pipeline(Arc::new(FeatureQueryService::new(executor)));
        info!(channel = %config.channel_name, "service table channel attached");
        Self {
            name: config.channel_name.clone(),
            runtime,
            dispatcher: ArcSwapOption::from_pointee(Dispatcher {
                classifier: OperationService::new(),
                pipeline,
                in_flight,
            }),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.dispatcher.load().is_some()
    }

    /// Schedule a call and return the receiver its single reply arrives on.
    ///
    /// Returns immediately. Detached channels and malformed requests are
    /// answered before this returns.
    pub fn invoke(&self, call: MethodCall) -> oneshot::Receiver<MethodResult> {
        let (tx, rx) = oneshot::channel();

        let Some(dispatcher) = self.dispatcher.load_full() else {
            // Ignore send errors -- the caller may have dropped the receiver
            let _ = tx.send(Err(OperationError::Detached.into()));
            return rx;
        };

        let op = match dispatcher.classifier.classify(call) {
            Ok(op) => op,
            Err(err) => {
                debug!(code = err.code(), error = %err, "call rejected");
                let _ = tx.send(Err(err.into()));
                return rx;
            }
        };

        let pipeline = dispatcher.pipeline.clone();
        self.runtime.spawn(async move {
            let result = pipeline
                .oneshot(op)
                .await
                .map(OperationResponse::into_wire)
                .map_err(ChannelError::from);
            let _ = tx.send(result);
        });
        rx
    }

    /// Invoke and await the reply.
    pub async fn call(&self, call: MethodCall) -> MethodResult {
        self.invoke(call)
            .await
            .unwrap_or_else(|_| Err(ChannelError::reply_dropped()))
    }

    /// Decode a call frame, run it, and encode the reply frame.
    ///
    /// # Errors
    ///
    /// Returns `CodecError` if the incoming frame does not decode or the
    /// reply cannot be encoded. Call failures are encoded as error frames.
    pub async fn call_frame(&self, frame: &[u8]) -> Result<Bytes, CodecError> {
        let call = codec::decode_call(frame)?;
        let result = self.call(call).await;
        codec::encode_result(&result)
    }

    /// Stop accepting calls. Outstanding operations are not aborted; they
    /// finish and reply to their callers.
    pub fn detach(&self) {
        let Some(dispatcher) = self.dispatcher.swap(None) else {
            return;
        };
        let outstanding = dispatcher.in_flight.len();
        if outstanding > 0 {
            warn!(
                channel = %self.name,
                outstanding,
                "service table channel detached with operations still in flight"
            );
        } else {
            info!(channel = %self.name, "service table channel detached");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
