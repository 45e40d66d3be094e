//! Operation classification and execution.
//!
//! 1. **Classification** (`classify`): `MethodCall` -> `Result<Operation, OperationError>`
//! 2. **Middleware** (`middleware`): tower layers (metrics)
//! 3. **Domain service** (`domain`): runs each operation on the `QueryExecutor`
//! 4. **Execution** (`executor`, `inflight`): table handles, remote calls,
//!    in-flight bookkeeping, marshalling

pub mod classify;
pub mod config;
pub mod domain;
pub mod executor;
pub mod inflight;
pub mod middleware;
pub mod operation;

// Re-export key types for convenient access.
pub use classify::OperationService;
pub use config::{BridgeConfig, LogConfig, LogFormat};
pub use domain::FeatureQueryService;
pub use executor::QueryExecutor;
pub use inflight::{InFlightGuard, InFlightRegistry, PendingOperation};
pub use middleware::{build_operation_pipeline, OperationPipeline};
pub use operation::{
    error_codes, Operation, OperationContext, OperationError, OperationResponse,
};
