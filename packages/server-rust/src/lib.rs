//! `geobridge` server: the asynchronous side of the feature-service query
//! bridge. Table handle cache, query execution, the operation pipeline and
//! the `service_table` method channel.

pub mod channel;
pub mod service;
pub mod table;
pub mod telemetry;
pub mod traits;

pub use channel::{ChannelError, MethodCall, MethodResult, ServiceTableChannel};
pub use service::{BridgeConfig, OperationError, QueryExecutor};
pub use table::{Endpoint, HandleCreationError, InMemoryTable, InMemoryTableFactory, TableRegistry};
pub use traits::{FeatureIter, RemoteTable, RemoteTableFactory};
