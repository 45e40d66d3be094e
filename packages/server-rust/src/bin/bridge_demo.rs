//! Runs one method-channel call against a fixture-backed table and prints
//! the reply as JSON.
//!
//! ```text
//! bridge-demo --fixture fixtures/parcels.json --method queryFeatureCount \
//!     --args '{"queryParameters": {"isReturnGeometry": false, "maxFeatures": 0, "resultOffset": 0}}'
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use geobridge_server::service::{LogConfig, LogFormat};
use geobridge_server::telemetry::init_tracing;
use geobridge_server::{
    BridgeConfig, InMemoryTable, InMemoryTableFactory, MethodCall, QueryExecutor,
    ServiceTableChannel, TableRegistry,
};
use tracing::info;

/// Feature-service query bridge demo
#[derive(Parser, Debug)]
#[command(name = "bridge-demo")]
#[command(about = "Run one service_table call against a JSON fixture", long_about = None)]
struct Cli {
    /// Table fixture (JSON)
    #[arg(long = "fixture")]
    fixture: PathBuf,

    /// URL the fixture is registered under
    #[arg(long = "url", default_value = "https://demo.local/FeatureServer/0")]
    url: String,

    /// Method name (queryFeatures, queryFeatureCount, queryStatisticsAsync)
    #[arg(long = "method")]
    method: String,

    /// Call arguments as a JSON object; `url` defaults to --url
    #[arg(long = "args", default_value = "{}")]
    args: String,

    /// Log output format (pretty or json)
    #[arg(long = "log-format", env = "GEOBRIDGE_LOG_FORMAT", default_value = "pretty")]
    log_format: LogFormat,

    /// Tracing filter directives
    #[arg(long = "log-filter", env = "GEOBRIDGE_LOG", default_value = "warn")]
    log_filter: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = BridgeConfig {
        log: LogConfig {
            format: cli.log_format,
            filter: cli.log_filter.clone(),
        },
        ..BridgeConfig::default()
    };
    init_tracing(&config.log)?;

    let table = InMemoryTable::from_path(&cli.fixture)?;
    info!(
        fixture = %cli.fixture.display(),
        table = %table.schema().table_name,
        url = %cli.url,
        "fixture loaded"
    );
    let factory = InMemoryTableFactory::new();
    factory.register(cli.url.clone(), table);

    let executor = Arc::new(QueryExecutor::new(Arc::new(TableRegistry::new(Arc::new(
        factory,
    )))));
    let channel =
        ServiceTableChannel::attach(&config, executor, tokio::runtime::Handle::current());

    let mut args: serde_json::Value =
        serde_json::from_str(&cli.args).context("--args must be a JSON object")?;
    let object = args
        .as_object_mut()
        .context("--args must be a JSON object")?;
    object
        .entry("url")
        .or_insert_with(|| serde_json::Value::String(cli.url.clone()));
    let arguments = rmpv::ext::to_value(&args).context("cannot convert --args")?;

    let result = channel.call(MethodCall::new(cli.method, arguments)).await;
    channel.detach();

    let output = match result {
        Ok(value) => serde_json::json!({
            "status": "success",
            "result": serde_json::to_value(&value)?,
        }),
        Err(err) => serde_json::json!({
            "status": "error",
            "code": err.code,
            "message": err.message,
            "details": serde_json::to_value(&err.details)?,
        }),
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
