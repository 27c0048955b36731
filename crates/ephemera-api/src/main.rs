use ephemera_api::setup::{initialize_app, server::start_server, App};
use ephemera_core::Config;
use ephemera_infra::init_telemetry;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = Config::from_env()?;

    init_telemetry(config.log_format)
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    tracing::info!(
        environment = %config.environment,
        "Starting Ephemera"
    );

    let App {
        router, sweeper, ..
    } = initialize_app(config.clone()).await?;

    let cancel = CancellationToken::new();
    let sweeper_handle = sweeper.start(cancel.clone());

    let result = start_server(&config, router).await;

    cancel.cancel();
    if tokio::time::timeout(Duration::from_secs(30), sweeper_handle)
        .await
        .is_err()
    {
        tracing::warn!("Expiry sweeper did not stop within 30s");
    }

    result
}
