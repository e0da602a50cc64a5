use mcp_link_store::config::AppConfig;
use mcp_link_store::store::SHUTDOWN_CLOSE_TIMEOUT;
use mcp_link_store::{connect_default, ClientRegistry, Services};
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    use env_logger::Builder;
    use log::LevelFilter;

    Builder::new()
        .filter_level(LevelFilter::Info)
        .filter_module("sqlx", LevelFilter::Warn)
        .parse_default_env()
        .init();

    let config = AppConfig::load()?;
    log::info!(
        "Configuration loaded: store={} database={}",
        mcp_link_store::store::redact_uri(&config.store.uri),
        config.store.database
    );

    let (registry, manager) = connect_default(&config).await?;
    let services = Services::new(manager, &config.bridge);

    // With a stream config id, print its gateway launch URL and exit
    if let Some(config_id) = std::env::args().nth(1) {
        let launch = services.tokens.build(&config_id).await?;
        println!("{}", launch.launch_url(&config.bridge.gateway_url)?);
        registry.close_default().await?;
        return Ok(());
    }

    let stream_configs = services.stream_configs.list().await?;
    log::info!(
        "Serving {} stream config(s); waiting for shutdown signal",
        stream_configs.len()
    );

    let mut shutdown = registry.subscribe_shutdown();
    while !*shutdown.borrow_and_update() {
        if shutdown.changed().await.is_err() {
            break;
        }
    }
    drop(shutdown);

    // Let the hook finish closing the store
    let limit = Duration::from_secs(config.bridge.shutdown_grace) + SHUTDOWN_CLOSE_TIMEOUT;
    let closed = tokio::time::timeout(limit, async {
        while manager_connected(&registry).await {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await;
    if closed.is_err() {
        log::warn!("Document store still connected after {:?}", limit);
    }
    log::info!("Shut down");
    Ok(())
}

async fn manager_connected(registry: &ClientRegistry) -> bool {
    match registry.get_default().await {
        Ok(manager) => manager.is_connected().await,
        Err(_) => false,
    }
}
