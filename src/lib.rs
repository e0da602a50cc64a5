pub mod config;
pub mod error;
pub mod logic;
pub mod model;
pub mod store;

pub use error::{Error, Result};

// Export service types
pub use logic::{
    ApiServerConfigService, BridgeLaunch, BridgePayload, BridgeTokenBuilder, SchemaFetcher,
    StreamConfigService,
};

// Export all model types
pub use model::*;

// Export store types
pub use store::{
    connector_for_uri, ApiServerConfigRepository, ClientRegistry, ConnectionManager,
    DatabaseView, Repository, StreamConfigRepository,
};

use std::sync::Arc;

/// The services wired over one connection manager.
#[derive(Debug, Clone)]
pub struct Services {
    pub api_server_configs: ApiServerConfigService,
    pub stream_configs: StreamConfigService,
    pub tokens: BridgeTokenBuilder,
}

impl Services {
    pub fn new(manager: Arc<ConnectionManager>, bridge: &config::BridgeConfig) -> Self {
        let api_repo = ApiServerConfigRepository::new(manager.clone());
        let stream_repo = StreamConfigRepository::new(manager);

        Self {
            api_server_configs: ApiServerConfigService::new(api_repo.clone(), stream_repo.clone()),
            stream_configs: StreamConfigService::new(stream_repo.clone(), api_repo),
            tokens: BridgeTokenBuilder::new(
                stream_repo,
                SchemaFetcher::from_secs(bridge.schema_fetch_timeout),
            ),
        }
    }
}

/// Bring up the default connection from loaded configuration.
pub async fn connect_default(
    config: &config::AppConfig,
) -> anyhow::Result<(Arc<ClientRegistry>, Arc<ConnectionManager>)> {
    let connector = connector_for_uri(&config.store.uri)?;
    let registry = Arc::new(ClientRegistry::new(connector));
    let grace = std::time::Duration::from_secs(config.bridge.shutdown_grace);
    let manager = registry.init_default_once(config.store.clone(), grace).await?;
    Ok((registry, manager))
}
