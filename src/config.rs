use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub bridge: BridgeConfig,
}

/// Document store connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub uri: String,
    pub database: String,
    /// Optional when already embedded in the URI
    pub username: String,
    pub password: String,
    /// Database the credentials authenticate against
    pub auth_database: String,
    /// Replica / cluster set name
    pub replica_set: String,
    pub max_pool_size: u32,
    pub min_pool_size: u32,
    /// Seconds
    pub connect_timeout: u64,
    /// Seconds
    pub socket_timeout: u64,
    /// Seconds
    pub server_selection_timeout: u64,
    /// Seconds between liveness probes; values below 1 fall back to 10
    pub heartbeat_interval: i64,
    /// Milliseconds
    pub local_threshold: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Where the Bridge Gateway accepts session launches
    pub gateway_url: String,
    /// Seconds
    pub schema_fetch_timeout: u64,
    /// Seconds front ends get to drain before the store connection is closed
    pub shutdown_grace: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            uri: "postgres://localhost:5432/mcp_link".to_string(),
            database: "ominmcp".to_string(),
            username: String::new(),
            password: String::new(),
            auth_database: String::new(),
            replica_set: String::new(),
            max_pool_size: 100,
            min_pool_size: 0,
            connect_timeout: 30,
            socket_timeout: 30,
            server_selection_timeout: 30,
            heartbeat_interval: 10,
            local_threshold: 15,
        }
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            gateway_url: "http://localhost:8080/sse".to_string(),
            schema_fetch_timeout: 30,
            shutdown_grace: 5,
        }
    }
}

impl StoreConfig {
    /// Load a standalone store configuration from a JSON file.
    /// Fields missing from the file keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Config::try_from(&StoreConfig::default())?)
            .add_source(config::File::from(path.as_ref()).format(config::FileFormat::Json))
            .build()?;
        Ok(config.try_deserialize()?)
    }
}

impl AppConfig {
    /// Load configuration from environment variables and config file
    pub fn load() -> anyhow::Result<Self> {
        let mut config = config::Config::builder();

        // Add default configuration
        config = config.add_source(config::Config::try_from(&AppConfig::default())?);

        // Add config file if it exists
        config = config.add_source(config::File::with_name("config").required(false));

        // MCP_LINK_STORE__URI, MCP_LINK_BRIDGE__GATEWAY_URL, ...
        config = config.add_source(
            config::Environment::with_prefix("MCP_LINK")
                .prefix_separator("_")
                .separator("__"),
        );

        let config = config.build()?;
        let app_config: AppConfig = config.try_deserialize()?;

        Ok(app_config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_partial_store_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"uri": "memory://local", "database": "bridge", "heartbeat_interval": 0}}"#
        )
        .unwrap();

        let config = StoreConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.uri, "memory://local");
        assert_eq!(config.database, "bridge");
        assert_eq!(config.heartbeat_interval, 0);
        assert_eq!(config.max_pool_size, 100);
        assert_eq!(config.socket_timeout, 30);
    }

    #[test]
    fn test_missing_store_file_is_an_error() {
        let err = StoreConfig::from_json_file("/definitely/not/here.json").unwrap_err();
        assert!(err.to_string().contains("not found"), "{err}");
    }
}
