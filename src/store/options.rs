use std::time::Duration;

use crate::config::StoreConfig;

/// Heartbeat used when the configured interval is zero or negative.
pub const DEFAULT_HEARTBEAT_SECS: u64 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub auth_database: Option<String>,
}

/// Driver-facing connection options derived from a [`StoreConfig`].
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectOptions {
    pub uri: String,
    pub credentials: Option<Credentials>,
    pub replica_set: Option<String>,
    pub max_pool_size: u32,
    pub min_pool_size: u32,
    /// `None` means no deadline
    pub connect_timeout: Option<Duration>,
    pub socket_timeout: Option<Duration>,
    pub server_selection_timeout: Option<Duration>,
    pub heartbeat_interval: Duration,
    pub local_threshold: Duration,
}

fn seconds(value: u64) -> Option<Duration> {
    (value > 0).then(|| Duration::from_secs(value))
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

impl ConnectOptions {
    pub fn from_config(config: &StoreConfig) -> Self {
        // tokio's interval panics on a zero period, so never hand one to the monitor
        let heartbeat = if config.heartbeat_interval <= 0 {
            DEFAULT_HEARTBEAT_SECS
        } else {
            config.heartbeat_interval as u64
        };

        let credentials = (!config.username.is_empty() && !config.password.is_empty()).then(|| {
            Credentials {
                username: config.username.clone(),
                password: config.password.clone(),
                auth_database: non_empty(&config.auth_database),
            }
        });

        Self {
            uri: config.uri.clone(),
            credentials,
            replica_set: non_empty(&config.replica_set),
            max_pool_size: config.max_pool_size,
            min_pool_size: config.min_pool_size,
            connect_timeout: seconds(config.connect_timeout),
            socket_timeout: seconds(config.socket_timeout),
            server_selection_timeout: seconds(config.server_selection_timeout),
            heartbeat_interval: Duration::from_secs(heartbeat),
            local_threshold: Duration::from_millis(config.local_threshold),
        }
    }

    /// URI with any inline password masked, safe for logs.
    pub fn redacted_uri(&self) -> String {
        redact_uri(&self.uri)
    }
}

/// Mask the userinfo password and any `password` query parameter.
/// Unparseable input is masked entirely.
pub fn redact_uri(uri: &str) -> String {
    let Ok(mut url) = reqwest::Url::parse(uri) else {
        return "***".to_string();
    };
    if url.password().is_some() {
        let _ = url.set_password(Some("***"));
    }

    let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    if pairs.iter().any(|(key, _)| key.eq_ignore_ascii_case("password")) {
        url.query_pairs_mut().clear().extend_pairs(pairs.iter().map(|(key, value)| {
            if key.eq_ignore_ascii_case("password") {
                (key.as_str(), "***")
            } else {
                (key.as_str(), value.as_str())
            }
        }));
    }
    url.to_string()
}
