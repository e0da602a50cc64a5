use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::logic::schema_source::SchemaFetcher;
use crate::model::StreamConfig;
use crate::store::StreamConfigRepository;

/// Separator between filter expressions inside the token.
pub const FILTER_SEPARATOR: &str = ";";

/// What the bridge gateway needs to reach and interpret an upstream API.
///
/// Serialized as compact JSON with single-letter keys and then standard
/// base64, producing the opaque `code` parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgePayload {
    #[serde(rename = "s")]
    pub schema_url: String,
    #[serde(rename = "u")]
    pub base_url: String,
    #[serde(rename = "h", default)]
    pub headers: BTreeMap<String, String>,
    /// Filters joined by [`FILTER_SEPARATOR`]; absent when there are none.
    #[serde(rename = "f", default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<String>,
}

impl BridgePayload {
    pub fn from_config(config: &StreamConfig) -> Self {
        Self {
            schema_url: config.schema_url.clone(),
            base_url: config.base_url.clone(),
            headers: config.headers.clone(),
            filters: (!config.filters.is_empty()).then(|| config.filters.join(FILTER_SEPARATOR)),
        }
    }

    pub fn encode(&self) -> Result<String> {
        Ok(STANDARD.encode(serde_json::to_vec(self)?))
    }

    pub fn decode(token: &str) -> Result<Self> {
        let json = STANDARD
            .decode(token)
            .map_err(|e| Error::validation("code", format!("token is not valid base64: {e}")))?;
        Ok(serde_json::from_slice(&json)?)
    }

    /// The individual filter expressions, in order.
    pub fn filter_list(&self) -> Vec<&str> {
        self.filters
            .as_deref()
            .map(|joined| joined.split(FILTER_SEPARATOR).collect())
            .unwrap_or_default()
    }
}

/// Everything handed to the gateway for one session: the schema content, the
/// token and the older discrete query parameters carrying the same data.
#[derive(Debug, Clone)]
pub struct BridgeLaunch {
    pub config_id: String,
    pub schema: Vec<u8>,
    pub payload: BridgePayload,
    pub token: String,
    /// Legacy `h` parameter: the header map as JSON.
    pub headers_json: String,
    /// Legacy repeated `f` parameters.
    pub filters: Vec<String>,
}

impl BridgeLaunch {
    pub fn new(config: &StreamConfig, schema: Vec<u8>) -> Result<Self> {
        let payload = BridgePayload::from_config(config);
        let token = payload.encode()?;
        Ok(Self {
            config_id: config.id.to_hex(),
            schema,
            headers_json: serde_json::to_string(&config.headers)?,
            filters: config.filters.clone(),
            payload,
            token,
        })
    }

    /// `configId`, `u`, `h`, one `f` per filter, then `code`.
    pub fn query_pairs(&self) -> Vec<(&'static str, &str)> {
        let mut pairs = vec![
            ("configId", self.config_id.as_str()),
            ("u", self.payload.base_url.as_str()),
            ("h", self.headers_json.as_str()),
        ];
        pairs.extend(self.filters.iter().map(|f| ("f", f.as_str())));
        pairs.push(("code", self.token.as_str()));
        pairs
    }

    /// The gateway URL with every launch parameter appended to its query.
    pub fn launch_url(&self, gateway_url: &str) -> Result<Url> {
        let mut url = Url::parse(gateway_url)
            .map_err(|e| Error::validation("gateway_url", format!("invalid URL {gateway_url:?}: {e}")))?;
        url.query_pairs_mut().extend_pairs(self.query_pairs());
        Ok(url)
    }
}

/// Resolves a stream config into a [`BridgeLaunch`].
#[derive(Debug, Clone)]
pub struct BridgeTokenBuilder {
    streams: StreamConfigRepository,
    fetcher: SchemaFetcher,
}

impl BridgeTokenBuilder {
    pub fn new(streams: StreamConfigRepository, fetcher: SchemaFetcher) -> Self {
        Self { streams, fetcher }
    }

    /// Unlike the repository lookup, a missing stream config is an error here.
    pub async fn build(&self, config_id: &str) -> Result<BridgeLaunch> {
        if config_id.is_empty() {
            return Err(Error::validation("configId", "missing configId parameter"));
        }

        let config = self
            .streams
            .find_by_id(config_id)
            .await?
            .ok_or_else(|| Error::not_found("stream config", config_id))?;

        let schema = self.fetcher.fetch(&config.schema_url).await?;
        log::debug!(
            "Fetched {} schema bytes for stream config {}",
            schema.len(),
            config_id
        );

        BridgeLaunch::new(&config, schema)
    }
}
