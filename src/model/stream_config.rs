use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::model::contract::timestamp;
use crate::model::{Model, ObjectId};

/// One bridge session definition: the upstream API the gateway should expose,
/// the headers it forwards and which paths it keeps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamConfig {
    #[serde(rename = "_id", default)]
    pub id: ObjectId,
    /// Referenced, not owned. May dangle if the API server config is deleted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_server_config_id: Option<String>,
    pub schema_url: String,
    pub base_url: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<String>,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
}

/// Creation request. Empty `schema_url` / `base_url` may be filled in from the
/// referenced API server config.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewStreamConfig {
    pub api_server_config_id: Option<String>,
    pub schema_url: String,
    pub base_url: String,
    pub headers: BTreeMap<String, String>,
    pub filters: Vec<String>,
}

/// Partial update. `None` (or an empty URL) leaves the stored field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamConfigPatch {
    pub schema_url: Option<String>,
    pub base_url: Option<String>,
    pub headers: Option<BTreeMap<String, String>>,
    pub filters: Option<Vec<String>>,
}

impl StreamConfig {
    pub fn from_request(request: NewStreamConfig) -> Self {
        Self {
            id: ObjectId::ZERO,
            api_server_config_id: request.api_server_config_id,
            schema_url: request.schema_url,
            base_url: request.base_url,
            headers: request.headers,
            filters: request.filters,
            created_at: DateTime::<Utc>::default(),
            updated_at: DateTime::<Utc>::default(),
        }
    }

    pub fn apply(&mut self, patch: StreamConfigPatch) {
        if let Some(schema_url) = patch.schema_url.filter(|s| !s.is_empty()) {
            self.schema_url = schema_url;
        }
        if let Some(base_url) = patch.base_url.filter(|s| !s.is_empty()) {
            self.base_url = base_url;
        }
        if let Some(headers) = patch.headers {
            self.headers = headers;
        }
        if let Some(filters) = patch.filters {
            self.filters = filters;
        }
    }
}

impl Model for StreamConfig {
    fn id(&self) -> ObjectId {
        self.id
    }

    fn set_id(&mut self, id: ObjectId) {
        self.id = id;
    }

    fn set_created_at(&mut self, at: DateTime<Utc>) {
        self.created_at = at;
    }

    fn set_updated_at(&mut self, at: DateTime<Utc>) {
        self.updated_at = at;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> StreamConfig {
        StreamConfig::from_request(NewStreamConfig {
            api_server_config_id: None,
            schema_url: "./petstore.yaml".to_string(),
            base_url: "https://petstore.example".to_string(),
            headers: BTreeMap::from([("Authorization".to_string(), "Bearer t".to_string())]),
            filters: vec!["+/pets/**".to_string()],
        })
    }

    #[test]
    fn test_patch_with_only_headers() {
        let mut config = sample();
        let headers = BTreeMap::from([("X-Api-Key".to_string(), "k".to_string())]);
        config.apply(StreamConfigPatch {
            headers: Some(headers.clone()),
            ..Default::default()
        });

        assert_eq!(config.headers, headers);
        assert_eq!(config.schema_url, "./petstore.yaml");
        assert_eq!(config.base_url, "https://petstore.example");
        assert_eq!(config.filters, vec!["+/pets/**".to_string()]);
    }

    #[test]
    fn test_empty_urls_in_patch_are_ignored() {
        let mut config = sample();
        config.apply(StreamConfigPatch {
            schema_url: Some(String::new()),
            filters: Some(Vec::new()),
            ..Default::default()
        });

        assert_eq!(config.schema_url, "./petstore.yaml");
        assert!(config.filters.is_empty());
    }

    #[test]
    fn test_reads_documents_without_optional_fields() {
        let doc = serde_json::json!({
            "_id": "65f0c0ffee0000000000abcd",
            "schema_url": "s",
            "base_url": "https://b",
            "created_at": "2026-01-01T00:00:00.000Z",
            "updated_at": "2026-01-01T00:00:00.000Z"
        });
        let config: StreamConfig = serde_json::from_value(doc).unwrap();

        assert!(config.api_server_config_id.is_none());
        assert!(config.headers.is_empty());
        assert!(config.filters.is_empty());
        assert_eq!(config.id.to_hex(), "65f0c0ffee0000000000abcd");
    }
}
