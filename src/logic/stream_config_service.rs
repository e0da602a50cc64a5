use crate::error::{Error, Result};
use crate::logic::locations::{validate_base_url, validate_schema_location};
use crate::model::{NewStreamConfig, ObjectId, StreamConfig, StreamConfigPatch};
use crate::store::{ApiServerConfigRepository, StreamConfigRepository};

const ENTITY: &str = "stream config";

/// Creates stream configs, inheriting schema location and base URL from a
/// referenced API server config when the request leaves them empty.
#[derive(Debug, Clone)]
pub struct StreamConfigService {
    streams: StreamConfigRepository,
    api_server_configs: ApiServerConfigRepository,
}

impl StreamConfigService {
    pub fn new(streams: StreamConfigRepository, api_server_configs: ApiServerConfigRepository) -> Self {
        Self {
            streams,
            api_server_configs,
        }
    }

    /// Fill empty fields from the referenced API server config, validate and
    /// persist. A missing or unreadable reference just means no defaults.
    /// The lookup and the insert are separate store calls.
    pub async fn create(&self, mut request: NewStreamConfig) -> Result<StreamConfig> {
        // references are stored in canonical hex so reference counts match
        request.api_server_config_id = request
            .api_server_config_id
            .filter(|id| !id.is_empty())
            .map(|id| ObjectId::parse_str(&id).map(|oid| oid.to_hex()).unwrap_or(id));

        if let Some(reference) = request.api_server_config_id.clone() {
            if request.schema_url.is_empty() || request.base_url.is_empty() {
                self.inherit_defaults(&reference, &mut request).await;
            }
        }

        if request.schema_url.is_empty() {
            return Err(Error::validation("schema_url", "schema URL is required"));
        }
        if request.base_url.is_empty() {
            return Err(Error::validation("base_url", "base URL is required"));
        }
        validate_schema_location("schema_url", &request.schema_url)?;
        validate_base_url("base_url", &request.base_url)?;

        let created = self.streams.create(StreamConfig::from_request(request)).await?;
        log::info!("Created {} {}", ENTITY, created.id);
        Ok(created)
    }

    async fn inherit_defaults(&self, reference: &str, request: &mut NewStreamConfig) {
        match self.api_server_configs.get_by_id(reference).await {
            Ok(Some(api)) => {
                if request.schema_url.is_empty() {
                    request.schema_url = api.schema_url;
                }
                if request.base_url.is_empty() {
                    request.base_url = api.base_url;
                }
            }
            Ok(None) => log::debug!("Referenced api server config {} does not exist", reference),
            Err(err) => log::warn!(
                "Could not resolve api server config {}, applying no defaults: {}",
                reference,
                err
            ),
        }
    }

    pub async fn get(&self, id: &str) -> Result<Option<StreamConfig>> {
        self.streams.find_by_id(id).await
    }

    pub async fn list(&self) -> Result<Vec<StreamConfig>> {
        self.streams.list().await
    }

    /// Overwrite only the fields the patch supplies, then write the merged
    /// record back in full.
    pub async fn update(&self, id: &str, patch: StreamConfigPatch) -> Result<StreamConfig> {
        if let Some(schema_url) = patch.schema_url.as_deref().filter(|s| !s.is_empty()) {
            validate_schema_location("schema_url", schema_url)?;
        }
        if let Some(base_url) = patch.base_url.as_deref().filter(|s| !s.is_empty()) {
            validate_base_url("base_url", base_url)?;
        }

        let mut config = self
            .streams
            .find_by_id(id)
            .await?
            .ok_or_else(|| Error::not_found(ENTITY, id))?;

        config.apply(patch);
        if !self.streams.update_by_id(id, &mut config).await? {
            return Err(Error::not_found(ENTITY, id));
        }
        Ok(config)
    }

    pub async fn delete(&self, id: &str) -> Result<bool> {
        self.streams.delete(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::model::ApiServerConfig;
    use crate::store::{ConnectionManager, MemoryConnector};
    use std::collections::BTreeMap;
    use std::sync::Arc;

    struct Fixture {
        service: StreamConfigService,
        streams: StreamConfigRepository,
        api_server_configs: ApiServerConfigRepository,
    }

    async fn fixture() -> Fixture {
        let config = StoreConfig {
            uri: "memory://resolution".to_string(),
            ..StoreConfig::default()
        };
        let manager = Arc::new(ConnectionManager::new(config, Arc::new(MemoryConnector::new())));
        manager.connect().await.unwrap();

        let api_server_configs = ApiServerConfigRepository::new(manager.clone());
        let streams = StreamConfigRepository::new(manager);
        let service = StreamConfigService::new(streams.clone(), api_server_configs.clone());
        Fixture {
            service,
            streams,
            api_server_configs,
        }
    }

    async fn api_server_config(fixture: &Fixture) -> String {
        let mut api = ApiServerConfig::new(
            "x".to_string(),
            String::new(),
            "https://x/schema.json".to_string(),
            "https://x/api".to_string(),
        );
        fixture.api_server_configs.create(&mut api).await.unwrap();
        api.id.to_hex()
    }

    #[tokio::test]
    async fn test_create_inherits_from_reference() {
        let fixture = fixture().await;
        let api_id = api_server_config(&fixture).await;

        let created = fixture
            .service
            .create(NewStreamConfig {
                api_server_config_id: Some(api_id.clone()),
                base_url: "https://override.example".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(created.schema_url, "https://x/schema.json");
        assert_eq!(created.base_url, "https://override.example");
        assert_eq!(created.api_server_config_id.as_deref(), Some(api_id.as_str()));

        let stored = fixture.service.get(&created.id.to_hex()).await.unwrap();
        assert_eq!(stored, Some(created));
    }

    #[tokio::test]
    async fn test_uppercase_reference_is_stored_canonically() {
        let fixture = fixture().await;
        let api_id = api_server_config(&fixture).await;

        let created = fixture
            .service
            .create(NewStreamConfig {
                api_server_config_id: Some(api_id.to_uppercase()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(created.schema_url, "https://x/schema.json");
        assert_eq!(created.api_server_config_id.as_deref(), Some(api_id.as_str()));
        assert_eq!(fixture.streams.count_referencing(&api_id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_create_without_reference_needs_explicit_fields() {
        let fixture = fixture().await;

        let err = fixture
            .service
            .create(NewStreamConfig {
                base_url: "https://api.example".to_string(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation { field: "schema_url", .. }));

        let err = fixture
            .service
            .create(NewStreamConfig {
                schema_url: "./openapi.yaml".to_string(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation { field: "base_url", .. }));

        assert!(fixture.service.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unresolvable_reference_applies_no_defaults() {
        let fixture = fixture().await;

        for reference in [ObjectId::new().to_hex(), "not-an-object-id".to_string()] {
            let err = fixture
                .service
                .create(NewStreamConfig {
                    api_server_config_id: Some(reference),
                    ..Default::default()
                })
                .await
                .unwrap_err();
            assert!(matches!(err, Error::Validation { field: "schema_url", .. }));
        }

        let created = fixture
            .service
            .create(NewStreamConfig {
                api_server_config_id: Some(ObjectId::new().to_hex()),
                schema_url: "./openapi.yaml".to_string(),
                base_url: "https://api.example".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(created.schema_url, "./openapi.yaml");
    }

    #[tokio::test]
    async fn test_update_with_only_headers() {
        let fixture = fixture().await;
        let api_id = api_server_config(&fixture).await;
        let created = fixture
            .service
            .create(NewStreamConfig {
                api_server_config_id: Some(api_id),
                filters: vec!["+/pets/**".to_string(), "-/pets/admin".to_string()],
                ..Default::default()
            })
            .await
            .unwrap();

        let headers = BTreeMap::from([("Authorization".to_string(), "Bearer abc".to_string())]);
        let updated = fixture
            .service
            .update(
                &created.id.to_hex(),
                StreamConfigPatch {
                    headers: Some(headers.clone()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.headers, headers);
        assert_eq!(updated.schema_url, created.schema_url);
        assert_eq!(updated.base_url, created.base_url);
        assert_eq!(updated.filters, created.filters);
        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.updated_at >= created.updated_at);

        let stored = fixture.service.get(&created.id.to_hex()).await.unwrap().unwrap();
        assert_eq!(stored, updated);
    }

    #[tokio::test]
    async fn test_update_and_delete_missing_record() {
        let fixture = fixture().await;
        let missing = ObjectId::new().to_hex();

        let err = fixture
            .service
            .update(&missing, StreamConfigPatch::default())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(!fixture.service.delete(&missing).await.unwrap());
    }
}
