use std::sync::Arc;

use crate::error::Result;
use crate::model::{ObjectId, StreamConfig};
use crate::store::manager::ConnectionManager;
use crate::store::repository::Repository;
use crate::store::traits::{Filter, FindOptions, Sort};

pub const STREAM_CONFIGS: &str = "sse_configs";

#[derive(Debug, Clone)]
pub struct StreamConfigRepository {
    repo: Repository<StreamConfig>,
}

impl StreamConfigRepository {
    pub fn new(manager: Arc<ConnectionManager>) -> Self {
        Self {
            repo: Repository::new(manager, STREAM_CONFIGS),
        }
    }

    /// Insert and hand back the record with its identity and timestamps.
    pub async fn create(&self, mut config: StreamConfig) -> Result<StreamConfig> {
        self.repo.create(&mut config).await?;
        Ok(config)
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<StreamConfig>> {
        self.repo.find_by_id(id).await
    }

    pub async fn find_one(&self, filter: &Filter) -> Result<Option<StreamConfig>> {
        self.repo.find_one(filter).await
    }

    pub async fn list(&self) -> Result<Vec<StreamConfig>> {
        self.repo
            .find(&Filter::all(), &FindOptions::sorted(Sort::descending("created_at")))
            .await
    }

    /// Full replace of the record stored under `id`.
    pub async fn update_by_id(&self, id: &str, config: &mut StreamConfig) -> Result<bool> {
        config.id = ObjectId::parse_str(id)?;
        self.repo.update(config).await
    }

    pub async fn delete(&self, id: &str) -> Result<bool> {
        self.repo.delete(id).await
    }

    /// Stream configs still pointing at an API server config.
    pub async fn count_referencing(&self, api_server_config_id: &str) -> Result<u64> {
        self.repo
            .count(&Filter::eq("api_server_config_id", api_server_config_id))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::error::Error;
    use crate::model::NewStreamConfig;
    use crate::store::memory::MemoryConnector;

    async fn repository() -> StreamConfigRepository {
        let config = StoreConfig {
            uri: "memory://streams".to_string(),
            ..StoreConfig::default()
        };
        let manager = Arc::new(ConnectionManager::new(config, Arc::new(MemoryConnector::new())));
        manager.connect().await.unwrap();
        StreamConfigRepository::new(manager)
    }

    fn request(api_server_config_id: Option<&str>) -> StreamConfig {
        StreamConfig::from_request(NewStreamConfig {
            api_server_config_id: api_server_config_id.map(str::to_string),
            schema_url: "./openapi.yaml".to_string(),
            base_url: "https://api.example".to_string(),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_create_returns_identity() {
        let repo = repository().await;
        let created = repo.create(request(None)).await.unwrap();

        assert!(!created.id.is_zero());
        let found = repo.find_by_id(&created.id.to_hex()).await.unwrap();
        assert_eq!(found, Some(created));
    }

    #[tokio::test]
    async fn test_update_by_id_sets_identity() {
        let repo = repository().await;
        let created = repo.create(request(None)).await.unwrap();

        let mut replacement = request(None);
        replacement.base_url = "https://other.example".to_string();
        assert!(repo
            .update_by_id(&created.id.to_hex(), &mut replacement)
            .await
            .unwrap());
        assert_eq!(replacement.id, created.id);

        let stored = repo.find_by_id(&created.id.to_hex()).await.unwrap().unwrap();
        assert_eq!(stored.base_url, "https://other.example");

        let err = repo.update_by_id("bogus", &mut replacement).await.unwrap_err();
        assert!(matches!(err, Error::MalformedIdentifier(_)));
    }

    #[tokio::test]
    async fn test_count_referencing() {
        let repo = repository().await;
        let api_id = ObjectId::new().to_hex();
        repo.create(request(Some(&api_id))).await.unwrap();
        repo.create(request(Some(&api_id))).await.unwrap();
        repo.create(request(None)).await.unwrap();

        assert_eq!(repo.count_referencing(&api_id).await.unwrap(), 2);
        assert_eq!(repo.list().await.unwrap().len(), 3);

        let one = repo
            .find_one(&Filter::eq("api_server_config_id", api_id.as_str()))
            .await
            .unwrap()
            .unwrap();
        assert!(repo.delete(&one.id.to_hex()).await.unwrap());
        assert_eq!(repo.count_referencing(&api_id).await.unwrap(), 1);
    }
}
