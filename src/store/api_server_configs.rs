use std::sync::Arc;

use crate::error::Result;
use crate::model::ApiServerConfig;
use crate::store::manager::ConnectionManager;
use crate::store::repository::Repository;
use crate::store::traits::{Filter, FindOptions, Sort};

pub const API_SERVER_CONFIGS: &str = "api_server_configs";

#[derive(Debug, Clone)]
pub struct ApiServerConfigRepository {
    repo: Repository<ApiServerConfig>,
}

impl ApiServerConfigRepository {
    pub fn new(manager: Arc<ConnectionManager>) -> Self {
        Self {
            repo: Repository::new(manager, API_SERVER_CONFIGS),
        }
    }

    pub async fn create(&self, config: &mut ApiServerConfig) -> Result<()> {
        self.repo.create(config).await
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Option<ApiServerConfig>> {
        self.repo.find_by_id(id).await
    }

    /// Every config, newest first.
    pub async fn list(&self) -> Result<Vec<ApiServerConfig>> {
        self.repo
            .find(&Filter::all(), &FindOptions::sorted(Sort::descending("created_at")))
            .await
    }

    pub async fn update(&self, config: &mut ApiServerConfig) -> Result<bool> {
        self.repo.update(config).await
    }

    pub async fn delete(&self, id: &str) -> Result<bool> {
        self.repo.delete(id).await
    }
}
