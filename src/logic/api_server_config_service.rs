use crate::error::{Error, Result};
use crate::logic::locations::{validate_base_url, validate_schema_location};
use crate::model::{ApiServerConfig, ApiServerConfigPatch, ObjectId};
use crate::store::{ApiServerConfigRepository, StreamConfigRepository};

const ENTITY: &str = "api server config";

fn require_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(Error::validation("id", "id is required"));
    }
    Ok(())
}

/// Validates and persists reusable upstream API descriptions.
#[derive(Debug, Clone)]
pub struct ApiServerConfigService {
    configs: ApiServerConfigRepository,
    streams: StreamConfigRepository,
}

impl ApiServerConfigService {
    pub fn new(configs: ApiServerConfigRepository, streams: StreamConfigRepository) -> Self {
        Self { configs, streams }
    }

    pub async fn create(
        &self,
        name: &str,
        description: &str,
        schema_url: &str,
        base_url: &str,
    ) -> Result<ApiServerConfig> {
        if name.is_empty() {
            return Err(Error::validation("name", "name is required"));
        }
        if schema_url.is_empty() {
            return Err(Error::validation("schema_url", "schema URL is required"));
        }
        if base_url.is_empty() {
            return Err(Error::validation("base_url", "base URL is required"));
        }
        validate_schema_location("schema_url", schema_url)?;
        validate_base_url("base_url", base_url)?;

        let mut config = ApiServerConfig::new(
            name.to_string(),
            description.to_string(),
            schema_url.to_string(),
            base_url.to_string(),
        );
        self.configs.create(&mut config).await?;
        log::info!("Created {} {} ({})", ENTITY, config.id, config.name);
        Ok(config)
    }

    pub async fn get(&self, id: &str) -> Result<Option<ApiServerConfig>> {
        require_id(id)?;
        self.configs.get_by_id(id).await
    }

    pub async fn list(&self) -> Result<Vec<ApiServerConfig>> {
        self.configs.list().await
    }

    pub async fn update(&self, id: &str, patch: ApiServerConfigPatch) -> Result<ApiServerConfig> {
        require_id(id)?;
        if !patch.schema_url.is_empty() {
            validate_schema_location("schema_url", &patch.schema_url)?;
        }
        if !patch.base_url.is_empty() {
            validate_base_url("base_url", &patch.base_url)?;
        }

        let mut config = self
            .configs
            .get_by_id(id)
            .await?
            .ok_or_else(|| Error::not_found(ENTITY, id))?;

        config.apply(patch);
        // deleted between the read and the write
        if !self.configs.update(&mut config).await? {
            return Err(Error::not_found(ENTITY, id));
        }
        Ok(config)
    }

    /// Stream configs that reference the deleted record are left in place.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        require_id(id)?;
        let object_id = ObjectId::parse_str(id)?;

        let removed = self.configs.delete(id).await?;
        if removed {
            // already deleted; a failed count must not fail the call
            match self.streams.count_referencing(&object_id.to_hex()).await {
                Ok(0) => {}
                Ok(referencing) => log::warn!(
                    "Deleted {} {} is still referenced by {} stream config(s)",
                    ENTITY,
                    id,
                    referencing
                ),
                Err(err) => log::warn!(
                    "Deleted {} {} but could not count referencing stream configs: {}",
                    ENTITY,
                    id,
                    err
                ),
            }
        }
        Ok(removed)
    }
}
