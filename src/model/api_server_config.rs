use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::contract::timestamp;
use crate::model::{Model, ObjectId};

/// A reusable upstream API description: where its OpenAPI schema lives and
/// which base URL requests go to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiServerConfig {
    #[serde(rename = "_id", default)]
    pub id: ObjectId,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub schema_url: String,
    pub base_url: String,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
}

/// Partial update for an [`ApiServerConfig`].
///
/// Empty `name`, `schema_url` and `base_url` leave the stored value alone.
/// `description` is always written, so an empty string clears it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApiServerConfigPatch {
    pub name: String,
    pub description: String,
    pub schema_url: String,
    pub base_url: String,
}

impl ApiServerConfig {
    pub fn new(name: String, description: String, schema_url: String, base_url: String) -> Self {
        Self {
            id: ObjectId::ZERO,
            name,
            description,
            schema_url,
            base_url,
            created_at: DateTime::<Utc>::default(),
            updated_at: DateTime::<Utc>::default(),
        }
    }

    pub fn apply(&mut self, patch: ApiServerConfigPatch) {
        if !patch.name.is_empty() {
            self.name = patch.name;
        }
        self.description = patch.description;
        if !patch.schema_url.is_empty() {
            self.schema_url = patch.schema_url;
        }
        if !patch.base_url.is_empty() {
            self.base_url = patch.base_url;
        }
    }
}

impl Model for ApiServerConfig {
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
