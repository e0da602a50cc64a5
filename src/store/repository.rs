use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::model::{now_utc, Model, ObjectId};
use crate::store::collection::Collection;
use crate::store::manager::ConnectionManager;
use crate::store::traits::{Document, Filter, FindOptions, Pipeline};

/// CRUD, query and aggregate operations for one entity type over one
/// collection. Absence is reported as `Ok(None)`, never as an error.
pub struct Repository<T> {
    manager: Arc<ConnectionManager>,
    collection: String,
    _entity: PhantomData<fn() -> T>,
}

impl<T> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Self {
            manager: self.manager.clone(),
            collection: self.collection.clone(),
            _entity: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for Repository<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("collection", &self.collection)
            .finish()
    }
}

fn decode<T: Model>(doc: Document) -> Result<T> {
    Ok(serde_json::from_value(Value::Object(doc))?)
}

fn encode<T: Model>(entity: &T) -> Result<Document> {
    match serde_json::to_value(entity)? {
        Value::Object(doc) => Ok(doc),
        other => Err(Error::Backend(format!("entity did not serialize to a document: {other}"))),
    }
}

impl<T: Model> Repository<T> {
    pub fn new(manager: Arc<ConnectionManager>, collection: impl Into<String>) -> Self {
        Self {
            manager,
            collection: collection.into(),
            _entity: PhantomData,
        }
    }

    pub fn collection_name(&self) -> &str {
        &self.collection
    }

    async fn collection(&self) -> Result<Collection> {
        self.manager.collection(&self.collection).await
    }

    fn context(&self, operation: &str) -> impl FnOnce(Error) -> Error {
        let context = format!("{operation} {}", self.collection);
        move |err| err.context(context)
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<T>> {
        let id = ObjectId::parse_str(id)?;
        self.find_one(&Filter::by_id(&id)).await
    }

    pub async fn find_one(&self, filter: &Filter) -> Result<Option<T>> {
        let doc = self
            .collection()
            .await?
            .find_one(filter)
            .await
            .map_err(self.context("find_one"))?;
        doc.map(decode).transpose()
    }

    /// Empty when nothing matches.
    pub async fn find(&self, filter: &Filter, options: &FindOptions) -> Result<Vec<T>> {
        let docs = self
            .collection()
            .await?
            .find(filter, options)
            .await
            .map_err(self.context("find"))?;
        docs.into_iter().map(decode).collect()
    }

    /// Assign an identity if the entity has none, stamp both timestamps and insert.
    pub async fn create(&self, entity: &mut T) -> Result<()> {
        if entity.id().is_zero() {
            entity.set_id(ObjectId::new());
        }
        let now = now_utc();
        entity.set_created_at(now);
        entity.set_updated_at(now);

        let doc = encode(entity)?;
        self.collection()
            .await?
            .insert_one(doc)
            .await
            .map_err(self.context("create"))
    }

    /// Replace the whole stored document with `entity`. Returns whether a
    /// document with that identity existed.
    pub async fn update(&self, entity: &mut T) -> Result<bool> {
        let id = entity.id();
        if id.is_zero() {
            return Err(Error::MissingIdentity);
        }
        entity.set_updated_at(now_utc());

        let doc = encode(entity)?;
        let replaced = self
            .collection()
            .await?
            .replace_one(&id, doc)
            .await
            .map_err(self.context("update"))?;
        Ok(replaced > 0)
    }

    /// Returns whether a document was removed.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let id = ObjectId::parse_str(id)?;
        let removed = self
            .collection()
            .await?
            .delete_one(&Filter::by_id(&id))
            .await
            .map_err(self.context("delete"))?;
        Ok(removed > 0)
    }

    pub async fn delete_many(&self, filter: &Filter) -> Result<u64> {
        self.collection()
            .await?
            .delete_many(filter)
            .await
            .map_err(self.context("delete_many"))
    }

    pub async fn count(&self, filter: &Filter) -> Result<u64> {
        self.collection()
            .await?
            .count(filter)
            .await
            .map_err(self.context("count"))
    }

    pub async fn aggregate(&self, pipeline: &Pipeline) -> Result<Vec<T>> {
        let docs = self
            .collection()
            .await?
            .aggregate(pipeline)
            .await
            .map_err(self.context("aggregate"))?;
        docs.into_iter().map(decode).collect()
    }
}
