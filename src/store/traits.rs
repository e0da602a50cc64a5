use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::model::ObjectId;
use crate::store::options::ConnectOptions;

/// A stored document: a JSON object whose identity lives under `_id`.
pub type Document = Map<String, Value>;

pub const ID_FIELD: &str = "_id";

/// Database + collection pair that addresses a set of documents.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace {
    pub database: String,
    pub collection: String,
}

impl Namespace {
    pub fn new(database: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            collection: collection.into(),
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.collection)
    }
}

/// Containment filter: a document matches when every field of the filter
/// equals the document's field (objects compared recursively).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter(Document);

impl Filter {
    /// Matches every document.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::all().and(field, value)
    }

    pub fn by_id(id: &ObjectId) -> Self {
        Self::eq(ID_FIELD, id.to_hex())
    }

    pub fn and(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_document(&self) -> &Document {
        &self.0
    }

    pub fn matches(&self, doc: &Document) -> bool {
        self.0
            .iter()
            .all(|(field, expected)| doc.get(field).is_some_and(|actual| contains(actual, expected)))
    }
}

impl From<Document> for Filter {
    fn from(doc: Document) -> Self {
        Self(doc)
    }
}

fn contains(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Object(actual), Value::Object(expected)) => expected
            .iter()
            .all(|(k, v)| actual.get(k).is_some_and(|a| contains(a, v))),
        // same as jsonb @>: every expected element is contained in some actual element
        (Value::Array(actual), Value::Array(expected)) => expected
            .iter()
            .all(|e| actual.iter().any(|a| contains(a, e))),
        _ => actual == expected,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sort {
    pub field: String,
    pub direction: Direction,
}

impl Sort {
    pub fn ascending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Ascending,
        }
    }

    pub fn descending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Descending,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    pub sort: Option<Sort>,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
}

impl FindOptions {
    pub fn sorted(sort: Sort) -> Self {
        Self {
            sort: Some(sort),
            ..Default::default()
        }
    }
}

/// One step of an aggregation pipeline; stages run in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    Match(Filter),
    Sort(Sort),
    Skip(u64),
    Limit(u64),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pipeline(pub Vec<Stage>);

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(mut self, stage: Stage) -> Self {
        self.0.push(stage);
        self
    }

    pub fn stages(&self) -> &[Stage] {
        &self.0
    }
}

/// A single live connection to a document store.
#[async_trait::async_trait]
pub trait DocumentDriver: Send + Sync + fmt::Debug {
    /// Liveness probe
    async fn ping(&self) -> Result<()>;
    async fn close(&self) -> Result<()>;

    async fn find_one(&self, ns: &Namespace, filter: &Filter) -> Result<Option<Document>>;
    async fn find(&self, ns: &Namespace, filter: &Filter, options: &FindOptions) -> Result<Vec<Document>>;
    /// Fails with `DuplicateKey` when the `_id` already exists
    async fn insert_one(&self, ns: &Namespace, doc: Document) -> Result<()>;
    /// Returns the number of documents replaced (0 or 1)
    async fn replace_one(&self, ns: &Namespace, id: &ObjectId, doc: Document) -> Result<u64>;
    async fn delete_one(&self, ns: &Namespace, filter: &Filter) -> Result<u64>;
    async fn delete_many(&self, ns: &Namespace, filter: &Filter) -> Result<u64>;
    async fn count(&self, ns: &Namespace, filter: &Filter) -> Result<u64>;
    async fn aggregate(&self, ns: &Namespace, pipeline: &Pipeline) -> Result<Vec<Document>>;
}

/// Dials a [`DocumentDriver`].
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, options: &ConnectOptions) -> Result<Arc<dyn DocumentDriver>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        assert!(Filter::all().matches(&doc(json!({"a": 1}))));
        assert!(Filter::all().matches(&Document::new()));
    }

    #[test]
    fn test_filter_matches_nested_objects_by_containment() {
        let d = doc(json!({"name": "pets", "headers": {"A": "1", "B": "2"}}));

        assert!(Filter::eq("headers", json!({"A": "1"})).matches(&d));
        assert!(Filter::eq("name", "pets").and("headers", json!({"B": "2"})).matches(&d));
        assert!(!Filter::eq("headers", json!({"A": "2"})).matches(&d));
        assert!(!Filter::eq("missing", Value::Null).matches(&d));
    }

    #[test]
    fn test_scalar_filter_values() {
        let d = doc(json!({"rank": 3, "active": true}));

        assert!(Filter::eq("rank", 3).and("active", true).matches(&d));
        assert!(!Filter::eq("rank", 4).matches(&d));
        assert!(!Filter::eq("active", "true").matches(&d));
    }

    #[test]
    fn test_array_filter_is_subset_match() {
        let d = doc(json!({"filters": ["+/pets/**", "-/pets/{id}"]}));

        assert!(Filter::eq("filters", json!(["-/pets/{id}"])).matches(&d));
        assert!(!Filter::eq("filters", json!(["+/users/**"])).matches(&d));
    }
}
