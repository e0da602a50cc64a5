use parking_lot::Mutex;
use serde_json::Value;
use std::cmp::Ordering as CmpOrdering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::model::ObjectId;
use crate::store::options::ConnectOptions;
use crate::store::traits::{
    Connector, Direction, Document, DocumentDriver, Filter, FindOptions, Namespace, Pipeline,
    Sort, Stage, ID_FIELD,
};

type Collections = HashMap<Namespace, Vec<Document>>;

/// In-process document store for `memory://` URIs.
///
/// Data lives in the connector, so it survives disconnect/reconnect the way a
/// server would. Probe, close and count failures can be injected for
/// lifecycle testing.
#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    data: Arc<Mutex<Collections>>,
    fail_probe: Arc<AtomicBool>,
    fail_close: Arc<AtomicBool>,
    fail_count: Arc<AtomicBool>,
    connects: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every liveness probe fail until reset.
    pub fn set_probe_failure(&self, fail: bool) {
        self.fail_probe.store(fail, Ordering::SeqCst);
    }

    /// Make closing a connection fail; the connection stays open.
    pub fn set_close_failure(&self, fail: bool) {
        self.fail_close.store(fail, Ordering::SeqCst);
    }

    pub fn set_count_failure(&self, fail: bool) {
        self.fail_count.store(fail, Ordering::SeqCst);
    }

    /// Number of connections dialed so far
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Number of connections closed so far
    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, _options: &ConnectOptions) -> Result<Arc<dyn DocumentDriver>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MemoryDriver {
            data: self.data.clone(),
            fail_probe: self.fail_probe.clone(),
            fail_close: self.fail_close.clone(),
            fail_count: self.fail_count.clone(),
            closes: self.closes.clone(),
            closed: AtomicBool::new(false),
        }))
    }
}

#[derive(Debug)]
pub struct MemoryDriver {
    data: Arc<Mutex<Collections>>,
    fail_probe: Arc<AtomicBool>,
    fail_close: Arc<AtomicBool>,
    fail_count: Arc<AtomicBool>,
    closes: Arc<AtomicUsize>,
    closed: AtomicBool,
}

impl MemoryDriver {
    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::Connection("memory connection is closed".to_string()));
        }
        Ok(())
    }

    fn matching(&self, ns: &Namespace, filter: &Filter) -> Result<Vec<Document>> {
        self.ensure_open()?;
        let data = self.data.lock();
        Ok(data
            .get(ns)
            .map(|docs| docs.iter().filter(|d| filter.matches(d)).cloned().collect())
            .unwrap_or_default())
    }

    fn remove(&self, ns: &Namespace, filter: &Filter, limit: Option<usize>) -> Result<u64> {
        self.ensure_open()?;
        let mut data = self.data.lock();
        let Some(docs) = data.get_mut(ns) else {
            return Ok(0);
        };
        let mut removed = 0usize;
        docs.retain(|d| {
            let hit = limit.map_or(true, |l| removed < l) && filter.matches(d);
            if hit {
                removed += 1;
            }
            !hit
        });
        Ok(removed as u64)
    }
}

fn rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Number(_)) => 1,
        Some(Value::String(_)) => 2,
        Some(Value::Object(_)) => 3,
        Some(Value::Array(_)) => 4,
        Some(Value::Bool(_)) => 5,
    }
}

fn compare(a: Option<&Value>, b: Option<&Value>) -> CmpOrdering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(CmpOrdering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

fn sort_docs(docs: &mut [Document], sort: &Sort) {
    docs.sort_by(|a, b| {
        let ord = compare(a.get(&sort.field), b.get(&sort.field));
        match sort.direction {
            Direction::Ascending => ord,
            Direction::Descending => ord.reverse(),
        }
    });
}

fn page(docs: Vec<Document>, skip: Option<u64>, limit: Option<u64>) -> Vec<Document> {
    let skipped = docs.into_iter().skip(skip.unwrap_or(0) as usize);
    match limit {
        Some(limit) => skipped.take(limit as usize).collect(),
        None => skipped.collect(),
    }
}

#[async_trait::async_trait]
impl DocumentDriver for MemoryDriver {
    async fn ping(&self) -> Result<()> {
        self.ensure_open()?;
        if self.fail_probe.load(Ordering::SeqCst) {
            return Err(Error::Connection("memory store probe failed".to_string()));
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if self.fail_close.load(Ordering::SeqCst) {
            return Err(Error::Backend("memory store close failed".to_string()));
        }
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn find_one(&self, ns: &Namespace, filter: &Filter) -> Result<Option<Document>> {
        Ok(self.matching(ns, filter)?.into_iter().next())
    }

    async fn find(&self, ns: &Namespace, filter: &Filter, options: &FindOptions) -> Result<Vec<Document>> {
        let mut docs = self.matching(ns, filter)?;
        if let Some(sort) = &options.sort {
            sort_docs(&mut docs, sort);
        }
        Ok(page(docs, options.skip, options.limit))
    }

    async fn insert_one(&self, ns: &Namespace, doc: Document) -> Result<()> {
        self.ensure_open()?;
        let id = doc
            .get(ID_FIELD)
            .cloned()
            .ok_or_else(|| Error::Backend(format!("document for {ns} has no {ID_FIELD}")))?;
        let mut data = self.data.lock();
        let docs = data.entry(ns.clone()).or_default();
        if docs.iter().any(|d| d.get(ID_FIELD) == Some(&id)) {
            return Err(Error::DuplicateKey(format!("{ns} {ID_FIELD} {id}")));
        }
        docs.push(doc);
        Ok(())
    }

    async fn replace_one(&self, ns: &Namespace, id: &ObjectId, doc: Document) -> Result<u64> {
        self.ensure_open()?;
        let key = Value::String(id.to_hex());
        let mut data = self.data.lock();
        let slot = data
            .get_mut(ns)
            .and_then(|docs| docs.iter_mut().find(|d| d.get(ID_FIELD) == Some(&key)));
        match slot {
            Some(existing) => {
                *existing = doc;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete_one(&self, ns: &Namespace, filter: &Filter) -> Result<u64> {
        self.remove(ns, filter, Some(1))
    }

    async fn delete_many(&self, ns: &Namespace, filter: &Filter) -> Result<u64> {
        self.remove(ns, filter, None)
    }

    async fn count(&self, ns: &Namespace, filter: &Filter) -> Result<u64> {
        if self.fail_count.load(Ordering::SeqCst) {
            return Err(Error::Backend("memory store count failed".to_string()));
        }
        Ok(self.matching(ns, filter)?.len() as u64)
    }

    async fn aggregate(&self, ns: &Namespace, pipeline: &Pipeline) -> Result<Vec<Document>> {
        let mut docs = self.matching(ns, &Filter::all())?;
        for stage in pipeline.stages() {
            docs = match stage {
                Stage::Match(filter) => docs.into_iter().filter(|d| filter.matches(d)).collect(),
                Stage::Sort(sort) => {
                    sort_docs(&mut docs, sort);
                    docs
                }
                Stage::Skip(n) => page(docs, Some(*n), None),
                Stage::Limit(n) => page(docs, None, Some(*n)),
            };
        }
        Ok(docs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use serde_json::json;

    fn doc(id: &ObjectId, rank: i64, kind: &str) -> Document {
        json!({"_id": id.to_hex(), "rank": rank, "kind": kind})
            .as_object()
            .cloned()
            .unwrap()
    }

    async fn driver() -> (MemoryConnector, Arc<dyn DocumentDriver>) {
        let connector = MemoryConnector::new();
        let options = ConnectOptions::from_config(&StoreConfig::default());
        let driver = connector.connect(&options).await.unwrap();
        (connector, driver)
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicate_ids() {
        let (_, driver) = driver().await;
        let ns = Namespace::new("db", "things");
        let id = ObjectId::new();

        driver.insert_one(&ns, doc(&id, 1, "a")).await.unwrap();
        let err = driver.insert_one(&ns, doc(&id, 2, "b")).await.unwrap_err();
        assert!(matches!(err, Error::DuplicateKey(_)));
    }

    #[tokio::test]
    async fn test_namespaces_are_isolated() {
        let (_, driver) = driver().await;
        let id = ObjectId::new();
        driver
            .insert_one(&Namespace::new("db", "a"), doc(&id, 1, "x"))
            .await
            .unwrap();

        let other = driver.count(&Namespace::new("other", "a"), &Filter::all()).await.unwrap();
        assert_eq!(other, 0);
    }

    #[tokio::test]
    async fn test_aggregate_runs_stages_in_order() {
        let (_, driver) = driver().await;
        let ns = Namespace::new("db", "things");
        for (rank, kind) in [(3, "a"), (1, "b"), (2, "a"), (5, "a"), (4, "b")] {
            driver.insert_one(&ns, doc(&ObjectId::new(), rank, kind)).await.unwrap();
        }

        let pipeline = Pipeline::new()
            .stage(Stage::Match(Filter::eq("kind", "a")))
            .stage(Stage::Sort(Sort::descending("rank")))
            .stage(Stage::Skip(1))
            .stage(Stage::Limit(1));
        let docs = driver.aggregate(&ns, &pipeline).await.unwrap();

        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0]["rank"], 3);
    }

    #[tokio::test]
    async fn test_closed_driver_refuses_work() {
        let (connector, driver) = driver().await;
        driver.close().await.unwrap();
        driver.close().await.unwrap();

        assert_eq!(connector.close_count(), 1);
        assert!(driver.ping().await.is_err());
        let err = driver
            .find_one(&Namespace::new("db", "things"), &Filter::all())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Connection(_)));
    }
}
