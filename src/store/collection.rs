use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::model::ObjectId;
use crate::store::traits::{Document, DocumentDriver, Filter, FindOptions, Namespace, Pipeline};

/// Run `future` under an optional deadline, reporting expiry as `Timeout`.
pub async fn with_deadline<T>(
    operation: &str,
    deadline: Option<Duration>,
    future: impl Future<Output = Result<T>>,
) -> Result<T> {
    match deadline {
        Some(after) => tokio::time::timeout(after, future).await.map_err(|_| Error::Timeout {
            operation: operation.to_string(),
            after,
        })?,
        None => future.await,
    }
}

/// Handle on a database bound to a live connection.
#[derive(Debug, Clone)]
pub struct Database {
    driver: Arc<dyn DocumentDriver>,
    name: String,
    timeout: Option<Duration>,
}

impl Database {
    pub(crate) fn new(driver: Arc<dyn DocumentDriver>, name: String, timeout: Option<Duration>) -> Self {
        Self {
            driver,
            name,
            timeout,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn collection(&self, name: &str) -> Collection {
        Collection {
            driver: self.driver.clone(),
            ns: Namespace::new(self.name.clone(), name),
            timeout: self.timeout,
        }
    }
}

/// Handle on one collection. Every call is bounded by the socket timeout.
#[derive(Debug, Clone)]
pub struct Collection {
    driver: Arc<dyn DocumentDriver>,
    ns: Namespace,
    timeout: Option<Duration>,
}

impl Collection {
    pub fn namespace(&self) -> &Namespace {
        &self.ns
    }

    pub async fn find_one(&self, filter: &Filter) -> Result<Option<Document>> {
        with_deadline("find_one", self.timeout, self.driver.find_one(&self.ns, filter)).await
    }

    pub async fn find(&self, filter: &Filter, options: &FindOptions) -> Result<Vec<Document>> {
        with_deadline("find", self.timeout, self.driver.find(&self.ns, filter, options)).await
    }

    pub async fn insert_one(&self, doc: Document) -> Result<()> {
        with_deadline("insert_one", self.timeout, self.driver.insert_one(&self.ns, doc)).await
    }

    pub async fn replace_one(&self, id: &ObjectId, doc: Document) -> Result<u64> {
        with_deadline("replace_one", self.timeout, self.driver.replace_one(&self.ns, id, doc)).await
    }

    pub async fn delete_one(&self, filter: &Filter) -> Result<u64> {
        with_deadline("delete_one", self.timeout, self.driver.delete_one(&self.ns, filter)).await
    }

    pub async fn delete_many(&self, filter: &Filter) -> Result<u64> {
        with_deadline("delete_many", self.timeout, self.driver.delete_many(&self.ns, filter)).await
    }

    pub async fn count(&self, filter: &Filter) -> Result<u64> {
        with_deadline("count", self.timeout, self.driver.count(&self.ns, filter)).await
    }

    pub async fn aggregate(&self, pipeline: &Pipeline) -> Result<Vec<Document>> {
        with_deadline("aggregate", self.timeout, self.driver.aggregate(&self.ns, pipeline)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_deadline_expiry_is_a_timeout() {
        let slow = async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(())
        };
        let err = with_deadline("slow op", Some(Duration::from_millis(10)), slow)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout { ref operation, .. } if operation == "slow op"));
    }

    #[tokio::test]
    async fn test_no_deadline_runs_to_completion() {
        let value = with_deadline("quick", None, async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
    }
}
