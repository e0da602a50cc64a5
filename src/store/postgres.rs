use serde_json::Value;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::model::ObjectId;
use crate::store::options::ConnectOptions;
use crate::store::traits::{
    Connector, Direction, Document, DocumentDriver, Filter, FindOptions, Namespace, Pipeline,
    Sort, Stage, ID_FIELD,
};

const CREATE_DOCUMENTS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS documents (
        database   TEXT  NOT NULL,
        collection TEXT  NOT NULL,
        id         TEXT  NOT NULL,
        doc        JSONB NOT NULL,
        PRIMARY KEY (database, collection, id)
    )
"#;

const CREATE_DOCUMENTS_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS documents_doc_gin ON documents USING GIN (doc jsonb_path_ops)";

fn failed(operation: &'static str) -> impl FnOnce(sqlx::Error) -> Error {
    move |err| Error::from(err).context(operation)
}

/// Dials PostgreSQL and stores every collection in one JSONB table.
#[derive(Debug, Clone, Copy, Default)]
pub struct PgConnector;

impl PgConnector {
    fn connect_options(options: &ConnectOptions) -> Result<PgConnectOptions> {
        let mut connect = PgConnectOptions::from_str(&options.uri)
            .map_err(|e| Error::Connection(format!("invalid PostgreSQL URI: {e}")))?;

        if let Some(credentials) = &options.credentials {
            connect = connect
                .username(&credentials.username)
                .password(&credentials.password);
            if let Some(auth_database) = &credentials.auth_database {
                connect = connect.database(auth_database);
            }
        }

        if let Some(timeout) = options.socket_timeout {
            connect = connect.options([("statement_timeout", format!("{}ms", timeout.as_millis()))]);
        }

        if let Some(replica_set) = &options.replica_set {
            log::warn!("Replica set '{}' does not apply to PostgreSQL and is ignored", replica_set);
        }

        Ok(connect)
    }
}

#[async_trait::async_trait]
impl Connector for PgConnector {
    async fn connect(&self, options: &ConnectOptions) -> Result<Arc<dyn DocumentDriver>> {
        let connect = Self::connect_options(options)?;

        let mut pool = PgPoolOptions::new().min_connections(options.min_pool_size);
        if options.max_pool_size > 0 {
            pool = pool.max_connections(options.max_pool_size);
        }
        if let Some(timeout) = options.server_selection_timeout {
            pool = pool.acquire_timeout(timeout);
        }

        let pool = pool
            .connect_with(connect)
            .await
            .map_err(|e| Error::Connection(format!("failed to create PostgreSQL connection pool: {e}")))?;

        let store = PostgresStore { pool };
        if let Err(err) = store.ensure_schema().await {
            store.pool.close().await;
            return Err(err);
        }

        Ok(Arc::new(store))
    }
}

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create the documents table if this database has never seen it
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(CREATE_DOCUMENTS_TABLE)
            .execute(&self.pool)
            .await
            .map_err(failed("create documents table"))?;
        sqlx::query(CREATE_DOCUMENTS_INDEX)
            .execute(&self.pool)
            .await
            .map_err(failed("create documents index"))?;
        Ok(())
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn scoped<'a>(sql: &str, ns: &Namespace, filter: &Filter) -> QueryBuilder<'a, Postgres> {
        let mut query = QueryBuilder::new(sql);
        push_scope(&mut query, ns, filter);
        query
    }
}

fn push_scope(query: &mut QueryBuilder<'_, Postgres>, ns: &Namespace, filter: &Filter) {
    query.push(" WHERE database = ");
    query.push_bind(ns.database.clone());
    query.push(" AND collection = ");
    query.push_bind(ns.collection.clone());
    if !filter.is_empty() {
        query.push(" AND doc @> ");
        query.push_bind(Value::Object(filter.as_document().clone()));
    }
}

fn push_order(query: &mut QueryBuilder<'_, Postgres>, sort: &Sort) {
    query.push("doc -> ");
    query.push_bind(sort.field.clone());
    query.push(match sort.direction {
        Direction::Ascending => " ASC",
        Direction::Descending => " DESC",
    });
}

fn to_document(row: &PgRow) -> Result<Document> {
    let doc: Value = row.try_get("doc").map_err(failed("decode document"))?;
    match doc {
        Value::Object(doc) => Ok(doc),
        other => Err(Error::Backend(format!("stored document is not an object: {other}"))),
    }
}

#[async_trait::async_trait]
impl DocumentDriver for PostgresStore {
    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Connection(format!("ping failed: {e}")))?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }

    async fn find_one(&self, ns: &Namespace, filter: &Filter) -> Result<Option<Document>> {
        let mut query = Self::scoped("SELECT doc FROM documents", ns, filter);
        query.push(" ORDER BY id LIMIT 1");
        let row = query
            .build()
            .fetch_optional(&self.pool)
            .await
            .map_err(failed("find document"))?;

        row.as_ref().map(to_document).transpose()
    }

    async fn find(&self, ns: &Namespace, filter: &Filter, options: &FindOptions) -> Result<Vec<Document>> {
        let mut query = Self::scoped("SELECT doc FROM documents", ns, filter);
        query.push(" ORDER BY ");
        if let Some(sort) = &options.sort {
            push_order(&mut query, sort);
            query.push(", ");
        }
        query.push("id");
        if let Some(limit) = options.limit {
            query.push(" LIMIT ");
            query.push_bind(limit as i64);
        }
        if let Some(skip) = options.skip {
            query.push(" OFFSET ");
            query.push_bind(skip as i64);
        }

        let rows = query
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(failed("find documents"))?;

        rows.iter().map(to_document).collect()
    }

    async fn insert_one(&self, ns: &Namespace, doc: Document) -> Result<()> {
        let id = doc
            .get(ID_FIELD)
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Backend(format!("document for {ns} has no {ID_FIELD}")))?
            .to_string();

        sqlx::query("INSERT INTO documents (database, collection, id, doc) VALUES ($1, $2, $3, $4)")
            .bind(&ns.database)
            .bind(&ns.collection)
            .bind(id)
            .bind(Value::Object(doc))
            .execute(&self.pool)
            .await
            .map_err(failed("insert document"))?;

        Ok(())
    }

    async fn replace_one(&self, ns: &Namespace, id: &ObjectId, doc: Document) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE documents SET doc = $4 WHERE database = $1 AND collection = $2 AND id = $3",
        )
        .bind(&ns.database)
        .bind(&ns.collection)
        .bind(id.to_hex())
        .bind(Value::Object(doc))
        .execute(&self.pool)
        .await
        .map_err(failed("replace document"))?;

        Ok(result.rows_affected())
    }

    async fn delete_one(&self, ns: &Namespace, filter: &Filter) -> Result<u64> {
        let mut query = QueryBuilder::new(
            "DELETE FROM documents WHERE (database, collection, id) IN \
             (SELECT database, collection, id FROM documents",
        );
        push_scope(&mut query, ns, filter);
        query.push(" ORDER BY id LIMIT 1)");

        let result = query
            .build()
            .execute(&self.pool)
            .await
            .map_err(failed("delete document"))?;

        Ok(result.rows_affected())
    }

    async fn delete_many(&self, ns: &Namespace, filter: &Filter) -> Result<u64> {
        let result = Self::scoped("DELETE FROM documents", ns, filter)
            .build()
            .execute(&self.pool)
            .await
            .map_err(failed("delete documents"))?;

        Ok(result.rows_affected())
    }

    async fn count(&self, ns: &Namespace, filter: &Filter) -> Result<u64> {
        let row = Self::scoped("SELECT COUNT(*) AS n FROM documents", ns, filter)
            .build()
            .fetch_one(&self.pool)
            .await
            .map_err(failed("count documents"))?;
        let count: i64 = row.try_get("n").map_err(failed("count documents"))?;

        Ok(count as u64)
    }

    /// Each stage wraps the previous one in a subquery. `ord` carries the
    /// running order so skip/limit/sort compose the same way they read.
    async fn aggregate(&self, ns: &Namespace, pipeline: &Pipeline) -> Result<Vec<Document>> {
        let stages = pipeline.stages();
        let mut query: QueryBuilder<'_, Postgres> = QueryBuilder::new("SELECT doc FROM (");

        for stage in stages.iter().rev() {
            match stage {
                Stage::Sort(sort) => {
                    query.push("SELECT doc, row_number() OVER (ORDER BY ");
                    push_order(&mut query, sort);
                    query.push(", ord) AS ord FROM (");
                }
                _ => {
                    query.push("SELECT doc, ord FROM (");
                }
            }
        }

        query.push("SELECT doc, row_number() OVER (ORDER BY id) AS ord FROM documents");
        push_scope(&mut query, ns, &Filter::all());

        for stage in stages {
            query.push(") s");
            match stage {
                Stage::Match(filter) => {
                    query.push(" WHERE doc @> ");
                    query.push_bind(Value::Object(filter.as_document().clone()));
                }
                Stage::Sort(_) => {}
                Stage::Skip(n) => {
                    query.push(" ORDER BY ord OFFSET ");
                    query.push_bind(*n as i64);
                }
                Stage::Limit(n) => {
                    query.push(" ORDER BY ord LIMIT ");
                    query.push_bind(*n as i64);
                }
            }
        }
        query.push(") s ORDER BY ord");

        let rows = query
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(failed("aggregate documents"))?;

        rows.iter().map(to_document).collect()
    }
}
