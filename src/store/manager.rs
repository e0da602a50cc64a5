use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use crate::config::StoreConfig;
use crate::error::{Error, Result};
use crate::store::collection::{with_deadline, Collection, Database};
use crate::store::options::ConnectOptions;
use crate::store::traits::{Connector, DocumentDriver};

struct LiveConnection {
    driver: Arc<dyn DocumentDriver>,
    database: Option<String>,
    monitor: JoinHandle<()>,
}

/// Owns exactly one live connection to the document store.
///
/// Accessors take the read lock, connect/disconnect take the write lock.
/// Repositories hold a reference to the manager, never their own connection.
pub struct ConnectionManager {
    config: StoreConfig,
    options: ConnectOptions,
    connector: Arc<dyn Connector>,
    state: RwLock<Option<LiveConnection>>,
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("uri", &self.options.redacted_uri())
            .field("database", &self.config.database)
            .finish()
    }
}

fn spawn_heartbeat(
    driver: Arc<dyn DocumentDriver>,
    every: Duration,
    deadline: Option<Duration>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // first tick completes immediately; the connect probe already covered it
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(err) = with_deadline("heartbeat", deadline, driver.ping()).await {
                log::warn!("Document store heartbeat failed: {}", err);
            }
        }
    })
}

impl ConnectionManager {
    pub fn new(config: StoreConfig, connector: Arc<dyn Connector>) -> Self {
        let options = ConnectOptions::from_config(&config);
        Self {
            config,
            options,
            connector,
            state: RwLock::new(None),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn options(&self) -> &ConnectOptions {
        &self.options
    }

    /// Dial and probe the store. Succeeds immediately when already connected.
    pub async fn connect(&self) -> Result<()> {
        let mut state = self.state.write().await;
        if state.is_some() {
            return Ok(());
        }

        let driver = with_deadline(
            "connect",
            self.options.connect_timeout,
            self.connector.connect(&self.options),
        )
        .await
        .map_err(|err| match err {
            Error::Connection(_) | Error::Timeout { .. } => err,
            other => Error::Connection(other.to_string()),
        })?;

        let probe = with_deadline(
            "ping",
            self.options.server_selection_timeout,
            driver.ping(),
        )
        .await;

        if let Err(err) = probe {
            // never keep a half-open connection around
            let closed = driver.close().await;
            log::error!(
                "Liveness probe against {} failed: {}",
                self.options.redacted_uri(),
                err
            );
            return Err(match (err, closed) {
                (err @ Error::Timeout { .. }, Ok(())) => err,
                (err, Ok(())) => Error::Connection(format!("failed to ping document store: {err}")),
                (err, Err(close_err)) => Error::Connection(format!(
                    "failed to ping document store: {err}; closing the connection also failed: {close_err}"
                )),
            });
        }

        let monitor = spawn_heartbeat(
            driver.clone(),
            self.options.heartbeat_interval,
            self.options.server_selection_timeout,
        );
        let database = (!self.config.database.is_empty()).then(|| self.config.database.clone());

        *state = Some(LiveConnection {
            driver,
            database,
            monitor,
        });
        log::info!("Connected to document store at {}", self.options.redacted_uri());
        Ok(())
    }

    /// Close the connection. A no-op when not connected.
    pub async fn disconnect(&self) -> Result<()> {
        let mut state = self.state.write().await;
        let Some(live) = state.as_ref() else {
            return Ok(());
        };

        live.driver
            .close()
            .await
            .map_err(|e| Error::Connection(format!("failed to disconnect from document store: {e}")))?;

        if let Some(live) = state.take() {
            live.monitor.abort();
        }
        log::info!("Disconnected from document store at {}", self.options.redacted_uri());
        Ok(())
    }

    /// Drop the current connection (if any) and dial again.
    pub async fn reconnect(&self) -> Result<()> {
        self.disconnect().await?;
        self.connect().await
    }

    pub async fn is_connected(&self) -> bool {
        self.state.read().await.is_some()
    }

    pub async fn ping(&self) -> Result<()> {
        let driver = self.driver().await?;
        with_deadline("ping", self.options.server_selection_timeout, driver.ping()).await
    }

    /// The shared driver behind the live connection.
    pub async fn driver(&self) -> Result<Arc<dyn DocumentDriver>> {
        let state = self.state.read().await;
        state
            .as_ref()
            .map(|live| live.driver.clone())
            .ok_or_else(|| Error::NotConnected("document store client is not connected".to_string()))
    }

    /// The database bound by configuration.
    pub async fn database(&self) -> Result<Database> {
        let state = self.state.read().await;
        match state.as_ref() {
            Some(LiveConnection {
                driver,
                database: Some(name),
                ..
            }) => Ok(Database::new(driver.clone(), name.clone(), self.options.socket_timeout)),
            _ => Err(Error::NotConnected(
                "document store client is not connected or no database is specified".to_string(),
            )),
        }
    }

    pub async fn collection(&self, name: &str) -> Result<Collection> {
        Ok(self.database().await?.collection(name))
    }

    /// A view of another database over this manager's connection.
    ///
    /// The view borrows the manager and owns nothing: disconnecting the
    /// manager invalidates it, and it cannot outlive the manager.
    pub async fn with_database(&self, name: impl Into<String>) -> Result<DatabaseView<'_>> {
        self.driver().await?;
        Ok(DatabaseView {
            parent: self,
            name: name.into(),
        })
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Some(live) = self.state.get_mut().take() {
            live.monitor.abort();
        }
    }
}

/// Borrowed handle binding a different database name to a parent
/// [`ConnectionManager`]'s connection. Valid only while the parent is connected.
#[derive(Debug, Clone)]
pub struct DatabaseView<'a> {
    parent: &'a ConnectionManager,
    name: String,
}

impl<'a> DatabaseView<'a> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> &'a ConnectionManager {
        self.parent
    }

    pub async fn database(&self) -> Result<Database> {
        let driver = self.parent.driver().await?;
        Ok(Database::new(
            driver,
            self.name.clone(),
            self.parent.options.socket_timeout,
        ))
    }

    pub async fn collection(&self, name: &str) -> Result<Collection> {
        Ok(self.database().await?.collection(name))
    }

    pub async fn ping(&self) -> Result<()> {
        self.parent.ping().await
    }
}
