use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};

use crate::config::StoreConfig;
use crate::error::{Error, Result};
use crate::store::manager::ConnectionManager;
use crate::store::traits::Connector;

/// Bound on closing the default manager once shutdown starts.
pub const SHUTDOWN_CLOSE_TIMEOUT: Duration = Duration::from_secs(10);

/// Holds the process's default [`ConnectionManager`].
///
/// Constructed once by the entry point and passed by reference to whatever
/// needs the default connection.
pub struct ClientRegistry {
    connector: Arc<dyn Connector>,
    default: Mutex<Option<Arc<ConnectionManager>>>,
    hook_installed: AtomicBool,
    shutdown: watch::Sender<bool>,
}

impl ClientRegistry {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            connector,
            default: Mutex::new(None),
            hook_installed: AtomicBool::new(false),
            shutdown,
        }
    }

    /// Connect a fresh manager and install it as the default, replacing (and
    /// disconnecting) any previous one. If the old one fails to disconnect the
    /// new one is not installed. If the new one fails to connect the slot is
    /// left empty.
    pub async fn init_default(&self, config: StoreConfig) -> Result<Arc<ConnectionManager>> {
        let mut slot = self.default.lock().await;

        if let Some(existing) = slot.as_ref() {
            existing
                .disconnect()
                .await
                .map_err(|e| e.context("failed to disconnect existing default manager"))?;
            log::info!("Replacing default document store connection");
        }
        *slot = None;

        let manager = Arc::new(ConnectionManager::new(config, self.connector.clone()));
        manager.connect().await?;

        *slot = Some(manager.clone());
        Ok(manager)
    }

    /// Initialise, probe and install the shutdown hook in one step.
    pub async fn init_default_once(
        self: &Arc<Self>,
        config: StoreConfig,
        grace: Duration,
    ) -> Result<Arc<ConnectionManager>> {
        let uri = crate::store::options::redact_uri(&config.uri);
        let manager = self.init_default(config).await?;
        manager.ping().await?;
        log::info!("Successfully connected to document store at {}", uri);

        self.install_shutdown_hook(grace);
        Ok(manager)
    }

    pub async fn get_default(&self) -> Result<Arc<ConnectionManager>> {
        self.default.lock().await.clone().ok_or(Error::NotInitialized)
    }

    /// Disconnect and clear the default manager. A no-op when none is installed.
    pub async fn close_default(&self) -> Result<()> {
        let mut slot = self.default.lock().await;
        let Some(manager) = slot.as_ref() else {
            return Ok(());
        };

        manager.disconnect().await?;
        *slot = None;
        Ok(())
    }

    /// Receiver that flips to `true` when shutdown begins. Front ends should
    /// drain their work and drop the receiver; the store is closed once every
    /// receiver is gone or the grace window elapses.
    pub fn subscribe_shutdown(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Register the SIGINT/SIGTERM handler. Only the first call installs it;
    /// later calls return `false`.
    pub fn install_shutdown_hook(self: &Arc<Self>, grace: Duration) -> bool {
        if self.hook_installed.swap(true, Ordering::SeqCst) {
            return false;
        }

        let registry = self.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            log::info!("Received shutdown signal, closing document store connections...");
            registry.shutdown(grace).await;
        });
        true
    }

    /// Broadcast shutdown, give front ends `grace` to drain, then close the
    /// default manager within [`SHUTDOWN_CLOSE_TIMEOUT`].
    pub async fn shutdown(&self, grace: Duration) {
        self.shutdown.send_replace(true);

        if tokio::time::timeout(grace, self.shutdown.closed()).await.is_err() {
            log::warn!("Grace window of {:?} elapsed with work still in flight", grace);
        }

        match tokio::time::timeout(SHUTDOWN_CLOSE_TIMEOUT, self.close_default()).await {
            Ok(Ok(())) => log::info!("Document store connections closed successfully"),
            Ok(Err(err)) => log::error!("Error closing document store connections: {}", err),
            Err(_) => log::error!(
                "Closing document store connections timed out after {:?}",
                SHUTDOWN_CLOSE_TIMEOUT
            ),
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            log::error!("Failed to install Ctrl+C handler: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                log::error!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
