use std::time::Duration;

use crate::error::{Error, Result};
use crate::logic::locations::is_remote;

pub const DEFAULT_SCHEMA_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Reads OpenAPI schema bytes from an http(s) URL or a local path.
#[derive(Debug, Clone)]
pub struct SchemaFetcher {
    client: reqwest::Client,
    timeout: Option<Duration>,
}

impl Default for SchemaFetcher {
    fn default() -> Self {
        Self::new(Some(DEFAULT_SCHEMA_FETCH_TIMEOUT))
    }
}

impl SchemaFetcher {
    /// `None` disables the deadline on remote fetches.
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout,
        }
    }

    /// Zero seconds means no deadline.
    pub fn from_secs(secs: u64) -> Self {
        Self::new((secs > 0).then(|| Duration::from_secs(secs)))
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub async fn fetch(&self, location: &str) -> Result<Vec<u8>> {
        if is_remote(location) {
            log::debug!("Fetching schema over HTTP from {}", location);
            self.fetch_remote(location).await
        } else {
            log::debug!("Reading schema from {}", location);
            tokio::fs::read(location).await.map_err(|e| Error::SchemaFetch {
                location: location.to_string(),
                message: e.to_string(),
            })
        }
    }

    async fn fetch_remote(&self, location: &str) -> Result<Vec<u8>> {
        let mut request = self.client.get(location);
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await.map_err(|e| self.transport_error(location, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::SchemaFetch {
                location: location.to_string(),
                message: format!("unexpected HTTP status {status}"),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| self.transport_error(location, e))?;
        Ok(body.to_vec())
    }

    fn transport_error(&self, location: &str, err: reqwest::Error) -> Error {
        match self.timeout {
            Some(after) if err.is_timeout() => Error::Timeout {
                operation: format!("fetch schema from {location}"),
                after,
            },
            _ => Error::SchemaFetch {
                location: location.to_string(),
                message: err.to_string(),
            },
        }
    }
}
