pub mod api_server_configs;
pub mod collection;
pub mod manager;
pub mod memory;
pub mod options;
pub mod postgres;
pub mod registry;
pub mod repository;
pub mod stream_configs;
pub mod traits;

pub use api_server_configs::*;
pub use collection::*;
pub use manager::*;
pub use memory::*;
pub use options::*;
pub use postgres::*;
pub use registry::*;
pub use repository::*;
pub use stream_configs::*;
pub use traits::*;

use std::sync::Arc;

use crate::error::{Error, Result};

/// Pick the driver implementation for a connection URI by its scheme.
pub fn connector_for_uri(uri: &str) -> Result<Arc<dyn Connector>> {
    let scheme = uri.split_once("://").map(|(scheme, _)| scheme).unwrap_or_default();
    match scheme {
        "postgres" | "postgresql" => Ok(Arc::new(PgConnector)),
        "memory" => Ok(Arc::new(MemoryConnector::new())),
        _ => Err(Error::Connection(format!(
            "unsupported document store URI scheme in {}",
            redact_uri(uri)
        ))),
    }
}
