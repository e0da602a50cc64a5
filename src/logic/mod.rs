pub mod api_server_config_service;
pub mod bridge_token;
pub mod locations;
pub mod schema_source;
pub mod stream_config_service;

pub use api_server_config_service::*;
pub use bridge_token::*;
pub use locations::{validate_base_url, validate_schema_location};
pub use schema_source::*;
pub use stream_config_service::*;
