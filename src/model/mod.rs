pub mod api_server_config;
pub mod contract;
pub mod object_id;
pub mod stream_config;

pub use api_server_config::*;
pub use contract::{now_utc, Model};
pub use object_id::*;
pub use stream_config::*;
