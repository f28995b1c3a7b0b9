//! Command implementations.

pub mod chunk;
pub mod config;
pub mod extract;
pub mod schemas;

pub use self::chunk::execute_chunk;
pub use self::config::execute_config;
pub use self::extract::execute_extract;
pub use self::schemas::execute_schemas;
