mod connection;
mod core;
mod server;

pub mod commands;
pub mod config;

pub use crate::commands::{Action, Command, UpdateSpec, DEFAULT_QUERY_LIMIT};
pub use crate::config::{Mode, ServerConfig};
pub use crate::connection::{run_once, ConnectionHandle, ConnectionManager};
pub use crate::core::document::{bson_to_json, document_to_json, json_to_bson, json_to_document};
pub use crate::core::errors::GatewayError;
pub use crate::server::{router, serve, start_server, AppState};
