//! Web server module (Axum + inbox ingest API).

pub mod api;
pub mod router;
pub mod server;

pub use server::{run_server, WebServerConfig};
