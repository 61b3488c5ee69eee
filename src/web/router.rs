//! Route definitions for web server.

use axum::{routing::get, Router};

use super::api;
use crate::mailbox::Mailbox;

/// Create the API router.
pub fn create_api_router(mailbox: Mailbox) -> Router {
    Router::new()
        .route("/inbox", get(api::inbox_stats).post(api::post_inbox))
        .with_state(mailbox)
}

/// Create the full app router.
pub fn create_app_router(mailbox: Mailbox) -> Router {
    Router::new()
        .nest("/api", create_api_router(mailbox))
        .route("/health", get(health_check))
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}
