//! Web server using Axum.

use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use super::router::create_app_router;
use crate::config::WebConfig;
use crate::error::{Error, Result};
use crate::mailbox::Mailbox;

/// Largest accepted request body.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Web server configuration.
pub struct WebServerConfig {
    pub port: u16,
    pub host: String,
}

impl From<&WebConfig> for WebServerConfig {
    fn from(web: &WebConfig) -> Self {
        Self {
            port: web.port,
            host: web.host.clone(),
        }
    }
}

/// Run the web server.
pub async fn run_server(config: WebServerConfig, mailbox: Mailbox) -> Result<()> {
    let app = create_app_router(mailbox)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| Error::Web(format!("Invalid address: {}", e)))?;

    tracing::info!("Starting web server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .await
        .map_err(|e| Error::Web(e.to_string()))?;

    Ok(())
}
