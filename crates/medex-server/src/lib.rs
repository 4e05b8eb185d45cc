//! Medex Server
//!
//! HTTP front end for batch extraction of medicine/material attributes.
//! Wires an Azure OpenAI gateway into the batch orchestrator and serves it
//! with axum.

#![warn(missing_docs)]

pub mod config;
pub mod handlers;

use config::{ConfigError, GatewayConfig, ServerConfig};
use handlers::{create_router, AppState};
use medex_extractor::{BatchOrchestrator, ExtractorError};
use medex_llm::{AzureOpenAiGateway, LlmError};
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::info;

/// Server error
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Gateway could not be constructed
    #[error("Gateway setup failed: {0}")]
    Gateway(#[from] LlmError),

    /// Orchestrator could not be constructed
    #[error("Extractor setup failed: {0}")]
    Extractor(#[from] ExtractorError),

    /// Server binding error
    #[error("Failed to bind server: {0}")]
    Bind(#[from] std::io::Error),

    /// Server error
    #[error("Server error: {0}")]
    Server(String),
}

/// Build the Azure OpenAI gateway described by the configuration
pub fn build_gateway(config: &GatewayConfig) -> Result<AzureOpenAiGateway, ServerError> {
    let gateway = AzureOpenAiGateway::new(&config.endpoint, &config.deployment, config.auth()?)?
        .with_api_version(&config.api_version)
        .with_timeout(Duration::from_secs(config.timeout_secs))?;
    Ok(gateway)
}

/// Start the HTTP server
///
/// Validates configuration, builds the gateway and orchestrator, and serves
/// until Ctrl+C.
pub async fn start_server(config: ServerConfig) -> Result<(), ServerError> {
    config.validate()?;

    info!("Starting Medex server");
    info!("Bind address: {}", config.bind_addr());
    info!(
        "Upstream deployment: {} at {}",
        config.gateway.deployment, config.gateway.endpoint
    );
    info!("Max concurrent item calls: {}", config.extractor.max_concurrency);

    let gateway = build_gateway(&config.gateway)?;
    let orchestrator = BatchOrchestrator::new(gateway, config.extractor.clone())?;
    let state = AppState::new(orchestrator, config.gateway.deployment.clone());

    let app = create_router(state);

    let listener = TcpListener::bind(&config.bind_addr()).await?;
    info!("Server listening on {}", config.bind_addr());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ServerError::Server(e.to_string()))?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
