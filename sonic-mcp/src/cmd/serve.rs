//! `sonic-mcp serve` command — start the MCP server.
//!
//! Reads the TOML configuration, builds the chain registry, client cache,
//! service layer and capability registry, then serves on the selected
//! transport until EOF (stdio) or a shutdown signal.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use crate::capability::{CapabilityKind, CapabilityRegistry};
use crate::chain::{ChainRegistry, ClientCache, HttpConnector};
use crate::config::load_config;
use crate::error::Error;
use crate::protocol::McpServer;
use crate::services::Services;
use crate::signal::SigDown;
use crate::telemetry::Telemetry;
use crate::transport::{Transport, http, stdio};

/// Execute the `serve` command.
///
/// # Errors
///
/// Returns an error if configuration loading, capability registration, or
/// the transport fails.
///
/// # Panics
///
/// Panics if the rustls crypto provider cannot be installed.
pub async fn run(config_path: Option<&Path>, transport: Transport) -> Result<(), Error> {
    rustls::crypto::CryptoProvider::install_default(rustls::crypto::ring::default_provider())
        .expect("Failed to initialize rustls crypto provider");

    let telemetry = Telemetry::new()
        .with_name(env!("CARGO_PKG_NAME"))
        .with_version(env!("CARGO_PKG_VERSION"))
        .register();

    let config = load_config(config_path)?;
    let chains = ChainRegistry::new();
    let default_chain = chains
        .resolve(config.default_network())
        .map_err(|e| Error::config_with("invalid default_network", e))?;

    let clients = Arc::new(ClientCache::new(
        chains,
        config.rpc_url()?,
        Arc::new(HttpConnector),
    ));
    let default_signer = config.default_signer()?;
    if let Some(key) = &default_signer {
        tracing::info!(address = %key.address()?, "default signer configured");
    }
    let services =
        Services::new(clients, config.default_network().clone()).with_default_signer(default_signer);
    let registry = CapabilityRegistry::with_services(&services)?;
    tracing::info!(
        default_network = %config.default_network(),
        chain_id = default_chain,
        tools = registry.list(CapabilityKind::Tool).len(),
        resources = registry.list(CapabilityKind::Resource).len(),
        "capabilities registered"
    );
    let server = McpServer::new(Arc::new(registry));

    let sig_down =
        SigDown::try_new().map_err(|e| Error::server_with("failed to register signal handlers", e))?;
    let shutdown = sig_down.cancellation_token();

    match transport {
        Transport::Stdio => stdio::serve(server, shutdown).await?,
        Transport::Http => {
            let app = http::router(server).layer(telemetry.http_tracing());
            let addr = SocketAddr::new(config.host(), config.port());
            http::serve(app, addr, shutdown).await?;
        }
    }

    sig_down.shutdown();
    sig_down.recv().await;
    Ok(())
}
