//! JSON-RPC server startup.
//!
//! The listener is activated by the binary only after the lifecycle
//! coordinator reports `Running`, and stopped after application shutdown.

use anyhow::{Context, Result};
use jsonrpsee::server::{Server, ServerHandle};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

use super::handlers::{ApiImpl, FlowgateApiServer};
use crate::context::AppContext;

/// Start the listener on the configured host and port.
pub async fn start_server(context: Arc<AppContext>) -> Result<(ServerHandle, SocketAddr)> {
    let listener = &context.settings.listener;
    if listener.use_ssl {
        info!("SSL enabled; TLS is expected to be terminated in front of the listener");
    }
    let address = listener.bind_address();
    start_server_on(context, &address).await
}

/// Start the listener on an explicit address.
pub async fn start_server_on(
    context: Arc<AppContext>,
    address: &str,
) -> Result<(ServerHandle, SocketAddr)> {
    info!("Starting JSON-RPC server on {}", address);

    let server = Server::builder()
        .max_connections(context.settings.listener.max_threads)
        .build(address)
        .await
        .with_context(|| format!("Failed to bind JSON-RPC server to {}", address))?;

    let addr = server
        .local_addr()
        .context("Failed to get server address")?;

    let handle = server.start(ApiImpl::new(context).into_rpc());
    info!("JSON-RPC server listening on {}", addr);

    Ok((handle, addr))
}
