use anyhow::{Context, Result, bail};
use bookbrief::{api, config, logging};
use std::io::ErrorKind;
use std::net::Ipv4Addr;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<()> {
    let mut config = config::init_config().context("Invalid configuration")?;
    logging::init_tracing();

    let listener = bind_listener(&config).await?;
    let port = listener.local_addr().context("Listener has no address")?.port();
    let executor = config.resolve_executor_url(port);
    tracing::debug!(executor, "Derived-asset jobs target");

    let app = api::build_app(&config).context("Failed to initialise services")?;
    tracing::info!("Listening on http://0.0.0.0:{}", port);
    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}

/// Bind `SERVER_PORT` exactly, or the first free port of the configured range.
async fn bind_listener(config: &config::Config) -> Result<TcpListener> {
    if let Some(port) = config.server_port {
        return TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))
            .await
            .with_context(|| format!("Failed to bind port {port}"));
    }

    for port in config.server_port_range.clone() {
        match TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await {
            Ok(listener) => return Ok(listener),
            Err(error) if error.kind() == ErrorKind::AddrInUse => {
                tracing::debug!(port, "Port already in use; trying next");
            }
            Err(error) => {
                return Err(error).with_context(|| format!("Failed to bind port {port}"));
            }
        }
    }
    bail!(
        "No available port in range {}-{}",
        config.server_port_range.start(),
        config.server_port_range.end()
    )
}
