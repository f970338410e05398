use playpool::{PlaypoolError, PlaypoolServer, ServerConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), PlaypoolError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let path = std::env::var("PLAYPOOL_CONFIG").unwrap_or_else(|_| "playpool.toml".to_string());
    let config = ServerConfig::load(&path)?;

    let server = PlaypoolServer::builder().config(config).build().await?;
    if let Ok(addr) = server.local_addr() {
        tracing::info!(%addr, "playpool listening");
    }

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
            }
        })
        .await
}
