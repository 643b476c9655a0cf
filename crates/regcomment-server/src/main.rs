use anyhow::Result;
use clap::Parser;
use regcomment_server::config::ServerConfig;
use regcomment_store::StoreConfig;
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::parse();
    let store_config = StoreConfig::from_env();
    let state = regcomment_server::build_state(&config, &store_config)?;

    let addr = config.socket_addr()?;
    let listener = TcpListener::bind(addr).await?;
    info!(
        "regcomment-server listening on http://{addr}{}",
        config.prefix()
    );

    regcomment_server::serve(listener, state, &config.prefix()).await
}
