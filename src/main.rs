use anyhow::Context;
use shopping_search_gateway::observability::init_tracing;
use shopping_search_gateway::{Config, SearchServer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing().context("failed to initialize tracing")?;

    tracing::info!("Starting shopping search gateway");

    let config = Config::from_env().context("failed to load configuration")?;
    let server = SearchServer::new(config)
        .await
        .context("failed to initialize server")?;
    server.run().await.context("server terminated with an error")?;

    Ok(())
}
