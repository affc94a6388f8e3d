use anyhow::Context;
use image_chat_relay::{
    api::{build_router, init_relay_state},
    config::{Config, LoggingConfig},
};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_tracing(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level));

    if config.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::load().context("Failed to load configuration")?;
    init_tracing(&config.logging);

    let state = init_relay_state(&config).context("Failed to initialize relay")?;
    let app = build_router(state, config.server.max_body_bytes);

    let addr = config.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!(
        "Relay listening on {} (model={}, session ids={:?})",
        addr,
        config.gemini.model_name(),
        config.sessions.id_strategy
    );

    axum::serve(listener, app).await?;
    Ok(())
}
